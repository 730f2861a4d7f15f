use std::collections::{HashMap, HashSet};

use thiserror::Error;

/// Registration-time rejections
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("Route pattern must start with '/': {0:?}")]
    MissingLeadingSlash(String),

    #[error("Route pattern has an empty segment: {0:?}")]
    EmptySegment(String),

    #[error("Malformed capture segment {segment:?} in {pattern:?}")]
    MalformedCapture { pattern: String, segment: String },

    #[error("Capture {name:?} appears twice in {pattern:?}")]
    DuplicateCapture { pattern: String, name: String },

    #[error("Route {method} {pattern} is already registered")]
    DuplicateRoute { method: String, pattern: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Literal(String),
    Capture(String),
}

/// Parsed `/`-delimited path template made of literal and `{name}` segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
}

impl Pattern {
    pub fn parse(pattern: &str) -> Result<Self, RouteError> {
        let Some(rest) = pattern.strip_prefix('/') else {
            return Err(RouteError::MissingLeadingSlash(pattern.to_string()));
        };

        let mut segments = Vec::new();
        let mut seen = HashSet::new();
        // "/" alone is the root route with no segments
        if !rest.is_empty() {
            for raw in rest.split('/') {
                let segment = parse_segment(pattern, raw)?;
                if let Segment::Capture(name) = &segment {
                    if !seen.insert(name.clone()) {
                        return Err(RouteError::DuplicateCapture {
                            pattern: pattern.to_string(),
                            name: name.clone(),
                        });
                    }
                }
                segments.push(segment);
            }
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn capture_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Capture(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// True when both patterns match exactly the same paths, i.e. they
    /// differ at most in capture names.
    pub fn same_shape(&self, other: &Pattern) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    (Segment::Capture(_), Segment::Capture(_)) => true,
                    _ => false,
                })
    }

    /// Bound captures when `path` has the same segment count and every
    /// literal is equal. Captures never bind an empty segment and are
    /// URL-decoded.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts = split_path(path);
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Capture(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    let value = urlencoding::decode(part).ok()?;
                    params.insert(name.clone(), value.into_owned());
                }
            }
        }
        Some(params)
    }
}

fn parse_segment(pattern: &str, raw: &str) -> Result<Segment, RouteError> {
    if raw.is_empty() {
        return Err(RouteError::EmptySegment(pattern.to_string()));
    }

    let malformed = || RouteError::MalformedCapture {
        pattern: pattern.to_string(),
        segment: raw.to_string(),
    };

    if let Some(inner) = raw.strip_prefix('{') {
        let name = inner.strip_suffix('}').ok_or_else(malformed)?;
        let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        return if valid {
            Ok(Segment::Capture(name.to_string()))
        } else {
            Err(malformed())
        };
    }

    // Braces anywhere else mean a partial capture like "post-{id}"
    if raw.contains('{') || raw.contains('}') {
        return Err(malformed());
    }
    Ok(Segment::Literal(raw.to_string()))
}

/// Request path split into raw segments; "/" and "" have none
fn split_path(path: &str) -> Vec<&str> {
    let rest = path.strip_prefix('/').unwrap_or(path);
    if rest.is_empty() {
        Vec::new()
    } else {
        rest.split('/').collect()
    }
}
