use std::path::Path;

use minijinja::{AutoEscape, Environment, ErrorKind};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Could not read templates from {path}: {source}")]
    Source {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Turns a named template and its data into page bytes
pub trait Renderer: Send + Sync {
    fn render(&self, template: &str, data: &Value) -> Result<Vec<u8>, RenderError>;
}

const ERROR_TEMPLATE: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>{{ status }} {{ title }}</title></head>
<body>
<h1>{{ status }} {{ title }}</h1>
<p>{{ message }}</p>
{% if detail %}<pre>{{ detail }}</pre>{% endif %}
</body>
</html>
"#;

const NOT_FOUND_TEMPLATE: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>404 Not Found</title></head>
<body>
<h1>404 Not Found</h1>
<p>Nothing lives at {{ path }}.</p>
</body>
</html>
"#;

/// minijinja-backed renderer with built-in `error` and `not_found` pages.
/// Output is always HTML-escaped.
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        for (name, source) in [("error", ERROR_TEMPLATE), ("not_found", NOT_FOUND_TEMPLATE)] {
            if let Err(e) = env.add_template(name, source) {
                error!("Built-in template {} failed to compile: {}", name, e);
            }
        }
        Self { env }
    }

    /// Adds or replaces a template
    pub fn add_template(&mut self, name: impl Into<String>, source: impl Into<String>) -> Result<(), RenderError> {
        self.env.add_template_owned(name.into(), source.into())?;
        Ok(())
    }

    /// Loads every `*.html` file in `dir` as a template named by its file
    /// stem, replacing built-ins of the same name.
    pub fn load_directory(&mut self, dir: &Path) -> Result<usize, RenderError> {
        let source_err = |source| RenderError::Source {
            path: dir.display().to_string(),
            source,
        };

        let mut loaded = 0;
        for entry in std::fs::read_dir(dir).map_err(source_err)? {
            let path = entry.map_err(source_err)?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let source = std::fs::read_to_string(&path).map_err(|source| RenderError::Source {
                path: path.display().to_string(),
                source,
            })?;
            self.add_template(name, source)?;
            debug!("Loaded template {}", name);
            loaded += 1;
        }
        Ok(loaded)
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for TemplateRenderer {
    fn render(&self, template: &str, data: &Value) -> Result<Vec<u8>, RenderError> {
        let tmpl = self.env.get_template(template).map_err(|e| match e.kind() {
            ErrorKind::TemplateNotFound => RenderError::NotFound(template.to_string()),
            _ => RenderError::Template(e),
        })?;
        Ok(tmpl.render(data)?.into_bytes())
    }
}
