use std::path::{Component, Path, PathBuf};

use axum::http::{header, HeaderValue, StatusCode};
use tracing::{debug, warn};

use crate::http::Response;

/// Serves regular files below a root directory when no route matched
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a request path below the root. Any `..`, absolute or prefix
    /// component rejects the whole path.
    fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let decoded = urlencoding::decode(url_path).ok()?;
        if decoded.contains('\0') {
            return None;
        }

        let mut pb = self.root.clone();
        for comp in Path::new(decoded.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(pb)
    }

    fn content_type(path: &Path) -> &'static str {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase()
            .as_str()
        {
            "txt" => "text/plain",
            "html" => "text/html",
            "css" => "text/css",
            "js" => "application/javascript",
            _ => "application/octet-stream",
        }
    }

    /// 200 response with the file's bytes, or `None` when the path escapes
    /// the root, does not exist, or is not a regular file.
    pub async fn serve(&self, url_path: &str) -> Option<Response> {
        let Some(candidate) = self.map_path(url_path) else {
            warn!("Rejected static path outside root: {:?}", url_path);
            return None;
        };

        // Symlinks may still point outside the root
        let root = tokio::fs::canonicalize(&self.root).await.ok()?;
        let resolved = tokio::fs::canonicalize(&candidate).await.ok()?;
        if !resolved.starts_with(&root) {
            warn!("Rejected static path resolving outside root: {:?}", url_path);
            return None;
        }

        let metadata = tokio::fs::metadata(&resolved).await.ok()?;
        if !metadata.is_file() {
            return None;
        }

        let bytes = match tokio::fs::read(&resolved).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read static file {}: {}", resolved.display(), e);
                return None;
            }
        };

        debug!("Serving static file {}", resolved.display());
        Some(
            Response::new(StatusCode::OK)
                .with_header(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static(Self::content_type(&resolved)),
                )
                .with_body(bytes),
        )
    }
}
