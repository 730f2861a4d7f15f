use std::error::Error as _;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::{json, Value};
use tracing::{error, warn};

use super::render::Renderer;
use crate::context::RequestContext;
use crate::error::HandlerError;
use crate::http::{Request, Response};
use crate::router::Handler;

/// Converts uncaught handler failures into user-facing error pages.
///
/// Rendering goes through the `Renderer`; if that fails or panics the page
/// degrades to a fixed plain-text body so the failure path itself never
/// crashes.
#[derive(Clone)]
pub struct ErrorBoundary {
    renderer: Arc<dyn Renderer>,
    show_diagnostics: bool,
}

impl ErrorBoundary {
    pub fn new(renderer: Arc<dyn Renderer>, show_diagnostics: bool) -> Self {
        Self {
            renderer,
            show_diagnostics,
        }
    }

    pub fn shows_diagnostics(&self) -> bool {
        self.show_diagnostics
    }

    pub fn handle(&self, result: Result<Response, HandlerError>) -> Response {
        match result {
            Ok(response) => response,
            Err(err) => self.error_response(&err),
        }
    }

    pub fn error_response(&self, err: &HandlerError) -> Response {
        let status = err.status_code();
        if err.is_internal() {
            error!("Request failed: {}", error_chain(err));
        } else {
            warn!("Request rejected ({}): {}", status.as_u16(), err);
        }

        let mut data = json!({
            "status": status.as_u16(),
            "title": status.canonical_reason().unwrap_or("Error"),
            "code": err.error_code(),
            "message": err.message(),
        });
        if self.show_diagnostics {
            data["detail"] = json!(error_chain(err));
        }
        self.render_page("error", &data, status)
    }

    /// Renders `template` with `status`, or the minimal body for `status`
    /// when rendering fails or panics
    pub fn render_page(&self, template: &str, data: &Value, status: StatusCode) -> Response {
        let renderer = &self.renderer;
        match catch_unwind(AssertUnwindSafe(|| renderer.render(template, data))) {
            Ok(Ok(body)) => Response::html(body).with_status(status),
            Ok(Err(e)) => {
                error!("Rendering template {} failed: {}", template, e);
                fallback(status)
            }
            Err(_) => {
                error!("Rendering template {} panicked", template);
                fallback(status)
            }
        }
    }
}

/// The last-resort body, produced without any collaborator
pub fn fallback(status: StatusCode) -> Response {
    Response::text(
        status,
        format!(
            "{} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Error")
        ),
    )
}

fn error_chain(err: &HandlerError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

/// Default not-found handler rendering template `not_found`
#[derive(Clone)]
pub struct NotFoundPage {
    boundary: ErrorBoundary,
}

impl NotFoundPage {
    pub fn new(boundary: ErrorBoundary) -> Self {
        Self { boundary }
    }
}

#[async_trait]
impl Handler for NotFoundPage {
    async fn call(&self, request: Request, _ctx: RequestContext) -> Result<Response, HandlerError> {
        let data = json!({ "path": request.path(), "method": request.method().as_str() });
        Ok(self
            .boundary
            .render_page("not_found", &data, StatusCode::NOT_FOUND))
    }
}
