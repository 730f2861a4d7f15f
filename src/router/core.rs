use std::path::PathBuf;
use std::sync::Arc;

use axum::http::Method;
use tracing::debug;

use super::handler::{BoxedHandler, Handler};
use super::pattern::{Pattern, RouteError};
use super::static_files::StaticFiles;
use crate::context::RequestContext;
use crate::error::HandlerError;
use crate::http::{Request, Response};

struct Route {
    method: Method,
    pattern: Pattern,
    handler: BoxedHandler,
}

/// Method + path dispatch table.
///
/// Routes are tried in registration order and the first whose method,
/// segment count and literals all match wins. When nothing matches, a
/// file under the static root is served if one exists, then the
/// not-found handler runs, then a bare 404 is returned.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
    static_files: Option<StaticFiles>,
    not_found: Option<BoxedHandler>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn static_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.static_files = Some(StaticFiles::new(root));
        self
    }

    pub fn not_found(mut self, handler: impl Handler + 'static) -> Self {
        self.not_found = Some(Arc::new(handler));
        self
    }

    pub fn register(
        &mut self,
        method: Method,
        pattern: &str,
        handler: impl Handler + 'static,
    ) -> Result<&mut Self, RouteError> {
        self.register_arc(method, pattern, Arc::new(handler))
    }

    pub fn register_arc(
        &mut self,
        method: Method,
        pattern: &str,
        handler: BoxedHandler,
    ) -> Result<&mut Self, RouteError> {
        let pattern = Pattern::parse(pattern)?;
        let duplicate = self
            .routes
            .iter()
            .any(|r| r.method == method && r.pattern.same_shape(&pattern));
        if duplicate {
            return Err(RouteError::DuplicateRoute {
                method: method.to_string(),
                pattern: pattern.as_str().to_string(),
            });
        }

        debug!("Registered route {} {}", method, pattern.as_str());
        self.routes.push(Route {
            method,
            pattern,
            handler,
        });
        Ok(self)
    }

    pub fn get(&mut self, pattern: &str, handler: impl Handler + 'static) -> Result<&mut Self, RouteError> {
        self.register(Method::GET, pattern, handler)
    }

    pub fn post(&mut self, pattern: &str, handler: impl Handler + 'static) -> Result<&mut Self, RouteError> {
        self.register(Method::POST, pattern, handler)
    }

    pub fn put(&mut self, pattern: &str, handler: impl Handler + 'static) -> Result<&mut Self, RouteError> {
        self.register(Method::PUT, pattern, handler)
    }

    pub fn delete(&mut self, pattern: &str, handler: impl Handler + 'static) -> Result<&mut Self, RouteError> {
        self.register(Method::DELETE, pattern, handler)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatch with an empty context
    pub async fn dispatch(&self, request: Request) -> Result<Response, HandlerError> {
        self.dispatch_with(request, RequestContext::new()).await
    }

    /// Handler failures are returned as-is; turning them into a response is
    /// the caller's job.
    pub async fn dispatch_with(
        &self,
        request: Request,
        ctx: RequestContext,
    ) -> Result<Response, HandlerError> {
        for route in &self.routes {
            if &route.method != request.method() {
                continue;
            }
            if let Some(params) = route.pattern.matches(request.path()) {
                debug!(
                    "{} {} matched {}",
                    request.method(),
                    request.path(),
                    route.pattern.as_str()
                );
                return route.handler.call(request.with_params(params), ctx).await;
            }
        }

        if let Some(files) = &self.static_files {
            if let Some(response) = files.serve(request.path()).await {
                return Ok(response);
            }
        }

        match &self.not_found {
            Some(handler) => handler.call(request, ctx).await,
            None => Ok(Response::not_found()),
        }
    }
}
