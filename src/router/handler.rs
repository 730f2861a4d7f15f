use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::HandlerError;
use crate::http::{Request, Response};

/// Something that turns a matched request into a response.
///
/// Async closures of the shape `|req, ctx| async move { ... }` implement
/// this directly.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, request: Request, ctx: RequestContext) -> Result<Response, HandlerError>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Request, RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, HandlerError>> + Send + 'static,
{
    async fn call(&self, request: Request, ctx: RequestContext) -> Result<Response, HandlerError> {
        (self)(request, ctx).await
    }
}

/// Shared handler reference as stored in the route table
pub type BoxedHandler = Arc<dyn Handler>;
