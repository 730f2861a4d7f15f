//! Anti-forgery tokens bound to the session.
//!
//! A token is minted on first use and kept in the session for as long as
//! the session lives. Submissions carry it back in the `_token` form field
//! or the `X-CSRF-TOKEN` header.

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde_json::json;
use tracing::warn;

use crate::context::RequestContext;
use crate::error::HandlerError;
use crate::http::{Request, Response};
use crate::router::Handler;
use crate::session::{random_hex, Session, TOKEN_BYTES};

/// Issues and checks the per-session token. Never fails; callers decide
/// what a `false` from `is_valid` means for the user.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsrfGuard;

impl CsrfGuard {
    /// Session key the token is stored under
    pub const SESSION_KEY: &'static str = "_csrf_token";
    pub const FIELD: &'static str = "_token";
    pub const HEADER: &'static str = "X-CSRF-TOKEN";

    pub fn new() -> Self {
        Self
    }

    /// The session's token, minting and storing one on first call
    pub fn token(&self, session: &Session) -> String {
        if let Some(existing) = session.get_str(Self::SESSION_KEY).filter(|t| !t.is_empty()) {
            return existing;
        }
        let token = random_hex(TOKEN_BYTES);
        session.insert(Self::SESSION_KEY, token.clone());
        token
    }

    /// True only when the submitted token equals the stored one. A missing
    /// or empty candidate, or a session without a token, is never valid.
    pub fn is_valid(&self, request: &Request) -> bool {
        let candidate = request
            .input(Self::FIELD)
            .filter(|t| !t.is_empty())
            .or_else(|| request.header(Self::HEADER).filter(|t| !t.is_empty()));
        let Some(candidate) = candidate else {
            return false;
        };

        let Some(stored) = request
            .session()
            .get_str(Self::SESSION_KEY)
            .filter(|t| !t.is_empty())
        else {
            return false;
        };

        constant_time_eq::constant_time_eq(candidate.as_bytes(), stored.as_bytes())
    }
}

/// Methods that change state and therefore need a valid token
pub fn is_state_changing(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}

/// Handler wrapper rejecting state-changing requests without a valid token
pub struct Protect<H> {
    inner: H,
    guard: CsrfGuard,
}

pub fn protect<H: Handler>(inner: H) -> Protect<H> {
    Protect {
        inner,
        guard: CsrfGuard::new(),
    }
}

#[async_trait]
impl<H: Handler> Handler for Protect<H> {
    async fn call(&self, request: Request, ctx: RequestContext) -> Result<Response, HandlerError> {
        if is_state_changing(request.method()) && !self.guard.is_valid(&request) {
            warn!("CSRF token mismatch on {} {}", request.method(), request.path());
            return Err(HandlerError::forbidden("CSRF token mismatch"));
        }
        self.inner.call(request, ctx).await
    }
}

/// `GET` handler returning `{"token": ...}` for script-driven forms
pub async fn issue_token(request: Request, _ctx: RequestContext) -> Result<Response, HandlerError> {
    let token = CsrfGuard::new().token(request.session());
    Ok(Response::json(StatusCode::OK, &json!({ "token": token }))?)
}
