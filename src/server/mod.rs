//! axum transport adapter.
//!
//! Every request that is not `/health` goes through [`AppState::serve`]:
//! load the session named by the cookie, convert the axum request into a
//! core [`Request`], run [`Router::dispatch`], pass failures through the
//! [`ErrorBoundary`], persist the session and emit the core [`Response`].

pub mod boundary;
pub mod render;

pub use boundary::{ErrorBoundary, NotFoundPage};
pub use render::{RenderError, Renderer, TemplateRenderer};

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRequest, Multipart, State};
use axum::http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::config::SessionConfig;
use crate::database::DatabaseManager;
use crate::error::HandlerError;
use crate::http::{Request, Response, UploadedFile};
use crate::router::Router;
use crate::session::{CommitOutcome, Session, SessionManager};

/// Largest urlencoded or JSON body read into the request
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// How the session id travels to and from the client
#[derive(Debug, Clone)]
pub struct SessionCookie {
    pub name: String,
    pub secure: bool,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secure: false,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            name: config.cookie_name.clone(),
            secure: config.secure_cookie,
        }
    }

    /// Value presented by the client, if any
    pub fn read(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.name)
            .map(|(_, value)| value.to_string())
    }

    pub fn set(&self, id: &str) -> Option<HeaderValue> {
        let secure = if self.secure { "; Secure" } else { "" };
        HeaderValue::from_str(&format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax{}",
            self.name, id, secure
        ))
        .ok()
    }

    pub fn clear(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
            self.name
        ))
        .ok()
    }
}

/// Shared state behind the axum service
#[derive(Clone)]
pub struct AppState {
    router: Arc<Router>,
    sessions: SessionManager,
    boundary: ErrorBoundary,
    cookie: SessionCookie,
    pool: Option<PgPool>,
}

impl AppState {
    pub fn new(router: Router, sessions: SessionManager, boundary: ErrorBoundary) -> Self {
        Self {
            router: Arc::new(router),
            sessions,
            boundary,
            cookie: SessionCookie::new("forum_session"),
            pool: None,
        }
    }

    pub fn with_cookie(mut self, cookie: SessionCookie) -> Self {
        self.cookie = cookie;
        self
    }

    /// Pool pinged by `/health`
    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// One full exchange, from axum request to core response
    pub async fn serve(&self, request: axum::extract::Request) -> Response {
        let (parts, body) = request.into_parts();

        let cookie_id = self.cookie.read(&parts.headers);
        let session = match self.sessions.load(cookie_id.as_deref()).await {
            Ok(session) => session,
            Err(e) => return self.boundary.error_response(&HandlerError::from(e)),
        };

        let request = match into_request(parts, body, session.clone()).await {
            Ok(request) => request,
            Err(e) => return self.boundary.error_response(&e),
        };

        let response = self.boundary.handle(self.router.dispatch(request).await);
        self.commit(&session, response).await
    }

    async fn commit(&self, session: &Session, response: Response) -> Response {
        match self.sessions.commit(session).await {
            Ok(CommitOutcome::Saved {
                id,
                id_changed: true,
            }) => match self.cookie.set(&id) {
                Some(value) => response.append_header(header::SET_COOKIE, value),
                None => response,
            },
            Ok(CommitOutcome::Destroyed) => match self.cookie.clear() {
                Some(value) => response.append_header(header::SET_COOKIE, value),
                None => response,
            },
            Ok(_) => response,
            Err(e) => self.boundary.error_response(&HandlerError::from(e)),
        }
    }
}

/// The axum application: `/health` plus everything else through the router
pub fn app(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/health", get(health))
        .fallback(dispatch)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::custom(panic_response)),
        )
}

async fn dispatch(State(state): State<AppState>, request: axum::extract::Request) -> axum::response::Response {
    state.serve(request).await.into_http()
}

fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> axum::response::Response {
    error!("Handler panicked");
    boundary::fallback(StatusCode::INTERNAL_SERVER_ERROR).into_http()
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    let Some(pool) = &state.pool else {
        return (
            StatusCode::OK,
            axum::Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "database": "not configured" }
            })),
        );
    };

    match DatabaseManager::health_check(pool).await {
        Ok(_) => (
            StatusCode::OK,
            axum::Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "database": "ok" }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            axum::Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}

/// Builds the core request. Query and body values are decoded; on repeated
/// keys the last one wins.
async fn into_request(parts: Parts, body: Body, session: Session) -> Result<Request, HandlerError> {
    let query: HashMap<String, String> = parts
        .uri
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase())
        .unwrap_or_default();

    let builder = Request::builder(parts.method.clone(), parts.uri.path())
        .query(query)
        .headers(parts.headers.clone())
        .session(session);

    let builder = if content_type.starts_with("multipart/form-data") {
        let request = axum::extract::Request::from_parts(parts, body);
        let (fields, files) = read_multipart(request).await?;
        files.into_iter().fold(builder.body(fields), |b, f| b.file(f))
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let bytes = read_body(body).await?;
        builder.body(url::form_urlencoded::parse(&bytes).into_owned().collect())
    } else if content_type.starts_with("application/json") {
        let bytes = read_body(body).await?;
        builder.body(json_fields(&bytes)?)
    } else {
        builder
    };

    Ok(builder.build())
}

async fn read_body(body: Body) -> Result<axum::body::Bytes, HandlerError> {
    axum::body::to_bytes(body, MAX_BODY_BYTES).await.map_err(|e| {
        warn!("Could not read request body: {}", e);
        HandlerError::bad_request("Request body could not be read")
    })
}

/// Top-level members of a JSON object; non-string values keep their JSON text
fn json_fields(bytes: &[u8]) -> Result<HashMap<String, String>, HandlerError> {
    if bytes.is_empty() {
        return Ok(HashMap::new());
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map
            .into_iter()
            .map(|(k, v)| match v {
                Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect()),
        Ok(_) => Err(HandlerError::bad_request("JSON body must be an object")),
        Err(_) => Err(HandlerError::bad_request("Malformed JSON body")),
    }
}

async fn read_multipart(
    request: axum::extract::Request,
) -> Result<(HashMap<String, String>, Vec<UploadedFile>), HandlerError> {
    let bad = |e: &dyn std::fmt::Display| {
        warn!("Malformed multipart body: {}", e);
        HandlerError::bad_request("Malformed multipart body")
    };

    let mut multipart = Multipart::from_request(request, &()).await.map_err(|e| bad(&e))?;
    let mut fields = HashMap::new();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| bad(&e))? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        if file_name.is_some() {
            let data = field.bytes().await.map_err(|e| bad(&e))?;
            files.push(UploadedFile {
                field: name,
                file_name,
                content_type,
                data: data.to_vec(),
            });
        } else {
            let text = field.text().await.map_err(|e| bad(&e))?;
            fields.insert(name, text);
        }
    }
    Ok((fields, files))
}
