// Handler error types
use axum::http::StatusCode;
use thiserror::Error;

use crate::database::DatabaseError;
use crate::session::SessionError;

/// Failure a route handler may return instead of a response.
///
/// The router passes these through untouched; the server's error boundary is
/// the only place they become an HTTP response.
#[derive(Debug, Error)]
pub enum HandlerError {
    // 404 Not Found
    #[error("{0}")]
    NotFound(String),

    // 403 Forbidden
    #[error("{0}")]
    Forbidden(String),

    // 400 Bad Request
    #[error("{0}")]
    BadRequest(String),

    /// A submitted value broke a named constraint
    #[error("Field '{field}' violates {constraint}")]
    Validation { field: String, constraint: String },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HandlerError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            HandlerError::NotFound(_) => StatusCode::NOT_FOUND,
            HandlerError::Forbidden(_) => StatusCode::FORBIDDEN,
            HandlerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HandlerError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            HandlerError::Session(_) | HandlerError::Database(_) | HandlerError::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            HandlerError::NotFound(_) => "NOT_FOUND",
            HandlerError::Forbidden(_) => "FORBIDDEN",
            HandlerError::BadRequest(_) => "BAD_REQUEST",
            HandlerError::Validation { .. } => "VALIDATION_ERROR",
            HandlerError::Session(_) => "SESSION_ERROR",
            HandlerError::Database(_) => "DATABASE_ERROR",
            HandlerError::Other(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Get client-safe error message. Internal failures never expose their
    /// cause here; it is only available through `Display`.
    pub fn message(&self) -> String {
        match self {
            HandlerError::NotFound(msg) | HandlerError::Forbidden(msg) | HandlerError::BadRequest(msg) => {
                msg.clone()
            }
            HandlerError::Validation { .. } => self.to_string(),
            HandlerError::Session(_) | HandlerError::Database(_) | HandlerError::Other(_) => {
                "An error occurred while processing your request".to_string()
            }
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status_code().is_server_error()
    }
}

// Static constructor methods
impl HandlerError {
    pub fn not_found(message: impl Into<String>) -> Self {
        HandlerError::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        HandlerError::Forbidden(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        HandlerError::BadRequest(message.into())
    }

    pub fn validation(field: impl Into<String>, constraint: impl Into<String>) -> Self {
        HandlerError::Validation {
            field: field.into(),
            constraint: constraint.into(),
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::Other(err.into())
    }
}
