use thiserror::Error;

/// Failures surfaced by the session layer. Missing ids are not errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Session payload codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Invalid session table name: {0}")]
    InvalidTable(String),
}
