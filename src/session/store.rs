use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info};

use super::error::SessionError;
use crate::database::DatabaseManager;

/// Default name of the session table created by the built-in migration
pub const DEFAULT_SESSION_TABLE: &str = "sessions";

/// The session persistence protocol.
///
/// Every session interaction in the crate goes through this trait; there is
/// no implicit process-wide session map. A session id moves through
/// nonexistent -> active (first `write`) -> destroyed (`destroy` or `gc`).
#[async_trait]
pub trait SessionHandler: Send + Sync {
    /// No-op for stores that hold no per-session connection state.
    async fn open(&self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), SessionError> {
        Ok(())
    }

    /// Stored payload, or empty bytes when the id has no record
    async fn read(&self, id: &str) -> Result<Vec<u8>, SessionError>;

    /// Upsert with a fresh last-activity timestamp. Last writer wins.
    async fn write(&self, id: &str, payload: &[u8]) -> Result<(), SessionError>;

    /// Deleting an unknown id is not an error.
    async fn destroy(&self, id: &str) -> Result<(), SessionError>;

    /// Removes every record idle for longer than `max_lifetime_secs` in one
    /// atomic step and returns how many were removed.
    async fn gc(&self, max_lifetime_secs: u64) -> Result<u64, SessionError>;
}

/// Postgres-backed session store.
///
/// Relies on the table created by the `0001_create_sessions` migration:
/// `id TEXT PRIMARY KEY, payload BYTEA, last_activity TIMESTAMPTZ`.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
    table: String,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            table: DEFAULT_SESSION_TABLE.to_string(),
        }
    }

    /// Use a table other than `sessions`
    pub fn with_table(pool: PgPool, table: &str) -> Result<Self, SessionError> {
        if !DatabaseManager::is_valid_identifier(table) {
            return Err(SessionError::InvalidTable(table.to_string()));
        }
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn quoted_table(&self) -> String {
        DatabaseManager::quote_identifier(&self.table)
    }
}

/// Longest lifetime passed to Postgres; anything older cannot exist, and
/// larger values overflow its interval type
const MAX_LIFETIME_SECS: u64 = 1_000 * 365 * 24 * 60 * 60;

fn interval_secs(max_lifetime_secs: u64) -> f64 {
    max_lifetime_secs.min(MAX_LIFETIME_SECS) as f64
}

#[async_trait]
impl SessionHandler for PgSessionStore {
    async fn read(&self, id: &str) -> Result<Vec<u8>, SessionError> {
        let query = format!("SELECT payload FROM {} WHERE id = $1", self.quoted_table());
        let payload: Option<Vec<u8>> = sqlx::query_scalar(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(payload.unwrap_or_default())
    }

    async fn write(&self, id: &str, payload: &[u8]) -> Result<(), SessionError> {
        let query = format!(
            "INSERT INTO {} (id, payload, last_activity) VALUES ($1, $2, now()) \
             ON CONFLICT (id) DO UPDATE SET payload = EXCLUDED.payload, last_activity = EXCLUDED.last_activity",
            self.quoted_table()
        );
        sqlx::query(&query)
            .bind(id)
            .bind(payload)
            .execute(&self.pool)
            .await?;
        debug!("Wrote session payload ({} bytes)", payload.len());
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), SessionError> {
        let query = format!("DELETE FROM {} WHERE id = $1", self.quoted_table());
        sqlx::query(&query).bind(id).execute(&self.pool).await?;
        Ok(())
    }

    async fn gc(&self, max_lifetime_secs: u64) -> Result<u64, SessionError> {
        // Threshold and delete are one statement, evaluated at delete time
        let query = format!(
            "DELETE FROM {} WHERE last_activity < now() - make_interval(secs => $1)",
            self.quoted_table()
        );
        let result = sqlx::query(&query)
            .bind(interval_secs(max_lifetime_secs))
            .execute(&self.pool)
            .await?;
        let removed = result.rows_affected();
        if removed > 0 {
            info!("Session GC removed {} expired sessions", removed);
        }
        Ok(removed)
    }
}
