//! Ordered, transactional schema migrations.
//!
//! Each unit has a unique name and an apply step run inside a transaction
//! together with its ledger insert. Units are resolved from a registry keyed
//! by name; SQL files from a directory are loaded into the same registry.
//! Names sort lexicographically into application order, so the convention is
//! a zero-padded sequence prefix (`0001_create_sessions`).

pub mod builtin;
pub mod registry;
pub mod runner;

pub use builtin::{builtin_registry, configured_registry, configured_runner, CreateSessionsTable};
pub use registry::{MigrationRegistry, MigrationSource, SqlMigration};
pub use runner::{MigrationReport, MigrationRunner, MigrationStatus, DEFAULT_LEDGER_TABLE};

use async_trait::async_trait;
use sqlx::PgConnection;
use thiserror::Error;

/// One named schema change
#[async_trait]
pub trait Migration: Send + Sync {
    fn name(&self) -> &str;

    /// Runs the schema operations on a connection that is already inside
    /// the unit's transaction. Must not commit or roll back itself.
    async fn apply(&self, conn: &mut PgConnection) -> Result<(), sqlx::Error>;
}

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Invalid ledger table name: {0}")]
    InvalidLedgerTable(String),

    #[error("Invalid table name: {0}")]
    InvalidTable(String),

    #[error("Invalid migration name: {0:?}")]
    InvalidName(String),

    #[error("Duplicate migration name: {0}")]
    DuplicateName(String),

    #[error("Could not read migration source {path}: {source}")]
    Source {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Migration ledger error: {0}")]
    Ledger(#[source] sqlx::Error),

    #[error("Migration {name} failed: {source}")]
    Apply {
        name: String,
        #[source]
        source: sqlx::Error,
    },
}
