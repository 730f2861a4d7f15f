use async_trait::async_trait;
use sqlx::{Executor, PgConnection, PgPool};
use tracing::debug;

use super::{Migration, MigrationError, MigrationRegistry, MigrationRunner};
use crate::config::AppConfig;
use crate::database::DatabaseManager;
use crate::session::DEFAULT_SESSION_TABLE;

/// `0001_create_sessions`: the table behind `PgSessionStore`
#[derive(Debug, Clone)]
pub struct CreateSessionsTable {
    table: String,
}

impl CreateSessionsTable {
    pub const NAME: &'static str = "0001_create_sessions";

    pub fn new(table: &str) -> Result<Self, MigrationError> {
        if !DatabaseManager::is_valid_identifier(table) {
            return Err(MigrationError::InvalidTable(table.to_string()));
        }
        Ok(Self {
            table: table.to_string(),
        })
    }
}

impl Default for CreateSessionsTable {
    fn default() -> Self {
        Self {
            table: DEFAULT_SESSION_TABLE.to_string(),
        }
    }
}

#[async_trait]
impl Migration for CreateSessionsTable {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn apply(&self, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
        let table = DatabaseManager::quote_identifier(&self.table);
        let index = DatabaseManager::quote_identifier(&format!("{}_last_activity_idx", self.table));
        let sql = format!(
            "CREATE TABLE {table} (\
                 id TEXT PRIMARY KEY, \
                 payload BYTEA NOT NULL, \
                 last_activity TIMESTAMPTZ NOT NULL DEFAULT now()\
             ); \
             CREATE INDEX {index} ON {table} (last_activity);"
        );
        (&mut *conn).execute(sql.as_str()).await?;
        Ok(())
    }
}

/// Registry holding the units this crate itself needs
pub fn builtin_registry(session_table: &str) -> Result<MigrationRegistry, MigrationError> {
    let mut registry = MigrationRegistry::new();
    registry.register(CreateSessionsTable::new(session_table)?)?;
    Ok(registry)
}

/// Built-in units plus the configured SQL directory, if it exists
pub fn configured_registry(config: &AppConfig) -> Result<MigrationRegistry, MigrationError> {
    let mut registry = builtin_registry(&config.session.table)?;
    if let Some(dir) = &config.migrations.directory {
        if dir.is_dir() {
            registry.load_directory(dir)?;
        } else {
            debug!("Migration directory {} not present, skipping", dir.display());
        }
    }
    Ok(registry)
}

/// Runner over `configured_registry` with the configured ledger table
pub fn configured_runner(pool: PgPool, config: &AppConfig) -> Result<MigrationRunner, MigrationError> {
    MigrationRunner::new(pool, configured_registry(config)?)
        .with_ledger_table(&config.migrations.ledger_table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::migrations::MigrationSource;

    #[test]
    fn builtin_registry_contains_sessions_table() {
        let registry = builtin_registry("sessions").unwrap();
        let units = registry.discover().unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].name(), CreateSessionsTable::NAME);
    }

    #[test]
    fn configured_registry_adds_sql_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("0002_boards.sql"), "CREATE TABLE boards (id INT);").unwrap();

        let mut config = AppConfig::preset(crate::config::Environment::Development);
        config.migrations.directory = Some(dir.path().to_path_buf());
        let registry = configured_registry(&config).unwrap();
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec![CreateSessionsTable::NAME, "0002_boards"]
        );

        config.migrations.directory = Some(dir.path().join("absent"));
        assert_eq!(configured_registry(&config).unwrap().len(), 1);
    }

    #[test]
    fn rejects_unsafe_session_table() {
        assert!(matches!(
            builtin_registry("sessions\"; --"),
            Err(MigrationError::InvalidTable(table)) if table == "sessions\"; --"
        ));
        assert!(matches!(
            CreateSessionsTable::new("Sessions"),
            Err(MigrationError::InvalidTable(_))
        ));
    }
}
