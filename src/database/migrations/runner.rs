use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;
use tracing::{error, info};

use super::{Migration, MigrationError, MigrationSource};
use crate::database::DatabaseManager;

/// Default name of the ledger table
pub const DEFAULT_LEDGER_TABLE: &str = "schema_migrations";

/// Names applied by one `run`, in the order they were applied
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub applied: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub applied: Vec<String>,
    pub pending: Vec<String>,
}

/// Applies every not-yet-applied unit, one transaction per unit.
///
/// A unit's schema change and its ledger row commit together, so a crash
/// leaves either both or neither. The first failure rolls back that unit
/// and stops the run; units committed before it stay applied.
pub struct MigrationRunner {
    pool: PgPool,
    source: Arc<dyn MigrationSource>,
    ledger: String,
}

impl MigrationRunner {
    pub fn new(pool: PgPool, source: impl MigrationSource + 'static) -> Self {
        Self {
            pool,
            source: Arc::new(source),
            ledger: DEFAULT_LEDGER_TABLE.to_string(),
        }
    }

    pub fn with_ledger_table(mut self, table: &str) -> Result<Self, MigrationError> {
        if !DatabaseManager::is_valid_identifier(table) {
            return Err(MigrationError::InvalidLedgerTable(table.to_string()));
        }
        self.ledger = table.to_string();
        Ok(self)
    }

    pub fn ledger_table(&self) -> &str {
        &self.ledger
    }

    pub async fn run(&self) -> Result<MigrationReport, MigrationError> {
        self.ensure_ledger().await?;
        let applied = self.applied_names().await?;
        let units = self.source.discover()?;

        let mut report = MigrationReport::default();
        for unit in pending(&units, &applied) {
            if self.apply_one(unit.as_ref()).await? {
                info!("Applied migration {}", unit.name());
                report.applied.push(unit.name().to_string());
            }
        }

        if report.applied.is_empty() {
            info!("Schema is up to date ({} migrations applied)", applied.len());
        }
        Ok(report)
    }

    /// Applied and pending names without changing anything but the
    /// (idempotent) ledger table creation
    pub async fn status(&self) -> Result<MigrationStatus, MigrationError> {
        self.ensure_ledger().await?;
        let applied = self.applied_names().await?;
        let units = self.source.discover()?;
        Ok(MigrationStatus {
            pending: pending(&units, &applied)
                .iter()
                .map(|m| m.name().to_string())
                .collect(),
            applied: applied.into_iter().collect(),
        })
    }

    fn quoted_ledger(&self) -> String {
        DatabaseManager::quote_identifier(&self.ledger)
    }

    async fn ensure_ledger(&self) -> Result<(), MigrationError> {
        let query = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
                 name TEXT PRIMARY KEY, \
                 applied_at TIMESTAMPTZ NOT NULL DEFAULT now()\
             )",
            self.quoted_ledger()
        );
        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(MigrationError::Ledger)?;
        Ok(())
    }

    async fn applied_names(&self) -> Result<BTreeSet<String>, MigrationError> {
        let query = format!("SELECT name FROM {}", self.quoted_ledger());
        let names: Vec<String> = sqlx::query_scalar(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(MigrationError::Ledger)?;
        Ok(names.into_iter().collect())
    }

    /// Returns false when another process applied the unit first.
    async fn apply_one(&self, unit: &dyn Migration) -> Result<bool, MigrationError> {
        let name = unit.name();
        let mut tx = self.pool.begin().await.map_err(MigrationError::Ledger)?;

        // Serialise concurrent runners on the same ledger, then re-check
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&self.ledger)
            .execute(&mut *tx)
            .await
            .map_err(MigrationError::Ledger)?;
        let exists_query = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE name = $1)",
            self.quoted_ledger()
        );
        let already: bool = sqlx::query_scalar(&exists_query)
            .bind(name)
            .fetch_one(&mut *tx)
            .await
            .map_err(MigrationError::Ledger)?;
        if already {
            tx.rollback().await.map_err(MigrationError::Ledger)?;
            return Ok(false);
        }

        if let Err(source) = unit.apply(&mut *tx).await {
            error!("Migration {} failed, rolling back: {}", name, source);
            if let Err(e) = tx.rollback().await {
                error!("Rollback of migration {} failed: {}", name, e);
            }
            return Err(MigrationError::Apply {
                name: name.to_string(),
                source,
            });
        }

        let insert = format!("INSERT INTO {} (name) VALUES ($1)", self.quoted_ledger());
        if let Err(e) = sqlx::query(&insert).bind(name).execute(&mut *tx).await {
            if let Err(rollback) = tx.rollback().await {
                error!("Rollback of migration {} failed: {}", name, rollback);
            }
            return Err(MigrationError::Ledger(e));
        }

        tx.commit().await.map_err(MigrationError::Ledger)?;
        Ok(true)
    }
}

/// Units whose names are not in `applied`, keeping discovery order
pub(crate) fn pending<'a>(
    units: &'a [Arc<dyn Migration>],
    applied: &BTreeSet<String>,
) -> Vec<&'a Arc<dyn Migration>> {
    units
        .iter()
        .filter(|unit| !applied.contains(unit.name()))
        .collect()
}
