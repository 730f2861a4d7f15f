use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Executor, PgConnection};
use tracing::debug;

use super::{Migration, MigrationError};

/// Where the runner discovers its units
pub trait MigrationSource: Send + Sync {
    /// All known units, sorted by name
    fn discover(&self) -> Result<Vec<Arc<dyn Migration>>, MigrationError>;
}

/// Migration expressed as a SQL script, executed with the simple query
/// protocol so one script may hold several statements.
#[derive(Debug, Clone)]
pub struct SqlMigration {
    name: String,
    sql: String,
}

impl SqlMigration {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

#[async_trait]
impl Migration for SqlMigration {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
        (&mut *conn).execute(self.sql.as_str()).await?;
        Ok(())
    }
}

/// Units keyed by name. Iteration order is the application order.
#[derive(Default, Clone)]
pub struct MigrationRegistry {
    units: BTreeMap<String, Arc<dyn Migration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, migration: impl Migration + 'static) -> Result<&mut Self, MigrationError> {
        self.register_arc(Arc::new(migration))
    }

    pub fn register_arc(&mut self, migration: Arc<dyn Migration>) -> Result<&mut Self, MigrationError> {
        let name = migration.name().to_string();
        if !is_valid_name(&name) {
            return Err(MigrationError::InvalidName(name));
        }
        if self.units.contains_key(&name) {
            return Err(MigrationError::DuplicateName(name));
        }
        self.units.insert(name, migration);
        Ok(self)
    }

    /// Registers every `*.sql` file in `dir` as a unit named by its file
    /// stem. Other files and subdirectories are ignored.
    pub fn load_directory(&mut self, dir: &Path) -> Result<usize, MigrationError> {
        let source_err = |source| MigrationError::Source {
            path: dir.display().to_string(),
            source,
        };

        let mut loaded = 0;
        for entry in std::fs::read_dir(dir).map_err(source_err)? {
            let path = entry.map_err(source_err)?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("sql") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let sql = std::fs::read_to_string(&path).map_err(|source| MigrationError::Source {
                path: path.display().to_string(),
                source,
            })?;
            self.register(SqlMigration::new(name, sql))?;
            debug!("Loaded SQL migration {}", name);
            loaded += 1;
        }
        Ok(loaded)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Migration>> {
        self.units.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl MigrationSource for MigrationRegistry {
    fn discover(&self) -> Result<Vec<Arc<dyn Migration>>, MigrationError> {
        Ok(self.units.values().cloned().collect())
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}
