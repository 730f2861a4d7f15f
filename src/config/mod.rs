use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub migrations: MigrationConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Whether error pages may include diagnostic detail
    pub fn shows_diagnostics(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served when no route matches
    pub static_root: Option<PathBuf>,
    /// `*.html` templates overriding the built-in error pages
    pub templates_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Falls back to `DATABASE_URL` when unset
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            connection_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub table: String,
    pub max_lifetime_secs: u64,
    pub gc_interval_secs: u64,
    pub secure_cookie: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    pub ledger_table: String,
    /// Extra `*.sql` units loaded alongside the built-in ones
    pub directory: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl AppConfig {
    /// Preset from `APP_ENV`, or the YAML file named by `FORUM_CONFIG`,
    /// followed by per-field env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let base = match env::var("FORUM_CONFIG") {
            Ok(path) => Self::from_yaml_file(Path::new(&path))?,
            Err(_) => Self::preset(Self::environment_from_env()),
        };
        Ok(base.with_env_overrides())
    }

    pub fn from_env() -> Self {
        Self::preset(Self::environment_from_env()).with_env_overrides()
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    fn environment_from_env() -> Environment {
        match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        }
    }

    pub fn preset(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("FORUM_HOST") {
            self.server.host = v;
        }
        if let Some(v) = env::var("FORUM_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("FORUM_STATIC_ROOT") {
            self.server.static_root = (!v.is_empty()).then(|| PathBuf::from(v));
        }
        if let Ok(v) = env::var("FORUM_TEMPLATES_DIR") {
            self.server.templates_dir = (!v.is_empty()).then(|| PathBuf::from(v));
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Session overrides
        if let Ok(v) = env::var("SESSION_COOKIE_NAME") {
            self.session.cookie_name = v;
        }
        if let Ok(v) = env::var("SESSION_TABLE") {
            self.session.table = v;
        }
        if let Ok(v) = env::var("SESSION_MAX_LIFETIME_SECS") {
            self.session.max_lifetime_secs = v.parse().unwrap_or(self.session.max_lifetime_secs);
        }
        if let Ok(v) = env::var("SESSION_GC_INTERVAL_SECS") {
            self.session.gc_interval_secs = v.parse().unwrap_or(self.session.gc_interval_secs);
        }
        if let Ok(v) = env::var("SESSION_SECURE_COOKIE") {
            self.session.secure_cookie = v.parse().unwrap_or(self.session.secure_cookie);
        }

        // Migration overrides
        if let Ok(v) = env::var("MIGRATIONS_LEDGER_TABLE") {
            self.migrations.ledger_table = v;
        }
        if let Ok(v) = env::var("MIGRATIONS_DIR") {
            self.migrations.directory = (!v.is_empty()).then(|| PathBuf::from(v));
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                static_root: Some(PathBuf::from("public")),
                templates_dir: Some(PathBuf::from("templates")),
            },
            database: DatabaseConfig::default(),
            session: SessionConfig {
                cookie_name: "forum_session".to_string(),
                table: "sessions".to_string(),
                max_lifetime_secs: 24 * 60 * 60,
                gc_interval_secs: 5 * 60,
                secure_cookie: false,
            },
            migrations: MigrationConfig {
                ledger_table: "schema_migrations".to_string(),
                directory: Some(PathBuf::from("migrations")),
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                static_root: Some(PathBuf::from("public")),
                templates_dir: Some(PathBuf::from("templates")),
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            session: SessionConfig {
                cookie_name: "forum_session".to_string(),
                table: "sessions".to_string(),
                max_lifetime_secs: 24 * 60 * 60,
                gc_interval_secs: 15 * 60,
                secure_cookie: true,
            },
            migrations: MigrationConfig {
                ledger_table: "schema_migrations".to_string(),
                directory: Some(PathBuf::from("migrations")),
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                static_root: Some(PathBuf::from("public")),
                templates_dir: Some(PathBuf::from("templates")),
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            session: SessionConfig {
                cookie_name: "forum_session".to_string(),
                table: "sessions".to_string(),
                max_lifetime_secs: 2 * 60 * 60,
                gc_interval_secs: 15 * 60,
                secure_cookie: true,
            },
            migrations: MigrationConfig {
                ledger_table: "schema_migrations".to_string(),
                directory: Some(PathBuf::from("migrations")),
            },
        }
    }
}

// Global singleton config for the binaries - library code takes config explicitly
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    AppConfig::load().unwrap_or_else(|e| {
        tracing::error!("{}; falling back to environment preset", e);
        AppConfig::from_env()
    })
});

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(config.environment.shows_diagnostics());
        assert!(!config.session.secure_cookie);
        assert_eq!(config.session.table, "sessions");
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(!config.environment.shows_diagnostics());
        assert!(config.session.secure_cookie);
        assert!(config.database.max_connections > AppConfig::development().database.max_connections);
    }

    #[test]
    fn test_yaml_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forum.yaml");
        let mut config = AppConfig::staging();
        config.server.port = 4321;
        std::fs::write(&path, serde_yaml::to_string(&config).unwrap()).unwrap();

        let loaded = AppConfig::from_yaml_file(&path).unwrap();
        assert_eq!(loaded.environment, Environment::Staging);
        assert_eq!(loaded.server.port, 4321);
    }

    #[test]
    fn test_bad_yaml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forum.yaml");
        std::fs::write(&path, "environment: [not, an, enum]").unwrap();
        assert!(matches!(
            AppConfig::from_yaml_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
