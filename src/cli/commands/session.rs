use anyhow::Context;
use clap::Subcommand;
use serde_json::json;

use crate::cli::output::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::database::DatabaseManager;
use crate::session::{PgSessionStore, SessionHandler};

#[derive(Subcommand)]
pub enum SessionCommands {
    #[command(about = "Delete sessions idle for longer than the maximum lifetime")]
    Gc {
        #[arg(long, help = "Maximum idle lifetime in seconds (defaults to the configured value)")]
        max_lifetime: Option<u64>,
    },
}

pub async fn handle(cmd: SessionCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        SessionCommands::Gc { max_lifetime } => {
            let max_lifetime = max_lifetime.unwrap_or(config.session.max_lifetime_secs);
            let pool = DatabaseManager::connect(&config.database)
                .await
                .context("failed to connect to database")?;
            let store = PgSessionStore::with_table(pool, &config.session.table)?;

            let removed = store.gc(max_lifetime).await?;
            output_success(
                output_format,
                &format!("Removed {} expired session(s) from {}", removed, store.table()),
                Some(json!({ "removed": removed, "max_lifetime_secs": max_lifetime })),
            )
        }
    }
}
