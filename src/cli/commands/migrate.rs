use anyhow::Context;
use clap::Subcommand;
use serde_json::json;

use crate::cli::output::{output_lines, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::database::migrations::configured_runner;
use crate::database::DatabaseManager;

#[derive(Subcommand)]
pub enum MigrateCommands {
    #[command(about = "Apply every pending migration")]
    Run,

    #[command(about = "List applied and pending migrations without applying anything")]
    Status,
}

pub async fn handle(cmd: MigrateCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    let runner = configured_runner(pool, config)?;

    match cmd {
        MigrateCommands::Run => {
            let report = runner.run().await?;
            let message = if report.applied.is_empty() {
                "Schema is up to date".to_string()
            } else {
                format!("Applied {} migration(s)", report.applied.len())
            };
            output_success(output_format, &message, Some(json!({ "applied": report.applied })))?;
            output_lines(output_format, &report.applied);
        }
        MigrateCommands::Status => {
            let status = runner.status().await?;
            let message = format!(
                "{} applied, {} pending (ledger {})",
                status.applied.len(),
                status.pending.len(),
                runner.ledger_table()
            );
            output_success(output_format, &message, Some(serde_json::to_value(&status)?))?;

            let lines: Vec<String> = status
                .applied
                .iter()
                .map(|name| format!("applied  {}", name))
                .chain(status.pending.iter().map(|name| format!("pending  {}", name)))
                .collect();
            output_lines(output_format, &lines);
        }
    }
    Ok(())
}
