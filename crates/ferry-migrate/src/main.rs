//! ferry - bulk table transfer tool

use anyhow::{Context, Result};
use clap::Parser;
use ferry_common::logging::{init_logging, LogConfig, LogLevel};
use ferry_migrate::cli::{Cli, Command};
use ferry_migrate::config::MigrateConfig;
use ferry_migrate::pipeline;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("ferry")
        .build();

    // Environment variables take precedence
    let log_config = LogConfig::from_env_with(log_config)?;
    let _guard = init_logging(&log_config)?;

    let mut config =
        MigrateConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.command.apply_overrides(&mut config);
    config.validate()?;

    match cli.command {
        Command::Export => {
            let manifest = pipeline::run_export(&config).await?;
            info!(
                "Exported {} rows into {} chunks",
                manifest.total_rows(),
                manifest.total_chunks()
            );
        },
        Command::Load { .. } => {
            let report = pipeline::run_load(&config).await?;
            info!("Loaded {} chunks", report.succeeded);
        },
        Command::Migrate => {
            let report = pipeline::run_migrate(&config).await?;
            info!("Migration complete: {} chunks loaded", report.succeeded);
        },
    }

    Ok(())
}
