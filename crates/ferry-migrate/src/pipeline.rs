//! End-to-end stages wired from configuration

use ferry_common::chronometer::format_duration;
use ferry_common::types::ChunkManifest;
use ferry_common::Chronometer;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::MigrateConfig;
use crate::error::Result;
use crate::export::{ChunkedExporter, PgRowSource};
use crate::load::{BulkLoader, CommandDestination, LoadReport};
use crate::remote::{RemoteUrl, Transfer, Uploader};

/// Export every configured table and upload the chunks.
pub async fn run_export(config: &MigrateConfig) -> Result<ChunkManifest> {
    config.validate_export()?;
    let timer = Chronometer::start();
    let remote = RemoteUrl::parse(&config.remote.url)?;
    let transfer = Transfer::from_config(&config.remote)?;

    let source = PgRowSource::connect(&config.source).await?;
    let exporter = ChunkedExporter::new(
        source,
        config.export.output_dir.clone(),
        config.export.lines_to_split,
    )?;

    let manifest = exporter.export_all(&config.tables).await?;
    transfer.upload(exporter.output_dir(), &remote).await?;

    info!("Export stage finished in {}", format_duration(timer.elapsed()));
    Ok(manifest)
}

/// Download the chunks and load them into the destination.
pub async fn run_load(config: &MigrateConfig) -> Result<LoadReport> {
    config.validate_load()?;
    let remote = RemoteUrl::parse(&config.remote.url)?;
    let transfer = Transfer::from_config(&config.remote)?;
    let cancel = CancellationToken::new();

    let inserter = CommandDestination::new(config.destination.clone())
        .with_cancellation(cancel.clone())
        .with_timeout(config.load.job_timeout());
    let loader = BulkLoader::new(
        Arc::new(transfer),
        Arc::new(inserter),
        remote,
        config.load.clone(),
    )
    .with_cancellation(cancel.clone());

    // Ctrl-C stops the workers and kills in-flight client processes.
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling load");
            cancel.cancel();
        }
    });

    let report = loader.run().await;
    watcher.abort();
    report
}

/// Export, then load.
pub async fn run_migrate(config: &MigrateConfig) -> Result<LoadReport> {
    run_export(config).await?;
    run_load(config).await
}
