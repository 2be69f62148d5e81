// Bulk loading
//
// Bootstrap (optional) -> download -> discover jobs -> worker pool -> collect
// results -> cleanup. Each job bulk-inserts one chunk file and deletes it on
// success; the work directory itself is removed only when every job
// succeeded, so failed chunks stay on disk for inspection.

mod destination;
mod discover;

pub use destination::{BulkInserter, CommandDestination};
pub use discover::discover_jobs;

use async_trait::async_trait;
use ferry_common::chronometer::format_duration;
use ferry_common::types::{Job, JobResult};
use ferry_common::Chronometer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::{FailurePolicy, LoadConfig};
use crate::error::{MigrateError, Result};
use crate::pool::{JobHandler, WorkerPool};
use crate::remote::{Downloader, RemoteUrl};

/// Outcome of one load run
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub jobs: usize,
    pub succeeded: usize,
    pub failed: Vec<JobResult>,
    pub elapsed: Duration,
}

impl LoadReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Bulk-inserts the job's chunk, then deletes the chunk file.
struct ChunkLoadHandler {
    inserter: Arc<dyn BulkInserter>,
}

#[async_trait]
impl JobHandler for ChunkLoadHandler {
    async fn handle(&self, job: &Job) -> anyhow::Result<()> {
        self.inserter.bulk_insert(&job.table, &job.file_path).await?;
        tokio::fs::remove_file(&job.file_path).await?;
        Ok(())
    }
}

pub struct BulkLoader {
    downloader: Arc<dyn Downloader>,
    inserter: Arc<dyn BulkInserter>,
    remote: RemoteUrl,
    settings: LoadConfig,
    cancel: CancellationToken,
}

impl BulkLoader {
    pub fn new(
        downloader: Arc<dyn Downloader>,
        inserter: Arc<dyn BulkInserter>,
        remote: RemoteUrl,
        settings: LoadConfig,
    ) -> Self {
        Self {
            downloader,
            inserter,
            remote,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Share a cancellation token with the inserter's client processes.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Full load: bootstrap, download, load every chunk, clean up.
    #[instrument(skip(self), fields(run_id = %Uuid::new_v4(), remote = %self.remote))]
    pub async fn run(&self) -> Result<LoadReport> {
        let work_dir = &self.settings.work_dir;

        // Step 1: Schema bootstrap
        if self.settings.bootstrap {
            let script = self.settings.bootstrap_script.as_deref().ok_or_else(|| {
                MigrateError::config("load.bootstrap is enabled but load.bootstrap_script is not set")
            })?;
            self.inserter.bootstrap(script).await?;
        }

        // Step 2: Fetch chunks
        self.downloader.download(&self.remote, work_dir).await?;

        // Step 3: Enumerate jobs
        let jobs = discover_jobs(work_dir)?;
        info!("Discovered {} load jobs in {}", jobs.len(), work_dir.display());

        // Step 4: Load
        let report = self.load_jobs(jobs).await?;

        // Step 5: Cleanup
        if report.is_success() {
            tokio::fs::remove_dir_all(work_dir).await?;
            info!("Removed work directory {}", work_dir.display());
            Ok(report)
        } else {
            warn!(
                "{} chunks failed and were left in {}",
                report.failed.len(),
                work_dir.display()
            );
            Err(MigrateError::LoadAggregate {
                failed: report.failed.len(),
                total: report.jobs,
            })
        }
    }

    /// Run `jobs` through the worker pool and collect every result.
    ///
    /// With [`FailurePolicy::Abort`] the first failure cancels the pool and is
    /// returned as the error; jobs that had not started are never run. With
    /// [`FailurePolicy::Continue`] every job runs and failures are reported
    /// in the returned [`LoadReport`].
    pub async fn load_jobs(&self, jobs: Vec<Job>) -> Result<LoadReport> {
        let timer = Chronometer::start();
        let total = jobs.len();
        let workers = self.settings.workers;

        let handler = Arc::new(ChunkLoadHandler {
            inserter: Arc::clone(&self.inserter),
        });
        let pool = WorkerPool::new(workers, handler)?
            .with_job_timeout(self.settings.job_timeout())
            .with_cancellation(self.cancel.child_token());
        let cancel = pool.cancellation_token();

        let (job_tx, job_rx) = async_channel::bounded::<Job>(workers);
        let (result_tx, mut result_rx) = mpsc::channel::<JobResult>(workers);

        let handle = pool.run(job_rx, result_tx);

        // Producer: enqueue in enumeration order, then close the channel.
        let producer = tokio::spawn(async move {
            for job in jobs {
                if job_tx.send(job).await.is_err() {
                    break;
                }
            }
        });

        let mut succeeded = 0usize;
        let mut failed = Vec::new();
        let mut first_failure = None;

        // Collector: ends once every worker has exited.
        while let Some(result) = result_rx.recv().await {
            let exec_time = format_duration(result.job.exec_time.unwrap_or_default());
            match result.error() {
                None => {
                    succeeded += 1;
                    info!("Job {} ({}) finished in {}", result.job.id, result.job.file_name(), exec_time);
                },
                Some(cause) => {
                    error!(
                        "Job {} ({}) failed after {}: {}",
                        result.job.id,
                        result.job.file_name(),
                        exec_time,
                        cause
                    );
                    if self.settings.failure_policy == FailurePolicy::Abort && first_failure.is_none() {
                        first_failure = Some(MigrateError::Load {
                            job_id: result.job.id,
                            file: result.job.file_name(),
                            cause: cause.to_string(),
                        });
                        cancel.cancel();
                    }
                    failed.push(result);
                },
            }
        }

        handle.join().await?;
        // Workers are gone, so a blocked producer sees the channel closed.
        producer
            .await
            .map_err(|e| MigrateError::Worker(e.to_string()))?;

        if let Some(err) = first_failure {
            return Err(err);
        }

        let report = LoadReport {
            jobs: total,
            succeeded,
            failed,
            elapsed: timer.elapsed(),
        };

        info!(
            "Loaded {}/{} chunks with {} workers in {}",
            report.succeeded,
            report.jobs,
            workers,
            format_duration(report.elapsed)
        );

        Ok(report)
    }
}
