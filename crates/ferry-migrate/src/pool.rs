//! Fixed-size worker pool
//!
//! `N` tasks drain a shared MPMC job channel. Each job runs through a
//! [`JobHandler`], is timed, stamped with `exec_time` and published as exactly
//! one [`JobResult`]. Workers exit once the job channel is closed and drained
//! (or the pool is cancelled). Every worker owns a clone of the results
//! sender, so the results channel closes only after the last worker exits.

use async_trait::async_trait;
use ferry_common::types::{Job, JobResult};
use ferry_common::Chronometer;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, Instrument};

use crate::error::{MigrateError, Result};

/// Unit of work executed for every job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> anyhow::Result<()>;
}

pub struct WorkerPool {
    workers: usize,
    handler: Arc<dyn JobHandler>,
    job_timeout: Option<Duration>,
    cancel: CancellationToken,
    processing: Arc<AtomicUsize>,
}

/// State every worker of one run reads.
struct Shared {
    handler: Arc<dyn JobHandler>,
    job_timeout: Option<Duration>,
    cancel: CancellationToken,
    processing: Arc<AtomicUsize>,
}

impl WorkerPool {
    pub fn new(workers: usize, handler: Arc<dyn JobHandler>) -> Result<Self> {
        if workers == 0 {
            return Err(MigrateError::config("worker pool needs at least one worker"));
        }

        Ok(Self {
            workers,
            handler,
            job_timeout: None,
            cancel: CancellationToken::new(),
            processing: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Abandon any single job running longer than `timeout`.
    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Token that stops every worker; in-flight jobs are abandoned and
    /// reported as failed.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Jobs currently being processed.
    pub fn processing(&self) -> usize {
        self.processing.load(Ordering::SeqCst)
    }

    /// Spawn exactly `workers` tasks draining `jobs` into `results`.
    ///
    /// The producer closes `jobs` once every job is enqueued; the collector
    /// sees `results` close once every worker has exited.
    pub fn run(
        &self,
        jobs: async_channel::Receiver<Job>,
        results: mpsc::Sender<JobResult>,
    ) -> PoolHandle {
        let shared = Arc::new(Shared {
            handler: Arc::clone(&self.handler),
            job_timeout: self.job_timeout,
            cancel: self.cancel.clone(),
            processing: Arc::clone(&self.processing),
        });

        let handles = (0..self.workers)
            .map(|worker_id| {
                let shared = Arc::clone(&shared);
                let jobs = jobs.clone();
                let results = results.clone();
                tokio::spawn(
                    worker_loop(shared, jobs, results).instrument(info_span!("worker", worker_id)),
                )
            })
            .collect();

        PoolHandle { handles }
    }
}

/// Join handle over every worker of one [`WorkerPool::run`].
pub struct PoolHandle {
    handles: Vec<JoinHandle<()>>,
}

impl PoolHandle {
    /// Wait for every worker to exit.
    pub async fn join(self) -> Result<()> {
        for handle in self.handles {
            handle
                .await
                .map_err(|e| MigrateError::Worker(e.to_string()))?;
        }
        Ok(())
    }
}

async fn worker_loop(
    shared: Arc<Shared>,
    jobs: async_channel::Receiver<Job>,
    results: mpsc::Sender<JobResult>,
) {
    debug!("Worker started");

    loop {
        let mut job = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => break,
            job = jobs.recv() => match job {
                Ok(job) => job,
                // Closed and drained
                Err(_) => break,
            },
        };

        shared.processing.fetch_add(1, Ordering::SeqCst);
        let (outcome, elapsed) = Chronometer::time(run_job(&shared, &job)).await;
        shared.processing.fetch_sub(1, Ordering::SeqCst);

        job.exec_time = Some(elapsed);
        let result = match outcome {
            Ok(()) => JobResult::succeeded(job),
            Err(cause) => JobResult::failed(job, cause),
        };

        if results.send(result).await.is_err() {
            debug!("Results receiver dropped");
            break;
        }
    }

    debug!("Worker exited");
}

async fn run_job(shared: &Shared, job: &Job) -> std::result::Result<(), String> {
    let work = shared.handler.handle(job);

    tokio::select! {
        biased;
        _ = shared.cancel.cancelled() => Err("cancelled".to_string()),
        outcome = with_timeout(work, shared.job_timeout) => match outcome {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => Err(format!("{:#}", e)),
            None => Err(format!("timed out after {:?}", shared.job_timeout.unwrap_or_default())),
        },
    }
}

async fn with_timeout<F: Future>(fut: F, timeout: Option<Duration>) -> Option<F::Output> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
        None => Some(fut.await),
    }
}
