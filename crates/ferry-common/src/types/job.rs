//! Load jobs and their results

use std::path::PathBuf;
use std::time::Duration;

/// Sequential job identifier, assigned in enumeration order.
pub type JobId = u64;

/// One chunk file to bulk-insert into one destination table.
///
/// `id`, `table` and `file_path` are fixed at creation; `exec_time` is stamped
/// once by the worker that processed the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Identifier unique within one load run
    pub id: JobId,

    /// Destination table the chunk belongs to
    pub table: String,

    /// Local path of the chunk file
    pub file_path: PathBuf,

    /// Wall time spent in the unit of work, set after completion
    pub exec_time: Option<Duration>,
}

impl Job {
    pub fn new(id: JobId, table: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            table: table.into(),
            file_path: file_path.into(),
            exec_time: None,
        }
    }

    /// File name component of `file_path`, for log lines.
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_path.display().to_string())
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    /// The unit of work failed; carries the rendered cause.
    Failed(String),
}

/// Produced exactly once per job by the worker that ran it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub job: Job,
    pub outcome: JobOutcome,
}

impl JobResult {
    pub fn succeeded(job: Job) -> Self {
        Self {
            job,
            outcome: JobOutcome::Succeeded,
        }
    }

    pub fn failed(job: Job, cause: impl Into<String>) -> Self {
        Self {
            job,
            outcome: JobOutcome::Failed(cause.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Succeeded)
    }

    /// Failure cause, if any.
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            JobOutcome::Succeeded => None,
            JobOutcome::Failed(cause) => Some(cause),
        }
    }
}
