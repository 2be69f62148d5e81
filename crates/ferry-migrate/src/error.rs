//! Error types for the export and load pipeline
//!
//! Every variant names the stage that failed, so the binary can report a
//! single line such as `Transfer error (download): 'gsutil' exited with ...`.

use ferry_common::types::JobId;
use ferry_common::FerryError;
use thiserror::Error;

use crate::process::CommandError;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, MigrateError>;

#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load configuration: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Source connection failed: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Query failed for table '{table}': {source}")]
    Query {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Unsupported column type '{type_name}' at position {index} in table '{table}'")]
    UnsupportedColumn {
        table: String,
        index: usize,
        type_name: String,
    },

    #[error("Export of table '{table}' failed: {source}")]
    Export {
        table: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Transfer error ({operation}): {source}")]
    Transfer {
        operation: &'static str,
        #[source]
        source: CommandError,
    },

    #[error("Object store error ({operation}): {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },

    #[error("Bootstrap failed: {0}")]
    Bootstrap(#[source] CommandError),

    #[error("Bulk insert failed for table '{table}': {source}")]
    BulkInsert {
        table: String,
        #[source]
        source: CommandError,
    },

    #[error("Chunk listed in manifest is missing: {0}")]
    MissingChunk(String),

    #[error("Load job {job_id} ({file}) failed: {cause}")]
    Load {
        job_id: JobId,
        file: String,
        cause: String,
    },

    #[error("{failed} of {total} load jobs failed")]
    LoadAggregate { failed: usize, total: usize },

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] FerryError),
}

impl MigrateError {
    pub fn config(msg: impl Into<String>) -> Self {
        MigrateError::Config(msg.into())
    }

    pub fn export(table: impl Into<String>, source: impl Into<std::io::Error>) -> Self {
        MigrateError::Export {
            table: table.into(),
            source: source.into(),
        }
    }
}
