//! Error types shared by the ferry crates

use thiserror::Error;

/// Result type alias for ferry-common operations
pub type Result<T> = std::result::Result<T, FerryError>;

/// Errors raised while handling chunk files, manifests and shared configuration
#[derive(Error, Debug)]
pub enum FerryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid chunk file name: {0}")]
    InvalidChunkName(String),

    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Manifest not found: {0}")]
    ManifestNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FerryError {
    pub fn config(msg: impl Into<String>) -> Self {
        FerryError::Config(msg.into())
    }
}
