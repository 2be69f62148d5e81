//! Remote staging area
//!
//! Chunk files travel between the export host, an object store and the load
//! host. [`Uploader`] and [`Downloader`] are the two directions; [`Transfer`]
//! picks an implementation from configuration.

mod command;
mod s3;

pub use command::CommandTransfer;
pub use s3::S3Transfer;

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use url::Url;

use crate::config::{RemoteConfig, TransportKind};
use crate::error::{MigrateError, Result};

/// Copies the chunk files and manifest of `local_dir` to `remote`.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, local_dir: &Path, remote: &RemoteUrl) -> Result<()>;
}

/// Copies every object under `remote` into `local_dir`.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, remote: &RemoteUrl, local_dir: &Path) -> Result<()>;
}

/// `scheme://bucket[/prefix]`, e.g. `gs://staging/app/2024-06-01`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    scheme: String,
    bucket: String,
    prefix: String,
}

impl RemoteUrl {
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input)
            .map_err(|e| MigrateError::config(format!("invalid remote URL '{}': {}", input, e)))?;

        let bucket = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| MigrateError::config(format!("remote URL '{}' has no bucket", input)))?
            .to_string();

        let prefix = url.path().trim_matches('/').to_string();

        Ok(Self {
            scheme: url.scheme().to_string(),
            bucket,
            prefix,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Key prefix without leading or trailing slashes; may be empty.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Object key for `name` under the prefix.
    pub fn key_for(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }
}

impl fmt::Display for RemoteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.bucket)?;
        if !self.prefix.is_empty() {
            write!(f, "/{}", self.prefix)?;
        }
        Ok(())
    }
}

/// Configured transport
pub enum Transfer {
    Command(CommandTransfer),
    S3(S3Transfer),
}

impl Transfer {
    pub fn from_config(config: &RemoteConfig) -> Result<Self> {
        match config.transport {
            TransportKind::Command => Ok(Transfer::Command(CommandTransfer::new(config.command.clone()))),
            TransportKind::S3 => Ok(Transfer::S3(S3Transfer::new(&config.s3)?)),
        }
    }
}

#[async_trait]
impl Uploader for Transfer {
    async fn upload(&self, local_dir: &Path, remote: &RemoteUrl) -> Result<()> {
        match self {
            Transfer::Command(t) => t.upload(local_dir, remote).await,
            Transfer::S3(t) => t.upload(local_dir, remote).await,
        }
    }
}

#[async_trait]
impl Downloader for Transfer {
    async fn download(&self, remote: &RemoteUrl, local_dir: &Path) -> Result<()> {
        match self {
            Transfer::Command(t) => t.download(remote, local_dir).await,
            Transfer::S3(t) => t.download(remote, local_dir).await,
        }
    }
}
