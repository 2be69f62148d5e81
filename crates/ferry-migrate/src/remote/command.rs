//! Transfers through an external copy tool such as `gsutil`

use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use super::{Downloader, RemoteUrl, Uploader};
use crate::config::TransferCommandConfig;
use crate::error::{MigrateError, Result};
use crate::process::ExternalCommand;

const LOCAL_PLACEHOLDER: &str = "{local}";
const REMOTE_PLACEHOLDER: &str = "{remote}";

#[derive(Debug, Clone)]
pub struct CommandTransfer {
    config: TransferCommandConfig,
}

impl CommandTransfer {
    pub fn new(config: TransferCommandConfig) -> Self {
        Self { config }
    }

    /// Upload command with placeholders filled in.
    pub fn upload_command(&self, local_dir: &Path, remote: &RemoteUrl) -> ExternalCommand {
        self.command(&self.config.upload_args, local_dir, remote)
    }

    /// Download command with placeholders filled in.
    pub fn download_command(&self, remote: &RemoteUrl, local_dir: &Path) -> ExternalCommand {
        self.command(&self.config.download_args, local_dir, remote)
    }

    fn command(&self, templates: &[String], local_dir: &Path, remote: &RemoteUrl) -> ExternalCommand {
        let local = local_dir.display().to_string();
        let remote = remote.to_string();

        ExternalCommand::new(&self.config.program).args(templates.iter().map(|t| {
            t.replace(LOCAL_PLACEHOLDER, &local)
                .replace(REMOTE_PLACEHOLDER, &remote)
        }))
    }
}

#[async_trait]
impl Uploader for CommandTransfer {
    async fn upload(&self, local_dir: &Path, remote: &RemoteUrl) -> Result<()> {
        let command = self.upload_command(local_dir, remote);
        info!("Uploading {} to {}", local_dir.display(), remote);

        command
            .run()
            .await
            .map_err(|source| MigrateError::Transfer {
                operation: "upload",
                source,
            })
    }
}

#[async_trait]
impl Downloader for CommandTransfer {
    async fn download(&self, remote: &RemoteUrl, local_dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(local_dir).await?;

        let command = self.download_command(remote, local_dir);
        info!("Downloading {} to {}", remote, local_dir.display());

        command
            .run()
            .await
            .map_err(|source| MigrateError::Transfer {
                operation: "download",
                source,
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_gsutil_templates() {
        let transfer = CommandTransfer::new(TransferCommandConfig::default());
        let remote = RemoteUrl::parse("gs://staging/app").unwrap();
        let local = PathBuf::from("/data/export");

        let upload = transfer.upload_command(&local, &remote);
        assert_eq!(upload.program(), "gsutil");
        assert_eq!(
            upload.get_args(),
            [
                "-m",
                "cp",
                "/data/export/*_split_*",
                "/data/export/manifest.json",
                "gs://staging/app/"
            ]
        );

        let download = transfer.download_command(&remote, &local);
        assert_eq!(download.get_args(), ["-m", "cp", "gs://staging/app/*", "/data/export/"]);
    }

    #[tokio::test]
    async fn test_failed_tool_maps_to_transfer_error() {
        let transfer = CommandTransfer::new(TransferCommandConfig {
            program: "false".to_string(),
            upload_args: vec![],
            download_args: vec![],
        });
        let remote = RemoteUrl::parse("gs://staging").unwrap();
        let dir = tempfile::tempdir().unwrap();

        let err = transfer.upload(dir.path(), &remote).await.unwrap_err();
        assert!(matches!(err, MigrateError::Transfer { operation: "upload", .. }));
    }
}
