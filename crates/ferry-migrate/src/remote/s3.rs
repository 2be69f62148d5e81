//! Native S3 transport
//!
//! Works against AWS and S3-compatible stores (MinIO, GCS interoperability)
//! through a custom endpoint and optional path-style addressing. The bucket
//! and key prefix come from the `s3://bucket/prefix` remote URL.

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    Client,
};
use ferry_common::types::{is_chunk_file_name, MANIFEST_FILE_NAME};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use super::{Downloader, RemoteUrl, Uploader};
use crate::config::S3Config;
use crate::error::{MigrateError, Result};

const CREDENTIALS_PROVIDER: &str = "ferry-config";

#[derive(Clone)]
pub struct S3Transfer {
    client: Client,
}

impl S3Transfer {
    pub fn new(config: &S3Config) -> Result<Self> {
        let access_key = config
            .access_key
            .clone()
            .or_else(|| std::env::var("AWS_ACCESS_KEY_ID").ok())
            .ok_or_else(|| MigrateError::config("S3 access key not set (remote.s3.access_key or AWS_ACCESS_KEY_ID)"))?;
        let secret_key = config
            .secret_key
            .clone()
            .or_else(|| std::env::var("AWS_SECRET_ACCESS_KEY").ok())
            .ok_or_else(|| {
                MigrateError::config("S3 secret key not set (remote.s3.secret_key or AWS_SECRET_ACCESS_KEY)")
            })?;

        let credentials = Credentials::new(access_key, secret_key, None, None, CREDENTIALS_PROVIDER);

        let mut builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        info!(region = %config.region, endpoint = ?config.endpoint, "S3 transport initialized");

        Ok(Self {
            client: Client::from_conf(builder.build()),
        })
    }

    async fn put_file(&self, path: &Path, bucket: &str, key: &str) -> Result<()> {
        debug!("Uploading {} to s3://{}/{}", path.display(), bucket, key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| storage_error("upload", e))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| storage_error("upload", DisplayErrorContext(e)))?;

        Ok(())
    }

    async fn get_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()> {
        debug!("Downloading s3://{}/{} to {}", bucket, key, path.display());

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_error("download", DisplayErrorContext(e)))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| storage_error("download", e))?
            .into_bytes();

        tokio::fs::write(path, data).await?;

        Ok(())
    }
}

#[async_trait]
impl Uploader for S3Transfer {
    #[instrument(skip(self, remote), fields(remote = %remote))]
    async fn upload(&self, local_dir: &Path, remote: &RemoteUrl) -> Result<()> {
        let files = upload_candidates(local_dir)?;

        for path in &files {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            self.put_file(path, remote.bucket(), &remote.key_for(name))
                .await?;
        }

        info!("Uploaded {} files to {}", files.len(), remote);
        Ok(())
    }
}

#[async_trait]
impl Downloader for S3Transfer {
    #[instrument(skip(self, remote), fields(remote = %remote))]
    async fn download(&self, remote: &RemoteUrl, local_dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(local_dir).await?;

        let prefix = if remote.prefix().is_empty() {
            String::new()
        } else {
            format!("{}/", remote.prefix())
        };

        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(remote.bucket())
            .prefix(&prefix)
            .into_paginator()
            .send();

        let mut downloaded = 0usize;
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| storage_error("list", DisplayErrorContext(e)))?;

            for object in page.contents() {
                let Some(key) = object.key() else {
                    continue;
                };
                let Some(name) = key.strip_prefix(prefix.as_str()) else {
                    continue;
                };
                // Objects in nested "directories" belong to other exports.
                if name.is_empty() || name.contains('/') {
                    continue;
                }

                self.get_file(remote.bucket(), key, &local_dir.join(name))
                    .await?;
                downloaded += 1;
            }
        }

        info!("Downloaded {} files from {}", downloaded, remote);
        Ok(())
    }
}

/// Chunk files plus the manifest, sorted by name.
fn upload_candidates(local_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(local_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name == MANIFEST_FILE_NAME || is_chunk_file_name(&name) {
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files)
}

fn storage_error(operation: &'static str, err: impl std::fmt::Display) -> MigrateError {
    MigrateError::Storage {
        operation,
        message: err.to_string(),
    }
}
