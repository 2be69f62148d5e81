//! Postgres and MinIO test containers
//!
//! Tests using these need a running Docker daemon and are marked
//! `#[ignore = "requires Docker"]`.

use anyhow::{Context, Result};
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::Client as S3Client;
use ferry_migrate::config::{S3Config, SourceConfig};
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};
use testcontainers_modules::postgres::Postgres;
use tracing::{debug, info};

pub const MINIO_ACCESS_KEY: &str = "minioadmin";
pub const MINIO_SECRET_KEY: &str = "minioadmin";
pub const TEST_BUCKET: &str = "ferry-staging";

/// Install a test subscriber once; later calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("ferry_migrate=debug")
        .with_test_writer()
        .try_init();
}

// ============================================================================
// PostgreSQL
// ============================================================================

pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    url: String,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container.get_host().await.context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let url = format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);
        debug!("PostgreSQL connection: {}", url);

        Ok(Self {
            _container: container,
            url,
        })
    }

    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            url: self.url.clone(),
            max_connections: 2,
            connect_timeout_secs: 30,
        }
    }

    /// Run setup statements on a short-lived connection.
    pub async fn execute(&self, statements: &[&str]) -> Result<()> {
        let pool = sqlx::PgPool::connect(&self.url)
            .await
            .context("Failed to connect to PostgreSQL")?;
        for statement in statements {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .with_context(|| format!("Failed to run: {}", statement))?;
        }
        pool.close().await;
        Ok(())
    }
}

// ============================================================================
// MinIO
// ============================================================================

pub struct TestMinio {
    _container: ContainerAsync<GenericImage>,
    client: S3Client,
    endpoint: String,
}

impl TestMinio {
    /// Start MinIO with [`TEST_BUCKET`] created.
    pub async fn start() -> Result<Self> {
        info!("Starting MinIO test container...");

        let container = GenericImage::new("minio/minio", "latest")
            .with_exposed_port(9000.tcp())
            .with_wait_for(WaitFor::message_on_stdout("MinIO Object Storage Server"))
            .with_env_var("MINIO_ROOT_USER", MINIO_ACCESS_KEY)
            .with_env_var("MINIO_ROOT_PASSWORD", MINIO_SECRET_KEY)
            .with_cmd(vec!["server", "/data"])
            .start()
            .await
            .context("Failed to start MinIO container")?;

        let host = container.get_host().await.context("Failed to get MinIO host")?;
        let port = container
            .get_host_port_ipv4(9000.tcp())
            .await
            .context("Failed to get MinIO port")?;

        let endpoint = format!("http://{}:{}", host, port);
        debug!("MinIO endpoint: {}", endpoint);

        let config = aws_sdk_s3::Config::builder()
            .endpoint_url(&endpoint)
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new(
                MINIO_ACCESS_KEY,
                MINIO_SECRET_KEY,
                None,
                None,
                "static",
            ))
            .force_path_style(true)
            .build();
        let client = S3Client::from_conf(config);

        client
            .create_bucket()
            .bucket(TEST_BUCKET)
            .send()
            .await
            .context("Failed to create S3 bucket")?;

        Ok(Self {
            _container: container,
            client,
            endpoint,
        })
    }

    /// Transport settings pointing at this container.
    pub fn s3_config(&self) -> S3Config {
        S3Config {
            endpoint: Some(self.endpoint.clone()),
            region: "us-east-1".to_string(),
            access_key: Some(MINIO_ACCESS_KEY.to_string()),
            secret_key: Some(MINIO_SECRET_KEY.to_string()),
            path_style: true,
        }
    }

    pub async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        self.client
            .put_object()
            .bucket(TEST_BUCKET)
            .key(key)
            .body(data.to_vec().into())
            .send()
            .await
            .context("Failed to upload to S3")?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(TEST_BUCKET)
            .key(key)
            .send()
            .await
            .context("Failed to download from S3")?;

        let bytes = response
            .body
            .collect()
            .await
            .context("Failed to read S3 response body")?
            .into_bytes();
        Ok(bytes.to_vec())
    }

    /// Keys under `prefix`, sorted.
    pub async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(TEST_BUCKET)
            .prefix(prefix)
            .send()
            .await
            .context("Failed to list S3 objects")?;

        let mut keys: Vec<String> = response
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(String::from))
            .collect();
        keys.sort();
        Ok(keys)
    }
}
