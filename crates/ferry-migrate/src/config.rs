//! Configuration management
//!
//! A [`MigrateConfig`] is read once at startup from a TOML file, overlaid with
//! `FERRY__<SECTION>__<KEY>` environment variables (after `.env` is loaded),
//! validated, and then passed by reference into every component.
//!
//! ```toml
//! [source]
//! url = "postgres://reader@source-db/app"
//!
//! [[tables]]
//! name = "users"
//!
//! [[tables]]
//! name = "orders"
//! query = "SELECT * FROM orders WHERE created_at >= '2020-01-01'"
//!
//! [remote]
//! url = "gs://migration-staging/app"
//!
//! [destination]
//! dialect = "mysql"
//! host = "10.0.0.5"
//! user = "loader"
//! database = "app"
//!
//! [load]
//! workers = 8
//! bootstrap = true
//! bootstrap_script = "schema.sql"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{MigrateError, Result};
use crate::remote::RemoteUrl;
use ferry_common::types::validate_table_name;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Prefix of environment variables overriding file configuration.
pub const ENV_PREFIX: &str = "FERRY";

/// Rows per chunk file.
pub const DEFAULT_LINES_TO_SPLIT: u64 = 1_000_000;

/// Concurrent bulk-insert workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Local directory the exporter writes chunk files to.
pub const DEFAULT_EXPORT_DIR: &str = "./ferry-export";

/// Local directory the loader downloads chunk files into.
pub const DEFAULT_WORK_DIR: &str = "./ferry-load";

/// Maximum source database connections.
pub const DEFAULT_SOURCE_MAX_CONNECTIONS: u32 = 2;

/// Source database connection timeout in seconds.
pub const DEFAULT_SOURCE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default transfer tool.
pub const DEFAULT_TRANSFER_PROGRAM: &str = "gsutil";

/// Default S3 region.
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrateConfig {
    #[serde(default)]
    pub source: SourceConfig,

    /// Tables to export, in order
    #[serde(default)]
    pub tables: Vec<TableConfig>,

    #[serde(default)]
    pub export: ExportConfig,

    pub remote: RemoteConfig,

    #[serde(default)]
    pub destination: DestinationConfig,

    #[serde(default)]
    pub load: LoadConfig,
}

/// Source database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub url: String,

    #[serde(default = "default_source_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_source_connect_timeout")]
    pub connect_timeout_secs: u64,
}

/// One table to export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Table name; also the destination table and the chunk file prefix
    pub name: String,

    /// Query to export; defaults to `SELECT * FROM <name>`
    #[serde(default)]
    pub query: Option<String>,
}

impl TableConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: None,
        }
    }

    pub fn query(&self) -> String {
        self.query
            .clone()
            .unwrap_or_else(|| format!("SELECT * FROM {}", self.name))
    }
}

/// Export stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_export_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_lines_to_split")]
    pub lines_to_split: u64,
}

/// How chunk files reach the object store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Shell out to a transfer tool such as `gsutil` or `aws`
    #[default]
    Command,
    /// Native S3 client
    S3,
}

/// Remote staging area configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// e.g. `gs://bucket/prefix` or `s3://bucket/prefix`
    pub url: String,

    #[serde(default)]
    pub transport: TransportKind,

    #[serde(default)]
    pub command: TransferCommandConfig,

    #[serde(default)]
    pub s3: S3Config,
}

/// Argument templates for the transfer tool.
///
/// `{local}` and `{remote}` are replaced with the local directory and the
/// remote URL. Arguments are passed without a shell; the tool itself must
/// expand wildcards (gsutil does).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCommandConfig {
    pub program: String,
    pub upload_args: Vec<String>,
    pub download_args: Vec<String>,
}

/// S3 client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// Custom endpoint (MinIO, GCS interoperability, ...)
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_s3_region")]
    pub region: String,

    /// Falls back to `AWS_ACCESS_KEY_ID`
    #[serde(default)]
    pub access_key: Option<String>,

    /// Falls back to `AWS_SECRET_ACCESS_KEY`
    #[serde(default)]
    pub secret_key: Option<String>,

    #[serde(default)]
    pub path_style: bool,
}

/// Destination SQL dialect; selects the client tool and load statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Mysql,
    Postgres,
}

impl Dialect {
    pub fn default_port(self) -> u16 {
        match self {
            Dialect::Mysql => 3306,
            Dialect::Postgres => 5432,
        }
    }

    pub fn default_client(self) -> &'static str {
        match self {
            Dialect::Mysql => "mysql",
            Dialect::Postgres => "psql",
        }
    }
}

/// Destination database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    #[serde(default)]
    pub dialect: Dialect,

    pub host: String,

    #[serde(default)]
    pub port: Option<u16>,

    pub user: String,

    /// Passed to the client through its password environment variable
    #[serde(default)]
    pub password: Option<String>,

    pub database: String,

    /// Overrides the dialect's client program
    #[serde(default)]
    pub client_program: Option<String>,
}

impl DestinationConfig {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.dialect.default_port())
    }

    pub fn client_program(&self) -> &str {
        self.client_program
            .as_deref()
            .unwrap_or_else(|| self.dialect.default_client())
    }
}

/// What the loader does when a job fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Cancel the pool on the first failed job
    #[default]
    Abort,
    /// Run every job, then fail with the number of failed jobs
    Continue,
}

/// Load stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Run `bootstrap_script` against the destination before loading
    #[serde(default)]
    pub bootstrap: bool,

    #[serde(default)]
    pub bootstrap_script: Option<PathBuf>,

    /// Deadline for a single bulk insert; unset means no deadline
    #[serde(default)]
    pub job_timeout_secs: Option<u64>,

    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl LoadConfig {
    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }
}

fn default_source_max_connections() -> u32 {
    DEFAULT_SOURCE_MAX_CONNECTIONS
}

fn default_source_connect_timeout() -> u64 {
    DEFAULT_SOURCE_CONNECT_TIMEOUT_SECS
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(DEFAULT_EXPORT_DIR)
}

fn default_lines_to_split() -> u64 {
    DEFAULT_LINES_TO_SPLIT
}

fn default_s3_region() -> String {
    DEFAULT_S3_REGION.to_string()
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(DEFAULT_WORK_DIR)
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: DEFAULT_SOURCE_MAX_CONNECTIONS,
            connect_timeout_secs: DEFAULT_SOURCE_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_export_dir(),
            lines_to_split: DEFAULT_LINES_TO_SPLIT,
        }
    }
}

impl Default for TransferCommandConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_TRANSFER_PROGRAM.to_string(),
            upload_args: vec![
                "-m".to_string(),
                "cp".to_string(),
                "{local}/*_split_*".to_string(),
                "{local}/manifest.json".to_string(),
                "{remote}/".to_string(),
            ],
            download_args: vec![
                "-m".to_string(),
                "cp".to_string(),
                "{remote}/*".to_string(),
                "{local}/".to_string(),
            ],
        }
    }
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: default_s3_region(),
            access_key: None,
            secret_key: None,
            path_style: false,
        }
    }
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            host: "localhost".to_string(),
            port: None,
            user: "root".to_string(),
            password: None,
            database: String::new(),
            client_program: None,
        }
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            workers: DEFAULT_WORKERS,
            bootstrap: false,
            bootstrap_script: None,
            job_timeout_secs: None,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl MigrateConfig {
    /// Load configuration from `path` (if given) and the environment.
    ///
    /// The result is not validated; apply command-line overrides first and
    /// then call [`MigrateConfig::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: MigrateConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Checks shared by every command.
    pub fn validate(&self) -> Result<()> {
        RemoteUrl::parse(&self.remote.url)?;

        if self.remote.transport == TransportKind::S3 && !self.remote.url.starts_with("s3://") {
            return Err(MigrateError::config(format!(
                "S3 transport requires an s3:// remote URL, got '{}'",
                self.remote.url
            )));
        }

        if self.export.lines_to_split == 0 {
            return Err(MigrateError::config("export.lines_to_split must be greater than 0"));
        }

        if self.load.workers == 0 {
            return Err(MigrateError::config("load.workers must be greater than 0"));
        }

        if self.load.bootstrap && self.load.bootstrap_script.is_none() {
            return Err(MigrateError::config(
                "load.bootstrap is enabled but load.bootstrap_script is not set",
            ));
        }

        if self.load.job_timeout_secs == Some(0) {
            return Err(MigrateError::config("load.job_timeout_secs must be greater than 0"));
        }

        Ok(())
    }

    /// Checks required before exporting.
    pub fn validate_export(&self) -> Result<()> {
        if self.source.url.is_empty() {
            return Err(MigrateError::config("source.url cannot be empty"));
        }

        if self.tables.is_empty() {
            return Err(MigrateError::config("at least one [[tables]] entry is required"));
        }

        for table in &self.tables {
            validate_table_name(&table.name)?;
        }

        Ok(())
    }

    /// Checks required before loading.
    pub fn validate_load(&self) -> Result<()> {
        if self.destination.database.is_empty() {
            return Err(MigrateError::config("destination.database cannot be empty"));
        }

        if self.destination.host.is_empty() {
            return Err(MigrateError::config("destination.host cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    const SAMPLE: &str = r#"
[source]
url = "postgres://reader@localhost/app"

[[tables]]
name = "users"

[[tables]]
name = "orders"
query = "SELECT id, total FROM orders"

[remote]
url = "gs://staging/app"

[destination]
host = "10.0.0.5"
user = "loader"
database = "app"

[load]
workers = 8
"#;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn sample() -> MigrateConfig {
        let file = write_config(SAMPLE);
        MigrateConfig::load(Some(file.path())).unwrap()
    }

    fn load_and_validate(contents: &str) -> Result<MigrateConfig> {
        let file = write_config(contents);
        let config = MigrateConfig::load(Some(file.path()))?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    #[serial]
    fn test_load_from_file_with_defaults() {
        let config = sample();

        assert_eq!(config.tables.len(), 2);
        assert_eq!(config.tables[0].query(), "SELECT * FROM users");
        assert_eq!(config.tables[1].query(), "SELECT id, total FROM orders");
        assert_eq!(config.export.lines_to_split, DEFAULT_LINES_TO_SPLIT);
        assert_eq!(config.remote.transport, TransportKind::Command);
        assert_eq!(config.remote.command.program, DEFAULT_TRANSFER_PROGRAM);
        assert_eq!(config.destination.dialect, Dialect::Mysql);
        assert_eq!(config.destination.port(), 3306);
        assert_eq!(config.destination.client_program(), "mysql");
        assert_eq!(config.load.workers, 8);
        assert_eq!(config.load.failure_policy, FailurePolicy::Abort);
        assert!(config.load.job_timeout().is_none());
    }

    #[test]
    #[serial]
    fn test_environment_overrides_file() {
        std::env::set_var("FERRY__LOAD__WORKERS", "3");
        std::env::set_var("FERRY__DESTINATION__DIALECT", "postgres");
        let config = sample();
        std::env::remove_var("FERRY__LOAD__WORKERS");
        std::env::remove_var("FERRY__DESTINATION__DIALECT");

        assert_eq!(config.load.workers, 3);
        assert_eq!(config.destination.dialect, Dialect::Postgres);
        assert_eq!(config.destination.port(), 5432);
        assert_eq!(config.destination.client_program(), "psql");
    }

    #[test]
    #[serial]
    fn test_zero_workers_rejected() {
        let err = load_and_validate(&SAMPLE.replace("workers = 8", "workers = 0")).unwrap_err();
        assert!(err.to_string().contains("load.workers"));
    }

    #[test]
    #[serial]
    fn test_command_line_workers_override_file() {
        let file = write_config(&SAMPLE.replace("workers = 8", "workers = 0"));
        let mut config = MigrateConfig::load(Some(file.path())).unwrap();

        let command = crate::cli::Command::Load {
            skip_bootstrap: false,
            workers: Some(4),
        };
        command.apply_overrides(&mut config);

        config.validate().unwrap();
        assert_eq!(config.load.workers, 4);
    }

    #[test]
    #[serial]
    fn test_bootstrap_requires_script() {
        let err = load_and_validate(&SAMPLE.replace("workers = 8", "workers = 8\nbootstrap = true"))
            .unwrap_err();
        assert!(err.to_string().contains("bootstrap_script"));
    }

    #[test]
    #[serial]
    fn test_s3_transport_requires_s3_url() {
        let err = load_and_validate(&SAMPLE.replace(
            "url = \"gs://staging/app\"",
            "url = \"gs://staging/app\"\ntransport = \"s3\"",
        ))
        .unwrap_err();
        assert!(err.to_string().contains("s3://"));
    }

    #[test]
    #[serial]
    fn test_validate_export_rejects_bad_table_name() {
        let mut config = sample();
        config.tables.push(TableConfig::new("users; DROP TABLE users"));
        assert!(config.validate_export().is_err());

        config.tables.clear();
        assert!(config.validate_export().is_err());
    }
}
