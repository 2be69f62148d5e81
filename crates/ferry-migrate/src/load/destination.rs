//! Destination database access through its command-line client
//!
//! Each bulk insert is one client invocation that suspends integrity checks
//! for its own session and streams one chunk file into one table. Passwords
//! are passed through the client's environment variable, never on the
//! command line.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{DestinationConfig, Dialect};
use crate::error::{MigrateError, Result};
use crate::process::ExternalCommand;

/// Applies schema scripts and chunk files to the destination.
#[async_trait]
pub trait BulkInserter: Send + Sync {
    /// Run a schema script before any chunk is loaded.
    async fn bootstrap(&self, script: &Path) -> Result<()>;

    /// Load one chunk file into `table`.
    async fn bulk_insert(&self, table: &str, file: &Path) -> Result<()>;
}

pub struct CommandDestination {
    config: DestinationConfig,
    cancel: CancellationToken,
    timeout: Option<Duration>,
}

impl CommandDestination {
    pub fn new(config: DestinationConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
            timeout: None,
        }
    }

    /// Kill in-flight client processes when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Kill a client process running longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn bulk_insert_command(&self, table: &str, file: &Path) -> ExternalCommand {
        let path = file.display().to_string();

        match self.config.dialect {
            Dialect::Mysql => {
                let statement = format!(
                    "SET FOREIGN_KEY_CHECKS=0; SET UNIQUE_CHECKS=0; \
                     LOAD DATA LOCAL INFILE '{}' INTO TABLE {} \
                     FIELDS TERMINATED BY ',' OPTIONALLY ENCLOSED BY '\"' ESCAPED BY '' \
                     LINES TERMINATED BY '\\n';",
                    sql_literal(&path),
                    mysql_identifier(table)
                );
                self.mysql_base()
                    .arg("--local-infile=1")
                    .arg(&self.config.database)
                    .args(["-e", statement.as_str()])
            },
            Dialect::Postgres => {
                let copy = format!(
                    "\\copy {} FROM '{}' WITH (FORMAT csv, NULL 'NULL')",
                    postgres_identifier(table),
                    sql_literal(&path)
                );
                // One transaction so the deferral covers the copy. Triggers,
                // including foreign-key triggers, are off under the replica role.
                self.psql_base()
                    .arg("--single-transaction")
                    .args(["-c", "SET session_replication_role = replica"])
                    .args(["-c", "SET CONSTRAINTS ALL DEFERRED"])
                    .args(["-c", copy.as_str()])
            },
        }
    }

    pub fn bootstrap_command(&self, script: &Path) -> ExternalCommand {
        match self.config.dialect {
            Dialect::Mysql => self
                .mysql_base()
                .arg(&self.config.database)
                .stdin_file(script),
            Dialect::Postgres => self
                .psql_base()
                .args(["-f", script.display().to_string().as_str()]),
        }
    }

    fn mysql_base(&self) -> ExternalCommand {
        let mut command = ExternalCommand::new(self.config.client_program())
            .args(["-h", self.config.host.as_str()])
            .args(["-P", self.config.port().to_string().as_str()])
            .args(["-u", self.config.user.as_str()]);
        if let Some(password) = &self.config.password {
            command = command.env("MYSQL_PWD", password);
        }
        command
    }

    fn psql_base(&self) -> ExternalCommand {
        let mut command = ExternalCommand::new(self.config.client_program())
            .args(["-h", self.config.host.as_str()])
            .args(["-p", self.config.port().to_string().as_str()])
            .args(["-U", self.config.user.as_str()])
            .args(["-d", self.config.database.as_str()])
            .args(["-v", "ON_ERROR_STOP=1"]);
        if let Some(password) = &self.config.password {
            command = command.env("PGPASSWORD", password);
        }
        command
    }
}

#[async_trait]
impl BulkInserter for CommandDestination {
    async fn bootstrap(&self, script: &Path) -> Result<()> {
        info!("Bootstrapping destination with {}", script.display());

        self.bootstrap_command(script)
            .run_until(&self.cancel, None)
            .await
            .map_err(MigrateError::Bootstrap)
    }

    async fn bulk_insert(&self, table: &str, file: &Path) -> Result<()> {
        self.bulk_insert_command(table, file)
            .run_until(&self.cancel, self.timeout)
            .await
            .map_err(|source| MigrateError::BulkInsert {
                table: table.to_string(),
                source,
            })
    }
}

/// Quote a value for a single-quoted SQL string literal.
fn sql_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Backtick-quote each part of a possibly schema-qualified MySQL name.
fn mysql_identifier(name: &str) -> String {
    name.split('.')
        .map(|part| format!("`{}`", part.replace('`', "``")))
        .collect::<Vec<_>>()
        .join(".")
}

/// Double-quote each part of a possibly schema-qualified Postgres name.
fn postgres_identifier(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}
