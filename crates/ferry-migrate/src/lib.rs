//! Ferry Migrate Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Moves table data from a Postgres source to a MySQL or Postgres
//! destination through a remote staging bucket.
//!
//! # Stages
//!
//! - **Export**: stream each table's query into chunk files ([`export`])
//! - **Upload / Download**: move chunks through the staging area ([`remote`])
//! - **Load**: bulk-insert every chunk with a bounded [`pool::WorkerPool`] ([`load`])
//!
//! # Example
//!
//! ```no_run
//! use ferry_migrate::config::MigrateConfig;
//! use ferry_migrate::pipeline;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = MigrateConfig::load(Some(Path::new("ferry.toml")))?;
//!     pipeline::run_export(&config).await?;
//!     let report = pipeline::run_load(&config).await?;
//!     println!("loaded {} chunks", report.succeeded);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod load;
pub mod pipeline;
pub mod pool;
pub mod process;
pub mod remote;

pub use error::{MigrateError, Result};
