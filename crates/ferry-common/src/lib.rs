//! Ferry Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the ferry workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`FerryError`] and the [`Result`] alias
//! - **Types**: jobs, job results, chunk file names and the chunk manifest
//! - **Chronometer**: elapsed-time measurement for stages and jobs
//! - **Logging**: tracing subscriber setup shared by every binary
//!
//! # Example
//!
//! ```
//! use ferry_common::types::ChunkName;
//!
//! let name: ChunkName = "orders_split_ab".parse().unwrap();
//! assert_eq!(name.table(), "orders");
//! assert_eq!(name.suffix(), "ab");
//! ```

pub mod chronometer;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use chronometer::Chronometer;
pub use error::{FerryError, Result};
