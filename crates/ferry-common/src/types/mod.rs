//! Common types used across ferry
//!
//! - [`ChunkName`]: the `<table>_split_<suffix>` naming convention for chunk files
//! - [`Job`] / [`JobResult`]: the unit of work handed to the load worker pool
//! - [`ChunkManifest`]: the JSON index written next to exported chunks

mod chunk;
mod job;
mod manifest;

pub use chunk::{
    is_chunk_file_name, suffix_for, suffix_width, validate_table_name, ChunkName, SPLIT_MARKER,
};
pub use job::{Job, JobId, JobOutcome, JobResult};
pub use manifest::{ChunkEntry, ChunkManifest, TableManifest, MANIFEST_FILE_NAME};
