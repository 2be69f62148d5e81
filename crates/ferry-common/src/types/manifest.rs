//! Chunk manifest
//!
//! The exporter writes `manifest.json` next to the chunk files and ships it
//! with them, so the loader can pair each chunk with its table without
//! parsing the file name back apart.

use crate::error::{FerryError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the manifest inside an export or work directory.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Index of every chunk produced by one export run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkManifest {
    /// When the export finished
    pub exported_at: DateTime<Utc>,

    /// Chunk size the export was split with
    pub lines_to_split: u64,

    /// One entry per exported table, in export order
    pub tables: Vec<TableManifest>,
}

/// Chunks of a single table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableManifest {
    pub table: String,
    pub rows: u64,
    pub chunks: Vec<ChunkEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkEntry {
    pub file_name: String,
    pub rows: u64,
}

impl ChunkManifest {
    pub fn new(lines_to_split: u64) -> Self {
        Self {
            exported_at: Utc::now(),
            lines_to_split,
            tables: Vec::new(),
        }
    }

    pub fn push_table(&mut self, table: TableManifest) {
        self.tables.push(table);
    }

    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|t| t.rows).sum()
    }

    pub fn total_chunks(&self) -> usize {
        self.tables.iter().map(|t| t.chunks.len()).sum()
    }

    /// `(table, file_name)` for every chunk, table by table.
    pub fn chunk_files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tables.iter().flat_map(|t| {
            t.chunks
                .iter()
                .map(move |c| (t.table.as_str(), c.file_name.as_str()))
        })
    }

    /// Write `manifest.json` into `dir`, returning its path.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = dir.as_ref().join(MANIFEST_FILE_NAME);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// Read `manifest.json` from `dir`.
    pub fn read_from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(MANIFEST_FILE_NAME);
        if !path.exists() {
            return Err(FerryError::ManifestNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}
