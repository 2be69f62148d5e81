//! Shared fakes for pipeline tests
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

pub mod containers;

use async_trait::async_trait;
use ferry_migrate::error::{MigrateError, Result};
use ferry_migrate::export::{Row, RowSource, RowStream};
use ferry_migrate::load::BulkInserter;
use ferry_migrate::process::CommandError;
use ferry_migrate::remote::{Downloader, RemoteUrl};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Serves fixed rows per table.
#[derive(Default)]
pub struct MemoryRowSource {
    tables: HashMap<String, Vec<Row>>,
}

impl MemoryRowSource {
    pub fn with_table<S: Into<String>>(mut self, table: &str, rows: Vec<Vec<Option<S>>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(|v| v.map(Into::into)).collect())
            .collect();
        self.tables.insert(table.to_string(), rows);
        self
    }
}

impl RowSource for MemoryRowSource {
    fn rows<'a>(&'a self, table: &'a str, _query: &'a str) -> RowStream<'a> {
        let rows = self.tables.get(table).cloned().unwrap_or_default();
        stream::iter(rows.into_iter().map(Ok)).boxed()
    }
}

/// "Downloads" by copying every file of a local directory.
pub struct DirDownloader {
    pub source: PathBuf,
}

#[async_trait]
impl Downloader for DirDownloader {
    async fn download(&self, _remote: &RemoteUrl, local_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(local_dir)?;
        for entry in std::fs::read_dir(&self.source)? {
            let entry = entry?;
            std::fs::copy(entry.path(), local_dir.join(entry.file_name()))?;
        }
        Ok(())
    }
}

/// Records loaded chunk contents; fails for configured file names.
#[derive(Default)]
pub struct RecordingInserter {
    pub fail_files: HashSet<String>,
    pub bootstrapped: Mutex<Vec<PathBuf>>,
    pub loaded: Mutex<Vec<(String, String, String)>>,
}

impl RecordingInserter {
    pub fn failing(files: &[&str]) -> Self {
        Self {
            fail_files: files.iter().map(|f| f.to_string()).collect(),
            ..Self::default()
        }
    }

    /// `(table, file_name)` pairs, sorted.
    pub fn loaded_files(&self) -> Vec<(String, String)> {
        let mut files: Vec<_> = self
            .loaded
            .lock()
            .unwrap()
            .iter()
            .map(|(t, f, _)| (t.clone(), f.clone()))
            .collect();
        files.sort();
        files
    }
}

#[async_trait]
impl BulkInserter for RecordingInserter {
    async fn bootstrap(&self, script: &Path) -> Result<()> {
        self.bootstrapped.lock().unwrap().push(script.to_path_buf());
        Ok(())
    }

    async fn bulk_insert(&self, table: &str, file: &Path) -> Result<()> {
        let name = file.file_name().unwrap().to_string_lossy().into_owned();
        if self.fail_files.contains(&name) {
            return Err(MigrateError::BulkInsert {
                table: table.to_string(),
                source: CommandError::Spawn {
                    program: "fake-client".to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
                },
            });
        }

        let contents = std::fs::read_to_string(file)?;
        self.loaded
            .lock()
            .unwrap()
            .push((table.to_string(), name, contents));
        Ok(())
    }
}
