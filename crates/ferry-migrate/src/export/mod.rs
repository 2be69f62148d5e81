// Chunked export
//
// Streams each table's query into `<table>.csv`, splits the file into
// `<table>_split_<suffix>` chunks once the result set is drained, removes the
// raw file and finally writes `manifest.json` next to the chunks.

mod source;
mod split;
mod writer;

pub use source::{PgRowSource, Row, RowSource, RowStream};
pub use split::split_file;
pub use writer::{encode_field, RowWriter, NULL_LITERAL};

use ferry_common::chronometer::format_duration;
use ferry_common::types::{validate_table_name, ChunkManifest, TableManifest};
use ferry_common::Chronometer;
use futures::StreamExt;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use crate::config::TableConfig;
use crate::error::{MigrateError, Result};

pub struct ChunkedExporter<S> {
    source: S,
    output_dir: PathBuf,
    lines_to_split: u64,
}

impl<S: RowSource> ChunkedExporter<S> {
    pub fn new(source: S, output_dir: impl Into<PathBuf>, lines_to_split: u64) -> Result<Self> {
        if lines_to_split == 0 {
            return Err(MigrateError::config("lines_to_split must be greater than 0"));
        }

        Ok(Self {
            source,
            output_dir: output_dir.into(),
            lines_to_split,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Export every table in order, then write the manifest.
    ///
    /// The first failing table aborts the run; chunks already written for
    /// earlier tables are left on disk.
    pub async fn export_all(&self, tables: &[TableConfig]) -> Result<ChunkManifest> {
        let timer = Chronometer::start();
        std::fs::create_dir_all(&self.output_dir)?;

        let mut manifest = ChunkManifest::new(self.lines_to_split);
        for table in tables {
            let exported = self.export_table(&table.name, &table.query()).await?;
            manifest.push_table(exported);
        }

        manifest.write_to_dir(&self.output_dir)?;

        info!(
            "Export complete: {} tables, {} rows, {} chunks in {}",
            manifest.tables.len(),
            manifest.total_rows(),
            manifest.total_chunks(),
            format_duration(timer.elapsed())
        );

        Ok(manifest)
    }

    /// Export one table's query result into chunk files.
    #[instrument(skip(self, query))]
    pub async fn export_table(&self, table: &str, query: &str) -> Result<TableManifest> {
        validate_table_name(table)?;
        std::fs::create_dir_all(&self.output_dir)?;

        let timer = Chronometer::start();
        let raw_path = self.output_dir.join(format!("{}.csv", table));

        // Step 1: Drain the result set into the raw file
        let file = File::create(&raw_path).map_err(|e| MigrateError::export(table, e))?;
        let mut writer = RowWriter::new(BufWriter::new(file));

        let mut rows = self.source.rows(table, query);
        while let Some(row) = rows.next().await {
            let row = row?;
            writer
                .write_row(row.iter().map(Option::as_deref))
                .map_err(|e| MigrateError::export(table, e))?;
        }
        drop(rows);

        let total_rows = writer.rows();
        writer
            .finish()
            .and_then(|w| w.into_inner().map_err(|e| e.into_error()))
            .map_err(|e| MigrateError::export(table, e))?;

        info!("Exported {} rows from {} in {}", total_rows, table, format_duration(timer.elapsed()));

        // Step 2: Split into chunks off the async runtime
        let chunks = {
            let raw = raw_path.clone();
            let out_dir = self.output_dir.clone();
            let table_name = table.to_string();
            let lines = self.lines_to_split;
            tokio::task::spawn_blocking(move || {
                split_file(&raw, &out_dir, &table_name, lines, total_rows)
            })
            .await
            .map_err(|e| MigrateError::Worker(e.to_string()))?
            .map_err(|e| MigrateError::export(table, e))?
        };

        // Step 3: The raw file is no longer needed
        std::fs::remove_file(&raw_path).map_err(|e| MigrateError::export(table, e))?;

        info!("Split {} into {} chunks", table, chunks.len());

        Ok(TableManifest {
            table: table.to_string(),
            rows: total_rows,
            chunks,
        })
    }
}
