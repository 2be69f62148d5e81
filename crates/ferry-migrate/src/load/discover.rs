//! Job enumeration for a downloaded work directory

use ferry_common::types::{validate_table_name, ChunkManifest, ChunkName, Job, MANIFEST_FILE_NAME};
use ferry_common::FerryError;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{MigrateError, Result};

/// Build one job per chunk file in `work_dir`, with ids `1..=n`.
///
/// The manifest is authoritative when present: every chunk it lists must
/// exist. Without a manifest, files named `<table>_split_<suffix>` are
/// picked up in name order and the table is taken from the name.
pub fn discover_jobs(work_dir: &Path) -> Result<Vec<Job>> {
    match ChunkManifest::read_from_dir(work_dir) {
        Ok(manifest) => jobs_from_manifest(work_dir, &manifest),
        Err(FerryError::ManifestNotFound(_)) => {
            warn!("No {} in {}, falling back to file names", MANIFEST_FILE_NAME, work_dir.display());
            jobs_from_file_names(work_dir)
        },
        Err(e) => Err(e.into()),
    }
}

fn jobs_from_manifest(work_dir: &Path, manifest: &ChunkManifest) -> Result<Vec<Job>> {
    let mut jobs = Vec::with_capacity(manifest.total_chunks());

    for (table, file_name) in manifest.chunk_files() {
        let name = checked_chunk_name(table, file_name)?;
        let path = work_dir.join(name.file_name());
        if !path.is_file() {
            return Err(MigrateError::MissingChunk(path.display().to_string()));
        }
        jobs.push(Job::new(jobs.len() as u64 + 1, name.table(), path));
    }

    debug!("Manifest lists {} chunks", jobs.len());
    Ok(jobs)
}

/// A manifest entry must name a plain `<table>_split_<suffix>` file of its
/// own table; anything else could point outside the work directory.
fn checked_chunk_name(table: &str, file_name: &str) -> Result<ChunkName> {
    validate_table_name(table)?;

    let name: ChunkName = file_name.parse()?;
    if name.table() != table {
        return Err(FerryError::InvalidChunkName(format!(
            "'{}' is listed under table '{}'",
            file_name, table
        ))
        .into());
    }

    Ok(name)
}

fn jobs_from_file_names(work_dir: &Path) -> Result<Vec<Job>> {
    let mut chunks = Vec::new();

    for entry in std::fs::read_dir(work_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        match file_name.parse::<ChunkName>() {
            Ok(name) => chunks.push((file_name.to_string(), name)),
            Err(_) => debug!("Skipping {}", file_name),
        }
    }

    chunks.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(chunks
        .into_iter()
        .enumerate()
        .map(|(index, (file_name, name))| {
            Job::new(index as u64 + 1, name.table(), work_dir.join(file_name))
        })
        .collect())
}
