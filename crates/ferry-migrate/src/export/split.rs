//! Record-aware splitting of a raw export file into chunk files
//!
//! Boundaries are found by parsing records, never by counting newline bytes,
//! so a quoted value spanning several lines stays inside one chunk. The bytes
//! of each record are copied unchanged.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use ferry_common::types::{suffix_for, suffix_width, ChunkEntry, ChunkName};
use tracing::debug;

/// Split `raw` into `<table>_split_<suffix>` files inside `out_dir`.
///
/// `total_rows` must be the number of records in `raw`; it fixes the suffix
/// width before the first chunk is named. Returns one entry per chunk, in
/// suffix order. A file with no records produces no chunks.
pub fn split_file(
    raw: &Path,
    out_dir: &Path,
    table: &str,
    lines_to_split: u64,
    total_rows: u64,
) -> io::Result<Vec<ChunkEntry>> {
    if lines_to_split == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "lines_to_split must be greater than 0",
        ));
    }

    if total_rows == 0 {
        return Ok(Vec::new());
    }

    let expected_chunks = total_rows.div_ceil(lines_to_split);
    let width = suffix_width(usize::try_from(expected_chunks).unwrap_or(usize::MAX));

    let mut records = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(BufReader::new(File::open(raw)?));
    let mut bytes = BufReader::new(File::open(raw)?);

    let mut record = csv::ByteRecord::new();
    let mut chunks = Vec::with_capacity(expected_chunks as usize);
    let mut chunk_start = 0u64;
    let mut rows_in_chunk = 0u64;

    while records.read_byte_record(&mut record).map_err(io::Error::from)? {
        rows_in_chunk += 1;

        if rows_in_chunk == lines_to_split {
            let chunk_end = records.position().byte();
            let entry = write_chunk(
                &mut bytes,
                out_dir,
                table,
                suffix_for(chunks.len(), width),
                chunk_end - chunk_start,
                rows_in_chunk,
            )?;
            chunks.push(entry);
            chunk_start = chunk_end;
            rows_in_chunk = 0;
        }
    }

    if rows_in_chunk > 0 {
        let chunk_end = records.position().byte();
        let entry = write_chunk(
            &mut bytes,
            out_dir,
            table,
            suffix_for(chunks.len(), width),
            chunk_end - chunk_start,
            rows_in_chunk,
        )?;
        chunks.push(entry);
    }

    Ok(chunks)
}

/// Copy the next `len` bytes of `src` into a new chunk file.
fn write_chunk<R: Read>(
    src: &mut R,
    out_dir: &Path,
    table: &str,
    suffix: String,
    len: u64,
    rows: u64,
) -> io::Result<ChunkEntry> {
    let name = ChunkName::new(table, suffix)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    let file_name = name.file_name();

    let mut out = BufWriter::new(File::create(out_dir.join(&file_name))?);
    let copied = io::copy(&mut (&mut *src).take(len), &mut out)?;
    out.flush()?;

    if copied != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("{} truncated: expected {} bytes, copied {}", file_name, len, copied),
        ));
    }

    debug!(chunk = %file_name, rows, bytes = copied, "Wrote chunk");

    Ok(ChunkEntry { file_name, rows })
}
