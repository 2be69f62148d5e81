//! Chunk file naming
//!
//! Chunk files are named `<table>_split_<suffix>`, where the suffix is a
//! lowercase alphabetic sequence (`aa`, `ab`, ..., `zz`, `aaa`, ...). The
//! suffix only keeps names unique; it carries no ordering meaning for loads.

use crate::error::{FerryError, Result};
use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;

/// Token separating the table name from the chunk suffix.
pub const SPLIT_MARKER: &str = "_split_";

/// Minimum suffix width, matching the classic `split(1)` output (`aa`, `ab`, ...).
const MIN_SUFFIX_WIDTH: usize = 2;

const ALPHABET_LEN: usize = 26;

#[allow(clippy::unwrap_used)]
static CHUNK_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<table>.+)_split_(?P<suffix>[a-z]+)$").unwrap()
});

#[allow(clippy::unwrap_used)]
static TABLE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*(\.[A-Za-z_][A-Za-z0-9_$]*)?$").unwrap()
});

/// Parsed chunk file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkName {
    table: String,
    suffix: String,
}

impl ChunkName {
    pub fn new(table: impl Into<String>, suffix: impl Into<String>) -> Result<Self> {
        let table = table.into();
        let suffix = suffix.into();

        validate_table_name(&table)?;
        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_lowercase()) {
            return Err(FerryError::InvalidChunkName(format!(
                "suffix must be lowercase alphabetic, got '{}'",
                suffix
            )));
        }

        Ok(Self { table, suffix })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn file_name(&self) -> String {
        self.to_string()
    }
}

impl FromStr for ChunkName {
    type Err = FerryError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = CHUNK_NAME_RE
            .captures(s)
            .ok_or_else(|| FerryError::InvalidChunkName(s.to_string()))?;

        Self::new(&caps["table"], &caps["suffix"])
    }
}

impl std::fmt::Display for ChunkName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.table, SPLIT_MARKER, self.suffix)
    }
}

/// Whether `name` follows the `*_split_*` convention.
pub fn is_chunk_file_name(name: &str) -> bool {
    CHUNK_NAME_RE.is_match(name)
}

/// Reject table names that cannot be spliced into a bulk-load statement.
///
/// Accepts plain identifiers and `schema.table`.
pub fn validate_table_name(table: &str) -> Result<()> {
    if TABLE_NAME_RE.is_match(table) {
        Ok(())
    } else {
        Err(FerryError::InvalidTableName(table.to_string()))
    }
}

/// Smallest suffix width (at least 2) able to name `chunks` distinct files.
pub fn suffix_width(chunks: usize) -> usize {
    let mut width = MIN_SUFFIX_WIDTH;
    let mut capacity = ALPHABET_LEN.pow(MIN_SUFFIX_WIDTH as u32);

    while capacity < chunks {
        width += 1;
        capacity = capacity.saturating_mul(ALPHABET_LEN);
    }

    width
}

/// Alphabetic suffix for the `index`-th chunk, left-padded with `a` to `width`.
///
/// Suffixes of equal width sort lexicographically in index order.
pub fn suffix_for(index: usize, width: usize) -> String {
    let mut digits = vec![b'a'; width];
    let mut remaining = index;

    for slot in digits.iter_mut().rev() {
        *slot = b'a' + (remaining % ALPHABET_LEN) as u8;
        remaining /= ALPHABET_LEN;
    }

    String::from_utf8_lossy(&digits).into_owned()
}
