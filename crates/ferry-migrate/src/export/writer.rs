//! Chunk record encoding
//!
//! Every non-null value is wrapped in double quotes with embedded quotes
//! doubled; SQL NULL is the bare token `NULL`. Records end with `\n`, which
//! may also appear inside a quoted value.

use std::io::{self, Write};

/// Unquoted token standing for SQL NULL.
pub const NULL_LITERAL: &str = "NULL";

/// Encode one field.
///
/// ```
/// use ferry_migrate::export::encode_field;
///
/// assert_eq!(encode_field(Some("a\"b")), "\"a\"\"b\"");
/// assert_eq!(encode_field(Some("")), "\"\"");
/// assert_eq!(encode_field(None), "NULL");
/// ```
pub fn encode_field(value: Option<&str>) -> String {
    match value {
        None => NULL_LITERAL.to_string(),
        Some(v) => {
            let mut out = String::with_capacity(v.len() + 2);
            out.push('"');
            for ch in v.chars() {
                if ch == '"' {
                    out.push('"');
                }
                out.push(ch);
            }
            out.push('"');
            out
        },
    }
}

/// Streams encoded rows into `W`, counting them.
pub struct RowWriter<W: Write> {
    inner: csv::Writer<W>,
    rows: u64,
}

impl<W: Write> RowWriter<W> {
    pub fn new(writer: W) -> Self {
        // Fields arrive already quoted, so the writer must not quote again.
        let inner = csv::WriterBuilder::new()
            .has_headers(false)
            .quote_style(csv::QuoteStyle::Never)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);

        Self { inner, rows: 0 }
    }

    pub fn write_row<'a, I>(&mut self, fields: I) -> io::Result<()>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let record: Vec<String> = fields.into_iter().map(encode_field).collect();
        self.inner.write_record(&record).map_err(io::Error::from)?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(self) -> io::Result<W> {
        self.inner.into_inner().map_err(|e| e.into_error())
    }
}
