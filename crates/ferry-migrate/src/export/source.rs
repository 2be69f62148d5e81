//! Row sources
//!
//! The exporter only sees rows of optional text values. [`PgRowSource`]
//! streams a Postgres query and renders each column into the text form the
//! destination's bulk loader accepts.

use futures::stream::{BoxStream, StreamExt};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{BigDecimal, JsonValue, Uuid};
use sqlx::{Row as _, TypeInfo, ValueRef};
use std::time::Duration;
use tracing::info;

use crate::config::SourceConfig;
use crate::error::{MigrateError, Result};

/// One exported row; `None` is SQL NULL.
pub type Row = Vec<Option<String>>;

pub type RowStream<'a> = BoxStream<'a, Result<Row>>;

/// Produces the rows of a query, one at a time.
pub trait RowSource: Send + Sync {
    /// Stream the rows of `query`. `table` is used for error context.
    fn rows<'a>(&'a self, table: &'a str, query: &'a str) -> RowStream<'a>;
}

/// Postgres-backed source
#[derive(Clone)]
pub struct PgRowSource {
    pool: PgPool,
}

impl PgRowSource {
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(MigrateError::Connection)?;

        info!(max_connections = config.max_connections, "Connected to source database");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RowSource for PgRowSource {
    fn rows<'a>(&'a self, table: &'a str, query: &'a str) -> RowStream<'a> {
        sqlx::query(query)
            .fetch(&self.pool)
            .map(move |row| {
                let row = row.map_err(|source| MigrateError::Query {
                    table: table.to_string(),
                    source,
                })?;
                row_text(&row, table)
            })
            .boxed()
    }
}

fn row_text(row: &PgRow, table: &str) -> Result<Row> {
    (0..row.len()).map(|index| column_text(row, index, table)).collect()
}

/// Render one column as text, or `None` for NULL.
///
/// Booleans become `1`/`0`, byte strings become lowercase hex and timestamps
/// use `YYYY-MM-DD HH:MM:SS[.ffffff]` (UTC for `timestamptz`), which both
/// MySQL and Postgres accept on load.
fn column_text(row: &PgRow, index: usize, table: &str) -> Result<Option<String>> {
    let query_err = |source| MigrateError::Query {
        table: table.to_string(),
        source,
    };

    let raw = row.try_get_raw(index).map_err(query_err)?;
    if raw.is_null() {
        return Ok(None);
    }
    let type_name = raw.type_info().name().to_string();

    let text = match type_name.as_str() {
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" | "CITEXT" => {
            row.try_get::<String, _>(index).map_err(query_err)?
        },
        "INT2" => row.try_get::<i16, _>(index).map_err(query_err)?.to_string(),
        "INT4" => row.try_get::<i32, _>(index).map_err(query_err)?.to_string(),
        "INT8" => row.try_get::<i64, _>(index).map_err(query_err)?.to_string(),
        "FLOAT4" => row.try_get::<f32, _>(index).map_err(query_err)?.to_string(),
        "FLOAT8" => row.try_get::<f64, _>(index).map_err(query_err)?.to_string(),
        "BOOL" => {
            let value = row.try_get::<bool, _>(index).map_err(query_err)?;
            (if value { "1" } else { "0" }).to_string()
        },
        "NUMERIC" => row
            .try_get::<BigDecimal, _>(index)
            .map_err(query_err)?
            .to_string(),
        "DATE" => row
            .try_get::<NaiveDate, _>(index)
            .map_err(query_err)?
            .format("%Y-%m-%d")
            .to_string(),
        "TIME" => row
            .try_get::<NaiveTime, _>(index)
            .map_err(query_err)?
            .format("%H:%M:%S%.f")
            .to_string(),
        "TIMESTAMP" => row
            .try_get::<NaiveDateTime, _>(index)
            .map_err(query_err)?
            .format("%Y-%m-%d %H:%M:%S%.f")
            .to_string(),
        "TIMESTAMPTZ" => row
            .try_get::<DateTime<Utc>, _>(index)
            .map_err(query_err)?
            .format("%Y-%m-%d %H:%M:%S%.f")
            .to_string(),
        "UUID" => row.try_get::<Uuid, _>(index).map_err(query_err)?.to_string(),
        "JSON" | "JSONB" => row
            .try_get::<JsonValue, _>(index)
            .map_err(query_err)?
            .to_string(),
        "BYTEA" => hex::encode(row.try_get::<Vec<u8>, _>(index).map_err(query_err)?),
        _ => {
            return Err(MigrateError::UnsupportedColumn {
                table: table.to_string(),
                index,
                type_name,
            })
        },
    };

    Ok(Some(text))
}
