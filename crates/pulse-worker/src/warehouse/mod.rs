//! Warehouse collaborator
//!
//! The worker only ever appends rows and runs read queries. Both go through
//! the [`Warehouse`] trait so handlers stay independent of the backend:
//!
//! - [`BigQueryWarehouse`]: BigQuery REST API (`insertAll` and `jobs.query`)
//! - [`InMemoryWarehouse`]: process-local tables for tests and local runs
//!
//! A single instance is built at startup and shared as `Arc<dyn Warehouse>`
//! by every request.

mod bigquery;
mod memory;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

pub use bigquery::{BigQueryWarehouse, TokenSource, DEFAULT_METADATA_TOKEN_URL};
pub use memory::InMemoryWarehouse;

/// One result row, column name to value
pub type Row = Map<String, JsonValue>;

/// Result type alias for warehouse operations
pub type WarehouseResult<T> = std::result::Result<T, WarehouseError>;

/// Errors raised by a warehouse backend
#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("warehouse API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("insert into {table} reported {failed_rows} row error(s): {detail}")]
    InsertErrors {
        table: String,
        failed_rows: usize,
        detail: String,
    },

    #[error("query did not complete within the request timeout")]
    IncompleteQuery,

    #[error("unexpected warehouse response: {0}")]
    Decode(String),

    #[error("could not obtain access token: {0}")]
    Auth(String),
}

/// Fully-qualified table reference: `<project>.<dataset>.<table>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// Parameter type of a named query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParameterType {
    Int64,
    Timestamp,
}

/// Named parameter bound into a query as `@name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParameter {
    pub name: String,
    pub parameter_type: ParameterType,
    pub value: String,
}

impl QueryParameter {
    pub fn int64(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            parameter_type: ParameterType::Int64,
            value: value.to_string(),
        }
    }

    pub fn timestamp(name: impl Into<String>, value: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            parameter_type: ParameterType::Timestamp,
            value: value.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}

/// Append-only row store with a read query interface.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Append rows to `table`.
    ///
    /// Any per-row error fails the whole call; there is no partial success.
    async fn insert_rows(&self, table: &TableRef, rows: Vec<JsonValue>) -> WarehouseResult<()>;

    /// Run a standard-SQL query and return its rows in result order.
    async fn query(&self, sql: &str, params: &[QueryParameter]) -> WarehouseResult<Vec<Row>>;

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Read an integer column, accepting numeric strings.
pub fn row_i64(row: &Row, column: &str) -> i64 {
    match row.get(column) {
        Some(JsonValue::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(JsonValue::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

/// Read a float column, accepting numeric strings.
pub fn row_f64(row: &Row, column: &str) -> f64 {
    match row.get(column) {
        Some(JsonValue::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(JsonValue::String(s)) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Read a string column; `None` for null or missing.
pub fn row_string(row: &Row, column: &str) -> Option<String> {
    match row.get(column) {
        Some(JsonValue::String(s)) => Some(s.clone()),
        Some(JsonValue::Null) | None => None,
        Some(other) => Some(other.to_string()),
    }
}
