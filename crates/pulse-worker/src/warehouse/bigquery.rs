//! BigQuery REST backend

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{QueryParameter, Row, TableRef, Warehouse, WarehouseError, WarehouseResult};
use crate::config::WarehouseConfig;

/// Token endpoint of the GCE/Cloud Run metadata server.
pub const DEFAULT_METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Server-side query wait when the client has no timeout of its own.
const DEFAULT_QUERY_WAIT_MS: u64 = 10_000;

/// Where bearer tokens come from
#[derive(Clone)]
pub enum TokenSource {
    Static(String),
    /// Fetched from the metadata server on every call
    MetadataServer { url: String },
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(_) => f.write_str("Static(<redacted>)"),
            Self::MetadataServer { url } => f.debug_struct("MetadataServer").field("url", url).finish(),
        }
    }
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Vec<InsertError>,
}

#[derive(Deserialize)]
struct InsertError {
    index: Option<u64>,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Deserialize)]
struct ErrorProto {
    reason: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<TableRow>,
}

#[derive(Deserialize)]
struct TableSchema {
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

#[derive(Deserialize)]
struct FieldSchema {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
}

#[derive(Deserialize)]
struct TableRow {
    #[serde(default)]
    f: Vec<TableCell>,
}

#[derive(Deserialize)]
struct TableCell {
    #[serde(default)]
    v: JsonValue,
}

/// BigQuery warehouse over the v2 REST API.
///
/// Cheap to clone; the inner `reqwest::Client` shares its connection pool.
#[derive(Debug, Clone)]
pub struct BigQueryWarehouse {
    client: Client,
    base_url: String,
    project_id: String,
    token_source: TokenSource,
    query_wait_ms: u64,
}

impl BigQueryWarehouse {
    pub fn new(config: &WarehouseConfig) -> WarehouseResult<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let mut builder = Client::builder();
        if config.timeout_secs > 0 {
            builder = builder.timeout(timeout);
        }

        let token_source = match &config.access_token {
            Some(token) => TokenSource::Static(token.clone()),
            None => TokenSource::MetadataServer {
                url: DEFAULT_METADATA_TOKEN_URL.to_string(),
            },
        };

        Ok(Self {
            client: builder.build()?,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
            token_source,
            query_wait_ms: server_wait_ms(timeout),
        })
    }

    pub fn with_token_source(mut self, token_source: TokenSource) -> Self {
        self.token_source = token_source;
        self
    }

    async fn access_token(&self) -> WarehouseResult<String> {
        match &self.token_source {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::MetadataServer { url } => {
                let response = self
                    .client
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(|e| WarehouseError::Auth(e.to_string()))?;

                if !response.status().is_success() {
                    return Err(WarehouseError::Auth(format!(
                        "metadata server returned {}",
                        response.status()
                    )));
                }

                let token: MetadataToken = response
                    .json()
                    .await
                    .map_err(|e| WarehouseError::Auth(e.to_string()))?;
                Ok(token.access_token)
            },
        }
    }

    async fn post_json<T: DeserializeOwned>(&self, url: &str, body: &JsonValue) -> WarehouseResult<T> {
        let token = self.access_token().await?;

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(WarehouseError::Api {
                status: status.as_u16(),
                message: api_error_message(&text),
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| WarehouseError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn insert_rows(&self, table: &TableRef, rows: Vec<JsonValue>) -> WarehouseResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let url = format!(
            "{}/projects/{}/datasets/{}/tables/{}/insertAll",
            self.base_url, table.project, table.dataset, table.table
        );
        let row_count = rows.len();
        let body = json!({
            "kind": "bigquery#tableDataInsertAllRequest",
            "skipInvalidRows": false,
            "ignoreUnknownValues": false,
            "rows": rows
                .into_iter()
                .map(|row| json!({ "insertId": Uuid::new_v4().to_string(), "json": row }))
                .collect::<Vec<_>>(),
        });

        let response: InsertAllResponse = self.post_json(&url, &body).await?;

        if !response.insert_errors.is_empty() {
            let detail = response
                .insert_errors
                .iter()
                .take(3)
                .map(describe_insert_error)
                .collect::<Vec<_>>()
                .join("; ");

            warn!(
                table = %table,
                failed_rows = response.insert_errors.len(),
                "insertAll reported row errors"
            );

            return Err(WarehouseError::InsertErrors {
                table: table.to_string(),
                failed_rows: response.insert_errors.len(),
                detail,
            });
        }

        debug!(table = %table, rows = row_count, "Streamed rows into BigQuery");

        Ok(())
    }

    async fn query(&self, sql: &str, params: &[QueryParameter]) -> WarehouseResult<Vec<Row>> {
        let url = format!("{}/projects/{}/queries", self.base_url, self.project_id);
        let query_parameters: Vec<JsonValue> = params
            .iter()
            .map(|p| {
                json!({
                    "name": p.name,
                    "parameterType": { "type": p.parameter_type },
                    "parameterValue": { "value": p.value },
                })
            })
            .collect();

        let body = json!({
            "query": sql,
            "useLegacySql": false,
            "parameterMode": "NAMED",
            "queryParameters": query_parameters,
            "timeoutMs": self.query_wait_ms,
        });

        let response: QueryResponse = self.post_json(&url, &body).await?;

        if !response.job_complete {
            return Err(WarehouseError::IncompleteQuery);
        }

        let fields = response.schema.map(|s| s.fields).unwrap_or_default();
        let rows = response
            .rows
            .into_iter()
            .map(|row| decode_row(&fields, row))
            .collect::<WarehouseResult<Vec<_>>>()?;

        debug!(rows = rows.len(), "Query returned rows");

        Ok(rows)
    }

    fn backend_name(&self) -> &'static str {
        "bigquery"
    }
}

fn describe_insert_error(error: &InsertError) -> String {
    let reasons = error
        .errors
        .iter()
        .map(|e| {
            format!(
                "{}: {}",
                e.reason.as_deref().unwrap_or("unknown"),
                e.message.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join(", ");

    match error.index {
        Some(index) => format!("row {}: {}", index, reasons),
        None => reasons,
    }
}

/// Pull `error.message` out of a Google API error body, else return the body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<JsonValue>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(JsonValue::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

fn decode_row(fields: &[FieldSchema], row: TableRow) -> WarehouseResult<Row> {
    if row.f.len() != fields.len() {
        return Err(WarehouseError::Decode(format!(
            "row has {} cells but schema has {} fields",
            row.f.len(),
            fields.len()
        )));
    }

    Ok(fields
        .iter()
        .zip(row.f)
        .map(|(field, cell)| (field.name.clone(), decode_cell(&field.field_type, cell.v)))
        .collect())
}

/// Cells come back as strings; use the schema type to restore scalars.
/// `timeoutMs` for `jobs.query`: 80% of the client timeout, leaving the
/// server room to answer `jobComplete=false` before the client gives up.
fn server_wait_ms(client_timeout: Duration) -> u64 {
    if client_timeout.is_zero() {
        return DEFAULT_QUERY_WAIT_MS;
    }
    let millis = u64::try_from(client_timeout.as_millis()).unwrap_or(u64::MAX);
    millis / 5 * 4
}

fn decode_cell(field_type: &str, value: JsonValue) -> JsonValue {
    let JsonValue::String(text) = value else {
        return value;
    };

    match field_type {
        "INTEGER" | "INT64" => text.parse::<i64>().map(JsonValue::from).unwrap_or(JsonValue::String(text)),
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::String(text)),
        "BOOLEAN" | "BOOL" => match text.as_str() {
            "true" => JsonValue::Bool(true),
            "false" => JsonValue::Bool(false),
            _ => JsonValue::String(text),
        },
        _ => JsonValue::String(text),
    }
}
