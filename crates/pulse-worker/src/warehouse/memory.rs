//! In-memory warehouse
//!
//! Append-only tables held in process memory. Queries never see the stored
//! tables; they return whatever rows were scripted for a matching SQL
//! fragment, or nothing.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::debug;

use super::{QueryParameter, Row, TableRef, Warehouse, WarehouseError, WarehouseResult};

#[derive(Debug, Default)]
pub struct InMemoryWarehouse {
    tables: RwLock<HashMap<String, Vec<JsonValue>>>,
    responses: RwLock<Vec<(String, Vec<Row>)>>,
    failing_tables: RwLock<HashMap<String, String>>,
    failing_queries: RwLock<Vec<(String, String)>>,
    executed: RwLock<Vec<(String, Vec<QueryParameter>)>>,
}

impl InMemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows appended to `table` so far, in insert order.
    pub fn rows(&self, table: &TableRef) -> Vec<JsonValue> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&table.to_string())
            .cloned()
            .unwrap_or_default()
    }

    /// Total rows across every table.
    pub fn total_rows(&self) -> usize {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Answer queries whose SQL contains `fragment` with `rows`.
    ///
    /// The first matching script wins.
    pub fn respond_to(&self, fragment: impl Into<String>, rows: Vec<Row>) {
        self.responses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((fragment.into(), rows));
    }

    /// Make every insert into a table with this short name fail.
    pub fn fail_inserts_into(&self, table_name: impl Into<String>, message: impl Into<String>) {
        self.failing_tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(table_name.into(), message.into());
    }

    /// Make every query whose SQL contains `fragment` fail.
    pub fn fail_queries_matching(&self, fragment: impl Into<String>, message: impl Into<String>) {
        self.failing_queries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((fragment.into(), message.into()));
    }

    /// SQL text and parameters of every query run so far.
    pub fn executed_queries(&self) -> Vec<(String, Vec<QueryParameter>)> {
        self.executed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Warehouse for InMemoryWarehouse {
    async fn insert_rows(&self, table: &TableRef, rows: Vec<JsonValue>) -> WarehouseResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        if let Some(message) = self
            .failing_tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&table.table)
        {
            return Err(WarehouseError::InsertErrors {
                table: table.to_string(),
                failed_rows: rows.len(),
                detail: message.clone(),
            });
        }

        debug!(table = %table, rows = rows.len(), "Appending rows in memory");

        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(table.to_string())
            .or_default()
            .extend(rows);

        Ok(())
    }

    async fn query(&self, sql: &str, params: &[QueryParameter]) -> WarehouseResult<Vec<Row>> {
        self.executed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((sql.to_string(), params.to_vec()));

        if let Some((_, message)) = self
            .failing_queries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
        {
            return Err(WarehouseError::Api {
                status: 500,
                message: message.clone(),
            });
        }

        Ok(self
            .responses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(name: &str) -> TableRef {
        TableRef::new("local", "marketing_ops", name)
    }

    #[tokio::test]
    async fn test_insert_appends_in_order() {
        let warehouse = InMemoryWarehouse::new();

        warehouse
            .insert_rows(&table("lead_events"), vec![json!({"n": 1}), json!({"n": 2})])
            .await
            .unwrap();
        warehouse
            .insert_rows(&table("lead_events"), vec![json!({"n": 3})])
            .await
            .unwrap();

        let rows = warehouse.rows(&table("lead_events"));
        assert_eq!(rows, vec![json!({"n": 1}), json!({"n": 2}), json!({"n": 3})]);
        assert_eq!(warehouse.total_rows(), 3);
    }

    #[tokio::test]
    async fn test_failing_table_rejects_whole_batch() {
        let warehouse = InMemoryWarehouse::new();
        warehouse.fail_inserts_into("job_runs", "quota exceeded");

        let err = warehouse
            .insert_rows(&table("job_runs"), vec![json!({"n": 1})])
            .await
            .unwrap_err();

        assert!(err.to_string().contains("quota exceeded"));
        assert_eq!(warehouse.total_rows(), 0);
    }

    #[tokio::test]
    async fn test_scripted_query_response() {
        let warehouse = InMemoryWarehouse::new();
        let row: Row = json!({"n": 7}).as_object().cloned().unwrap();
        warehouse.respond_to("FROM `local.marketing_ops.lead_events`", vec![row.clone()]);

        let rows = warehouse
            .query("SELECT COUNT(*) AS n FROM `local.marketing_ops.lead_events`", &[])
            .await
            .unwrap();
        assert_eq!(rows, vec![row]);

        let rows = warehouse.query("SELECT 1", &[]).await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(warehouse.executed_queries().len(), 2);
    }

    #[tokio::test]
    async fn test_failing_query() {
        let warehouse = InMemoryWarehouse::new();
        warehouse.fail_queries_matching("ab_results", "table not found");

        let err = warehouse.query("SELECT * FROM ab_results", &[]).await.unwrap_err();
        assert!(matches!(err, WarehouseError::Api { status: 500, .. }));
    }
}
