//! Request-independent state shared by every handler

use std::sync::Arc;

use tracing::info;

use crate::config::{Config, WarehouseBackend};
use crate::warehouse::{BigQueryWarehouse, InMemoryWarehouse, TableRef, Warehouse};

/// Project used to qualify table names when none is configured.
pub const LOCAL_PROJECT: &str = "local";

/// Configuration plus the long-lived warehouse handle.
///
/// Built once in `main` and cloned into each request; both fields are
/// reference counted.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub warehouse: Arc<dyn Warehouse>,
}

impl AppContext {
    pub fn new(config: Config, warehouse: Arc<dyn Warehouse>) -> Self {
        Self {
            config: Arc::new(config),
            warehouse,
        }
    }

    /// Build the warehouse selected by `config`.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let warehouse: Arc<dyn Warehouse> = match config.warehouse.backend {
            WarehouseBackend::BigQuery => Arc::new(BigQueryWarehouse::new(&config.warehouse)?),
            WarehouseBackend::Memory => Arc::new(InMemoryWarehouse::new()),
        };

        info!(
            backend = warehouse.backend_name(),
            project_id = %config.warehouse.project_id,
            dataset = %config.warehouse.dataset,
            "Warehouse client initialized"
        );

        Ok(Self::new(config, warehouse))
    }

    /// Qualify a table name as `<project>.<dataset>.<table>`.
    pub fn table(&self, name: &str) -> TableRef {
        let project = self.config.warehouse.project_id.trim();
        let project = if project.is_empty() { LOCAL_PROJECT } else { project };

        TableRef::new(project, self.config.warehouse.dataset.as_str(), name)
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("config", &self.config)
            .field("warehouse", &self.warehouse.backend_name())
            .finish()
    }
}


#[cfg(test)]
pub(crate) fn in_memory_context() -> (AppContext, Arc<InMemoryWarehouse>) {
    let mut config = Config::default();
    config.warehouse.backend = WarehouseBackend::Memory;
    config.warehouse.project_id = "acme-growth".to_string();

    let warehouse = Arc::new(InMemoryWarehouse::new());
    (AppContext::new(config, warehouse.clone()), warehouse)
}
