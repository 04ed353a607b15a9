//! Configuration management

use serde::{Deserialize, Serialize};

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Default shutdown grace period in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;

/// Service name reported by the health check.
pub const DEFAULT_SERVICE_NAME: &str = "pulse-worker";

// ============================================================================
// Warehouse Configuration Constants
// ============================================================================

/// Default dataset holding the worker's tables.
pub const DEFAULT_DATASET: &str = "marketing_ops";

/// BigQuery REST API root.
pub const DEFAULT_BIGQUERY_API_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Default warehouse HTTP timeout in seconds.
pub const DEFAULT_WAREHOUSE_TIMEOUT_SECS: u64 = 30;

/// Worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub service_name: String,
    pub server: ServerConfig,
    pub warehouse: WarehouseConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Which warehouse implementation backs the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WarehouseBackend {
    #[default]
    BigQuery,
    /// Process-local tables, for local runs without cloud credentials
    Memory,
}

impl std::str::FromStr for WarehouseBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bigquery" | "bq" => Ok(Self::BigQuery),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => Err(anyhow::anyhow!("Invalid warehouse backend: {}", other)),
        }
    }
}

/// Warehouse configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    pub backend: WarehouseBackend,
    pub project_id: String,
    pub dataset: String,
    pub api_base_url: String,
    /// Static bearer token; the metadata server is used when unset
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("backend", &self.backend)
            .field("project_id", &self.project_id)
            .field("dataset", &self.dataset)
            .field("api_base_url", &self.api_base_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            service_name: env_non_empty("SERVICE_NAME")
                .or_else(|| env_non_empty("K_SERVICE"))
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
            server: ServerConfig {
                host: std::env::var("HOST").unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: std::env::var("PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: std::env::var("SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            },
            warehouse: WarehouseConfig {
                backend: match env_non_empty("WAREHOUSE_BACKEND") {
                    Some(value) => value.parse()?,
                    None => WarehouseBackend::default(),
                },
                project_id: env_non_empty("GCP_PROJECT_ID")
                    .or_else(|| env_non_empty("GOOGLE_CLOUD_PROJECT"))
                    .unwrap_or_default(),
                dataset: env_non_empty("BQ_DATASET").unwrap_or_else(|| DEFAULT_DATASET.to_string()),
                api_base_url: env_non_empty("BQ_API_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_BIGQUERY_API_BASE_URL.to_string()),
                access_token: env_non_empty("BQ_ACCESS_TOKEN"),
                timeout_secs: std::env::var("BQ_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_WAREHOUSE_TIMEOUT_SECS),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.warehouse.dataset.trim().is_empty() {
            anyhow::bail!("Warehouse dataset cannot be empty");
        }

        if self.warehouse.backend == WarehouseBackend::BigQuery
            && self.warehouse.project_id.trim().is_empty()
        {
            anyhow::bail!(
                "GCP_PROJECT_ID (or GOOGLE_CLOUD_PROJECT) is required for the bigquery backend"
            );
        }

        if self.warehouse.timeout_secs == 0 {
            tracing::warn!("Warehouse timeout is 0 - requests will rely on client defaults");
        }

        Ok(())
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            warehouse: WarehouseConfig {
                backend: WarehouseBackend::default(),
                project_id: String::new(),
                dataset: DEFAULT_DATASET.to_string(),
                api_base_url: DEFAULT_BIGQUERY_API_BASE_URL.to_string(),
                access_token: None,
                timeout_secs: DEFAULT_WAREHOUSE_TIMEOUT_SECS,
            },
        }
    }
}
