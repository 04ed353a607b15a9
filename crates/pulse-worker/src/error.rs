//! Worker error types

use thiserror::Error;

use crate::warehouse::WarehouseError;

/// Result type alias for worker operations
pub type WorkerResult<T> = std::result::Result<T, WorkerError>;

/// Faults raised while running a job or recording its outcome.
///
/// The push endpoint catches these, records a failed audit row and answers
/// with a 500 carrying the error's `Display` text.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Warehouse error: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The push body could not be read, e.g. it exceeded the size limit
    #[error("Request body rejected: {0}")]
    RequestBody(String),
}
