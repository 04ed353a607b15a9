//! Writes audit records to the warehouse

use chrono::{DateTime, Utc};
use tracing::debug;

use super::models::{AuditRecord, JobStatus, JOB_RUNS_TABLE};
use crate::context::AppContext;
use crate::error::WorkerResult;

/// Append one audit record for a finished job run.
///
/// Returns the stored record. Write failures propagate to the caller.
pub async fn record(
    ctx: &AppContext,
    started_at: DateTime<Utc>,
    job: &str,
    status: JobStatus,
    rows_processed: u64,
    notes: &str,
) -> WorkerResult<AuditRecord> {
    let record = AuditRecord::new(started_at, job, status, rows_processed, notes);
    let row = serde_json::to_value(&record)?;

    ctx.warehouse
        .insert_rows(&ctx.table(JOB_RUNS_TABLE), vec![row])
        .await?;

    debug!(
        job = %record.job,
        status = %record.status,
        rows_processed = record.rows_processed,
        "Recorded job run"
    );

    Ok(record)
}
