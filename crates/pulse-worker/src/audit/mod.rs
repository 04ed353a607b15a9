//! Audit trail of job runs
//!
//! Every push produces exactly one [`AuditRecord`] in the `job_runs` table,
//! written after dispatch has finished or failed:
//!
//! - `success`: rows processed by the handler, notes `"ok"`
//! - `failed`: zero rows, notes carry the error text
//!
//! Notes are truncated to [`MAX_NOTES_CHARS`] characters at write time. A
//! failed audit write is returned to the caller; the push endpoint handles it
//! at the same boundary as a handler failure.
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use pulse_worker::audit::{record, JobStatus};
//! use pulse_worker::context::AppContext;
//!
//! # async fn example(ctx: &AppContext) -> pulse_worker::error::WorkerResult<()> {
//! let started_at = Utc::now();
//! let audit = record(ctx, started_at, "fetch-trends", JobStatus::Success, 5, "ok").await?;
//! assert_eq!(audit.rows_processed, 5);
//! # Ok(())
//! # }
//! ```

mod models;
mod recorder;

pub use models::{truncate_notes, AuditRecord, JobStatus, JOB_RUNS_TABLE, MAX_NOTES_CHARS};
pub use recorder::record;
