//! Audit data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Audit Constants
// ============================================================================

/// Table holding one row per job run
pub const JOB_RUNS_TABLE: &str = "job_runs";

/// Maximum stored length of `notes`, in characters.
pub const MAX_NOTES_CHARS: usize = 1024;

/// Outcome of a job run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Success,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of `job_runs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub job: String,
    pub status: JobStatus,
    pub rows_processed: u64,
    /// Always 0.0; no cost tracking exists
    pub cost_estimate_usd: f64,
    pub notes: String,
}

impl AuditRecord {
    /// Build a record finishing now, with `notes` already truncated.
    pub fn new(
        started_at: DateTime<Utc>,
        job: impl Into<String>,
        status: JobStatus,
        rows_processed: u64,
        notes: &str,
    ) -> Self {
        Self {
            started_at,
            finished_at: Utc::now(),
            job: job.into(),
            status,
            rows_processed,
            cost_estimate_usd: 0.0,
            notes: truncate_notes(notes),
        }
    }
}

/// First [`MAX_NOTES_CHARS`] characters of `notes`.
pub fn truncate_notes(notes: &str) -> String {
    match notes.char_indices().nth(MAX_NOTES_CHARS) {
        Some((byte_index, _)) => notes[..byte_index].to_string(),
        None => notes.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_long_notes_to_exact_length() {
        let notes = "x".repeat(5000);
        assert_eq!(truncate_notes(&notes).chars().count(), MAX_NOTES_CHARS);
    }

    #[test]
    fn test_truncate_keeps_short_notes() {
        assert_eq!(truncate_notes("ok"), "ok");

        let exact = "y".repeat(MAX_NOTES_CHARS);
        assert_eq!(truncate_notes(&exact), exact);
    }

    #[test]
    fn test_truncate_counts_characters_not_bytes() {
        let notes = "é".repeat(MAX_NOTES_CHARS + 10);
        let truncated = truncate_notes(&notes);

        assert_eq!(truncated.chars().count(), MAX_NOTES_CHARS);
        assert_eq!(truncated.len(), MAX_NOTES_CHARS * 2);
    }

    #[test]
    fn test_record_serializes_status_lowercase() {
        let record = AuditRecord::new(Utc::now(), "fetch-trends", JobStatus::Failed, 0, "boom");
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["status"], "failed");
        assert_eq!(value["cost_estimate_usd"], 0.0);
        assert_eq!(value["notes"], "boom");
        assert!(record.finished_at >= record.started_at);
    }
}
