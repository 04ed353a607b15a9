//! `fetch-trends`: one scored snapshot per signal

use chrono::Utc;
use pulse_common::Payload;
use tracing::info;

use super::{insert, string_arg, string_list};
use crate::context::AppContext;
use crate::error::WorkerResult;
use crate::models::{TrendSnapshot, TREND_SNAPSHOTS_TABLE};

pub const DEFAULT_VERTICAL: &str = "small-business-ops";

pub const DEFAULT_SIGNALS: [&str; 5] = [
    "manual invoicing backlog",
    "missed lead follow-ups",
    "appointment no-shows",
    "slow quote turnaround",
    "unanswered review requests",
];

const TREND_SOURCE: &str = "fetch-trends";

/// Score for the signal at `index`: 1.0 down by 0.1 per step, floor 0.1,
/// rounded to two decimals.
pub fn signal_score(index: usize) -> f64 {
    let raw = (1.0 - 0.1 * index as f64).max(0.1);
    (raw * 100.0).round() / 100.0
}

pub(super) async fn run(ctx: &AppContext, payload: &Payload) -> WorkerResult<u64> {
    let vertical = string_arg(payload, "vertical", DEFAULT_VERTICAL);
    let signals = string_list(payload, "signals", &DEFAULT_SIGNALS);
    let captured_at = Utc::now();

    let rows: Vec<TrendSnapshot> = signals
        .into_iter()
        .enumerate()
        .map(|(index, signal)| TrendSnapshot {
            captured_at,
            source: TREND_SOURCE.to_string(),
            vertical: vertical.clone(),
            signal,
            score: signal_score(index),
        })
        .collect();

    let written = insert(ctx, TREND_SNAPSHOTS_TABLE, &rows).await?;
    info!(vertical = %vertical, rows = written, "Recorded trend snapshots");

    Ok(written)
}
