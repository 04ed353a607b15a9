//! Job dispatch
//!
//! A push names its job with a plain string. [`JobKind::parse`] maps it onto
//! the closed set of handlers; anything else is [`JobKind::Unrecognized`],
//! which dispatches as a no-op and is still audited as a success.
//!
//! Each handler returns the number of rows it attempted to write. Warehouse
//! failures propagate as [`WorkerError`]s; handlers never swallow them.

mod ab_evaluate;
mod campaigns;
mod daily_report;
mod research;
mod trends;

use pulse_common::{Payload, PayloadValue, PushMessage};
use serde::Serialize;
use tracing::debug;

use crate::context::AppContext;
use crate::error::WorkerResult;

pub use ab_evaluate::{VariantPerformance, LOOKBACK_DAYS, MAX_GROUPS};
pub use campaigns::{CAMPAIGN_CHANNEL, COPY_TEMPLATES, DEFAULT_CAMPAIGN_VERTICALS};
pub use research::DEFAULT_RESEARCH_VERTICALS;
pub use trends::{signal_score, DEFAULT_SIGNALS, DEFAULT_VERTICAL};

/// Job name used when neither the payload nor the attributes name one
pub const UNKNOWN_JOB: &str = "unknown";

/// Key naming the job, in the payload and in message attributes
pub const JOB_KEY: &str = "job";

/// The handlers this worker knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    FetchTrends,
    VerticalResearch,
    CampaignGenerate,
    AbEvaluate,
    DailyReport,
    /// Any other name, including `unknown`
    Unrecognized,
}

impl JobKind {
    pub fn parse(job: &str) -> Self {
        match job {
            "fetch-trends" => Self::FetchTrends,
            "vertical-research" => Self::VerticalResearch,
            "campaign-generate" => Self::CampaignGenerate,
            "ab-evaluate" => Self::AbEvaluate,
            "daily-report" => Self::DailyReport,
            _ => Self::Unrecognized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FetchTrends => "fetch-trends",
            Self::VerticalResearch => "vertical-research",
            Self::CampaignGenerate => "campaign-generate",
            Self::AbEvaluate => "ab-evaluate",
            Self::DailyReport => "daily-report",
            Self::Unrecognized => UNKNOWN_JOB,
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Job name for a push: payload `job`, then attribute `job`, then `unknown`.
///
/// A scalar payload `job` is used in its text form, so `{"job": 42}` names
/// job `"42"`. Empty strings, nulls, lists and maps count as absent.
pub fn resolve_job(payload: &Payload, message: &PushMessage) -> String {
    payload
        .get(JOB_KEY)
        .and_then(scalar_text)
        .filter(|job| !job.is_empty())
        .or_else(|| {
            message
                .attribute(JOB_KEY)
                .filter(|job| !job.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| UNKNOWN_JOB.to_string())
}

fn scalar_text(value: &PayloadValue) -> Option<String> {
    match value {
        PayloadValue::String(_)
        | PayloadValue::Integer(_)
        | PayloadValue::Float(_)
        | PayloadValue::Bool(_) => Some(value.to_text()),
        PayloadValue::Null | PayloadValue::List(_) | PayloadValue::Map(_) => None,
    }
}

/// Run the handler for `job` and return the rows it processed.
pub async fn dispatch(ctx: &AppContext, job: &str, payload: &Payload) -> WorkerResult<u64> {
    match JobKind::parse(job) {
        JobKind::FetchTrends => trends::run(ctx, payload).await,
        JobKind::VerticalResearch => research::run(ctx, payload).await,
        JobKind::CampaignGenerate => campaigns::run(ctx, payload).await,
        JobKind::AbEvaluate => ab_evaluate::run(ctx).await,
        JobKind::DailyReport => daily_report::run(ctx).await,
        JobKind::Unrecognized => {
            debug!(job, "No handler for job, skipping");
            Ok(0)
        },
    }
}

/// Text argument, falling back to `default` when missing, null or blank.
fn string_arg(payload: &Payload, key: &str, default: &str) -> String {
    match payload.get(key) {
        None | Some(PayloadValue::Null) => default.to_string(),
        Some(value) => {
            let text = value.to_text();
            if text.trim().is_empty() {
                default.to_string()
            } else {
                text
            }
        },
    }
}

/// List argument. A scalar counts as a one-item list; missing or null gives
/// `defaults`. An explicit empty list stays empty.
fn string_list(payload: &Payload, key: &str, defaults: &[&str]) -> Vec<String> {
    match payload.get(key) {
        None | Some(PayloadValue::Null) => defaults.iter().map(|s| s.to_string()).collect(),
        Some(PayloadValue::List(items)) => items.iter().map(PayloadValue::to_text).collect(),
        Some(value) => vec![value.to_text()],
    }
}

/// Serialize and append `rows` to `table`. Returns the number of rows sent.
async fn insert<T: Serialize>(ctx: &AppContext, table: &str, rows: &[T]) -> WorkerResult<u64> {
    if rows.is_empty() {
        return Ok(0);
    }

    let values = rows
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;

    ctx.warehouse.insert_rows(&ctx.table(table), values).await?;

    Ok(rows.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::in_memory_context;
    use pulse_common::{decode_payload, PushEnvelope};

    fn message(attributes: serde_json::Value) -> PushMessage {
        let body = serde_json::json!({ "message": { "attributes": attributes, "data": "" } });
        PushEnvelope::from_body(body.to_string().as_bytes()).message
    }

    #[test]
    fn test_job_kind_parse_round_trip() {
        for kind in [
            JobKind::FetchTrends,
            JobKind::VerticalResearch,
            JobKind::CampaignGenerate,
            JobKind::AbEvaluate,
            JobKind::DailyReport,
        ] {
            assert_eq!(JobKind::parse(kind.as_str()), kind);
        }

        assert_eq!(JobKind::parse("unknown"), JobKind::Unrecognized);
        assert_eq!(JobKind::parse("Fetch-Trends"), JobKind::Unrecognized);
    }

    #[test]
    fn test_resolve_job_precedence() {
        let attrs = message(serde_json::json!({ "job": "daily-report" }));

        let payload = decode_payload(r#"{"job": "fetch-trends"}"#);
        assert_eq!(resolve_job(&payload, &attrs), "fetch-trends");

        let payload = decode_payload(r#"{"vertical": "dental"}"#);
        assert_eq!(resolve_job(&payload, &attrs), "daily-report");

        let payload = decode_payload(r#"{"job": ""}"#);
        assert_eq!(resolve_job(&payload, &attrs), "daily-report");

        let none = message(serde_json::json!({}));
        assert_eq!(resolve_job(&Payload::new(), &none), UNKNOWN_JOB);
    }

    #[test]
    fn test_resolve_job_scalar_payload_values() {
        let attrs = message(serde_json::json!({ "job": "daily-report" }));

        let payload = decode_payload(r#"{"job": 42}"#);
        assert_eq!(resolve_job(&payload, &attrs), "42");

        let payload = decode_payload("{job: true}");
        assert_eq!(resolve_job(&payload, &attrs), "true");

        for absent in [r#"{"job": null}"#, r#"{"job": ["fetch-trends"]}"#, r#"{"job": {}}"#] {
            assert_eq!(resolve_job(&decode_payload(absent), &attrs), "daily-report");
        }
    }

    #[test]
    fn test_string_list_shapes() {
        let defaults = ["a", "b"];

        let payload = decode_payload(r#"{"xs": ["x", 2, true]}"#);
        assert_eq!(string_list(&payload, "xs", &defaults), vec!["x", "2", "true"]);

        let payload = decode_payload("{xs: solo}");
        assert_eq!(string_list(&payload, "xs", &defaults), vec!["solo"]);

        let payload = decode_payload(r#"{"xs": null}"#);
        assert_eq!(string_list(&payload, "xs", &defaults), vec!["a", "b"]);

        let payload = decode_payload(r#"{"xs": []}"#);
        assert!(string_list(&payload, "xs", &defaults).is_empty());
    }

    #[test]
    fn test_string_arg_defaults() {
        let payload = decode_payload(r#"{"vertical": "  ", "n": 3}"#);
        assert_eq!(string_arg(&payload, "vertical", "fallback"), "fallback");
        assert_eq!(string_arg(&payload, "n", "fallback"), "3");
        assert_eq!(string_arg(&payload, "missing", "fallback"), "fallback");
    }

    #[tokio::test]
    async fn test_unknown_job_is_a_no_op() {
        let (ctx, warehouse) = in_memory_context();

        let rows = dispatch(&ctx, "unknown-job-xyz", &Payload::new()).await.unwrap();
        assert_eq!(rows, 0);

        let rows = dispatch(&ctx, UNKNOWN_JOB, &Payload::new()).await.unwrap();
        assert_eq!(rows, 0);

        assert_eq!(warehouse.total_rows(), 0);
        assert!(warehouse.executed_queries().is_empty());
    }

    #[tokio::test]
    async fn test_insert_failure_propagates() {
        let (ctx, warehouse) = in_memory_context();
        warehouse.fail_inserts_into(crate::models::TREND_SNAPSHOTS_TABLE, "row 0: invalid");

        let err = dispatch(&ctx, "fetch-trends", &Payload::new()).await.unwrap_err();
        assert!(err.to_string().contains("row 0: invalid"));
    }
}
