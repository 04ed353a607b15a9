//! `ab-evaluate`: rank recent variant performance and log a summary event

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::insert;
use crate::context::AppContext;
use crate::error::WorkerResult;
use crate::models::{LeadEvent, AB_RESULTS_TABLE, LEAD_EVENTS_TABLE};
use crate::warehouse::{row_f64, row_i64, row_string, QueryParameter, Row};

/// Window of `ab_results` considered, in days.
pub const LOOKBACK_DAYS: i64 = 14;

/// Maximum number of (campaign, variant) groups returned.
pub const MAX_GROUPS: usize = 25;

const SUMMARY_VERTICAL: &str = "all";
const SUMMARY_EVENT_TYPE: &str = "ab_evaluation";
const SUMMARY_SOURCE: &str = "ab-evaluate";

/// Aggregated results of one variant over the lookback window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantPerformance {
    pub campaign_id: Option<String>,
    pub variant_id: Option<String>,
    pub impressions: i64,
    pub clicks: i64,
    pub replies: i64,
    pub booked_calls: i64,
    pub spend: f64,
}

impl VariantPerformance {
    pub fn from_row(row: &Row) -> Self {
        Self {
            campaign_id: row_string(row, "campaign_id"),
            variant_id: row_string(row, "variant_id"),
            impressions: row_i64(row, "impressions"),
            clicks: row_i64(row, "clicks"),
            replies: row_i64(row, "replies"),
            booked_calls: row_i64(row, "booked_calls"),
            spend: row_f64(row, "spend"),
        }
    }
}

fn aggregate_sql(table: &str) -> String {
    format!(
        r#"
        SELECT
            campaign_id,
            variant_id,
            SUM(impressions) AS impressions,
            SUM(clicks) AS clicks,
            SUM(replies) AS replies,
            SUM(booked_calls) AS booked_calls,
            SUM(spend) AS spend
        FROM `{table}`
        WHERE recorded_at >= @since
        GROUP BY campaign_id, variant_id
        ORDER BY booked_calls DESC, replies DESC
        LIMIT @max_groups
        "#
    )
}

pub(super) async fn run(ctx: &AppContext) -> WorkerResult<u64> {
    let since = Utc::now() - Duration::days(LOOKBACK_DAYS);
    let sql = aggregate_sql(&ctx.table(AB_RESULTS_TABLE).to_string());
    let params = [
        QueryParameter::timestamp("since", since),
        QueryParameter::int64("max_groups", MAX_GROUPS as i64),
    ];

    let results: Vec<VariantPerformance> = ctx
        .warehouse
        .query(&sql, &params)
        .await?
        .iter()
        .take(MAX_GROUPS)
        .map(VariantPerformance::from_row)
        .collect();

    let top_variant_id = results.first().and_then(|r| r.variant_id.clone());

    let summary = LeadEvent {
        captured_at: Utc::now(),
        lead_id: Uuid::new_v4().to_string(),
        vertical: SUMMARY_VERTICAL.to_string(),
        event_type: SUMMARY_EVENT_TYPE.to_string(),
        event_value: json!({
            "groups": results.len(),
            "top_variant_id": top_variant_id,
        })
        .to_string(),
        source: SUMMARY_SOURCE.to_string(),
    };
    insert(ctx, LEAD_EVENTS_TABLE, &[summary]).await?;

    info!(
        groups = results.len(),
        top_variant_id = ?top_variant_id,
        "Evaluated A/B results"
    );

    Ok(results.len() as u64)
}
