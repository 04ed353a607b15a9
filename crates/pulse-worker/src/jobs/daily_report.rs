//! `daily-report`: last-24h activity counts, emitted as a log record only

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::context::AppContext;
use crate::error::WorkerResult;
use crate::models::{CAMPAIGN_VARIANTS_TABLE, LEAD_EVENTS_TABLE, TREND_SNAPSHOTS_TABLE};
use crate::warehouse::{row_i64, QueryParameter};

const REPORT_WINDOW_HOURS: i64 = 24;

async fn count_since(
    ctx: &AppContext,
    table: &str,
    column: &str,
    since: DateTime<Utc>,
) -> WorkerResult<i64> {
    let sql = format!(
        "SELECT COUNT(*) AS n FROM `{}` WHERE {} >= @since",
        ctx.table(table),
        column
    );

    let rows = ctx
        .warehouse
        .query(&sql, &[QueryParameter::timestamp("since", since)])
        .await?;

    Ok(rows.first().map(|row| row_i64(row, "n")).unwrap_or(0))
}

pub(super) async fn run(ctx: &AppContext) -> WorkerResult<u64> {
    let since = Utc::now() - Duration::hours(REPORT_WINDOW_HOURS);

    let (trend_snapshots, campaign_variants, lead_events) = tokio::try_join!(
        count_since(ctx, TREND_SNAPSHOTS_TABLE, "captured_at", since),
        count_since(ctx, CAMPAIGN_VARIANTS_TABLE, "created_at", since),
        count_since(ctx, LEAD_EVENTS_TABLE, "captured_at", since),
    )?;

    info!(
        report = "daily",
        since = %since.to_rfc3339(),
        trend_snapshots,
        campaign_variants,
        lead_events,
        "Daily activity report"
    );

    Ok(1)
}
