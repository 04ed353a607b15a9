//! `vertical-research`: one lead event per vertical

use chrono::Utc;
use pulse_common::Payload;
use tracing::info;
use uuid::Uuid;

use super::{insert, string_list};
use crate::context::AppContext;
use crate::error::WorkerResult;
use crate::models::{LeadEvent, LEAD_EVENTS_TABLE};

pub const DEFAULT_RESEARCH_VERTICALS: [&str; 4] = [
    "home-services",
    "dental-clinics",
    "accounting-firms",
    "fitness-studios",
];

const EVENT_TYPE: &str = "vertical_insight";
const EVENT_VALUE: &str = "research_requested";
const EVENT_SOURCE: &str = "vertical-research";

pub(super) async fn run(ctx: &AppContext, payload: &Payload) -> WorkerResult<u64> {
    let verticals = string_list(payload, "verticals", &DEFAULT_RESEARCH_VERTICALS);
    let captured_at = Utc::now();

    let rows: Vec<LeadEvent> = verticals
        .into_iter()
        .map(|vertical| LeadEvent {
            captured_at,
            lead_id: Uuid::new_v4().to_string(),
            vertical,
            event_type: EVENT_TYPE.to_string(),
            event_value: EVENT_VALUE.to_string(),
            source: EVENT_SOURCE.to_string(),
        })
        .collect();

    let written = insert(ctx, LEAD_EVENTS_TABLE, &rows).await?;
    info!(rows = written, "Recorded vertical research events");

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::in_memory_context;
    use crate::jobs::dispatch;
    use pulse_common::decode_payload;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_default_verticals_get_unique_lead_ids() {
        let (ctx, warehouse) = in_memory_context();

        let rows = dispatch(&ctx, "vertical-research", &Payload::new()).await.unwrap();
        assert_eq!(rows, 4);

        let stored = warehouse.rows(&ctx.table(LEAD_EVENTS_TABLE));
        let ids: HashSet<&str> = stored.iter().map(|r| r["lead_id"].as_str().unwrap()).collect();
        assert_eq!(ids.len(), 4);
        assert!(stored.iter().all(|r| r["event_type"] == "vertical_insight"));

        let verticals: Vec<&str> = stored.iter().map(|r| r["vertical"].as_str().unwrap()).collect();
        assert_eq!(verticals, DEFAULT_RESEARCH_VERTICALS);
    }

    #[tokio::test]
    async fn test_single_vertical_scalar() {
        let (ctx, warehouse) = in_memory_context();
        let payload = decode_payload("{verticals: roofing}");

        let rows = dispatch(&ctx, "vertical-research", &payload).await.unwrap();
        assert_eq!(rows, 1);
        assert_eq!(warehouse.rows(&ctx.table(LEAD_EVENTS_TABLE))[0]["vertical"], "roofing");
    }
}
