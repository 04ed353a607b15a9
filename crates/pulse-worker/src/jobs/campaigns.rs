//! `campaign-generate`: three draft variants per vertical

use chrono::Utc;
use pulse_common::Payload;
use tracing::info;
use uuid::Uuid;

use super::{insert, string_list};
use crate::context::AppContext;
use crate::error::WorkerResult;
use crate::models::{CampaignVariant, CAMPAIGN_VARIANTS_TABLE};

pub const DEFAULT_CAMPAIGN_VERTICALS: [&str; 3] =
    ["home-services", "dental-clinics", "accounting-firms"];

pub const CAMPAIGN_CHANNEL: &str = "email";

/// Copy templates; `{vertical}` is replaced per campaign.
pub const COPY_TEMPLATES: [&str; 3] = [
    "Quick question: how are {vertical} teams handling follow-ups this month?",
    "We help {vertical} owners win back 5 hours a week. Worth a 15-minute call?",
    "Most {vertical} businesses lose leads after hours. Here's how to stop that.",
];

const DRAFT_STATUS: &str = "draft";

fn new_campaign_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("cmp-{}", &id[..12])
}

pub(super) async fn run(ctx: &AppContext, payload: &Payload) -> WorkerResult<u64> {
    let verticals = string_list(payload, "verticals", &DEFAULT_CAMPAIGN_VERTICALS);
    let created_at = Utc::now();

    let mut rows = Vec::with_capacity(verticals.len() * COPY_TEMPLATES.len());
    for vertical in &verticals {
        let campaign_id = new_campaign_id();

        for (index, template) in COPY_TEMPLATES.iter().enumerate() {
            rows.push(CampaignVariant {
                created_at,
                campaign_id: campaign_id.clone(),
                vertical: vertical.clone(),
                channel: CAMPAIGN_CHANNEL.to_string(),
                variant_id: format!("{}-v{}", campaign_id, index + 1),
                copy: template.replace("{vertical}", vertical),
                status: DRAFT_STATUS.to_string(),
            });
        }
    }

    let written = insert(ctx, CAMPAIGN_VARIANTS_TABLE, &rows).await?;
    info!(campaigns = verticals.len(), rows = written, "Generated draft campaign variants");

    Ok(written)
}
