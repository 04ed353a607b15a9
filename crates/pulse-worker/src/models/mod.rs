//! Warehouse row types written by the job handlers
//!
//! All tables are append-only. Timestamps serialize as RFC 3339 UTC strings,
//! which the warehouse accepts for `TIMESTAMP` columns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Table Names
// ============================================================================

pub const TREND_SNAPSHOTS_TABLE: &str = "trend_snapshots";
pub const LEAD_EVENTS_TABLE: &str = "lead_events";
pub const CAMPAIGN_VARIANTS_TABLE: &str = "campaign_variants";

/// Read-only experiment results, written by an external producer
pub const AB_RESULTS_TABLE: &str = "ab_results";

/// One scored signal for a vertical
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSnapshot {
    pub captured_at: DateTime<Utc>,
    pub source: String,
    pub vertical: String,
    pub signal: String,
    /// In (0, 1], two decimals
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadEvent {
    pub captured_at: DateTime<Utc>,
    /// Fresh UUID per row
    pub lead_id: String,
    pub vertical: String,
    pub event_type: String,
    pub event_value: String,
    pub source: String,
}

/// Draft outreach copy for one campaign arm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignVariant {
    pub created_at: DateTime<Utc>,
    pub campaign_id: String,
    pub vertical: String,
    pub channel: String,
    pub variant_id: String,
    pub copy: String,
    pub status: String,
}
