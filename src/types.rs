//! Core types shared across the engine.
//!
//! These models are intentionally conservative and forward-compatible:
//! - Numeric fields are `u64` where practical (period/report ids, counts,
//!   epoch seconds).
//! - Hex/address surfaces are `String` with `0x`-lowercase canonicalization
//!   handled by `crate::address`.
//! - Unknown fields from the WoM service are preserved via `#[serde(flatten)]`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::report::payload::ReportPayload;

/// Canonical `0x`-prefixed hex string (case-insensitive).
pub type Hex = String;

/// Canonical `0x`-prefixed lowercase 20-byte chain address.
pub type Address = String;

/// EVM chain identifier.
pub type ChainId = u64;

/// Reward-accounting interval kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PeriodType {
    Week,
    Month,
    Quarter,
    Semester,
    Year,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Week => "WEEK",
            PeriodType::Month => "MONTH",
            PeriodType::Quarter => "QUARTER",
            PeriodType::Semester => "SEMESTER",
            PeriodType::Year => "YEAR",
        }
    }
}

/// A reward period with its durable identifier, as resolved by the hosting
/// application's reward-computation collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardPeriod {
    pub id: u64,
    pub period_type: PeriodType,
    /// Period start, seconds since epoch (inclusive).
    pub start_date_in_seconds: u64,
    /// Period end, seconds since epoch (exclusive).
    pub end_date_in_seconds: u64,
}

/// Already-computed reward activity numbers for one period, supplied by the
/// hosting application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetrics {
    pub users_count: u64,
    pub participants_count: u64,
    pub recipients_count: u64,
    pub achievements_count: u64,
    /// Total reward distributed over the period, in token display units.
    pub hub_reward_amount: f64,
    pub reward_token_address: Address,
    pub reward_token_network_id: ChainId,
    /// Reward transaction hashes; duplicates and mixed case tolerated here,
    /// canonicalized by the report builder.
    pub transactions: Vec<String>,
}

/// Local lifecycle status of a period's report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    None,
    Sending,
    Sent,
    PendingReward,
    Rewarded,
    Rejected,
    ErrorSending,
    Invalid,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::None => "NONE",
            ReportStatus::Sending => "SENDING",
            ReportStatus::Sent => "SENT",
            ReportStatus::PendingReward => "PENDING_REWARD",
            ReportStatus::Rewarded => "REWARDED",
            ReportStatus::Rejected => "REJECTED",
            ReportStatus::ErrorSending => "ERROR_SENDING",
            ReportStatus::Invalid => "INVALID",
        }
    }

    /// Whether a new send attempt is permitted from this status.
    ///
    /// `Invalid` additionally requires that no remote report id is known;
    /// callers pass that knowledge in.
    pub fn can_send(&self, has_remote_report_id: bool) -> bool {
        match self {
            ReportStatus::None | ReportStatus::ErrorSending => true,
            ReportStatus::Invalid => !has_remote_report_id,
            _ => false,
        }
    }

    /// Whether the remote copy can be re-fetched: only once a remote report
    /// id exists, i.e. `Sent` and beyond.
    pub fn can_refresh(&self) -> bool {
        matches!(
            self,
            ReportStatus::Sent
                | ReportStatus::PendingReward
                | ReportStatus::Rewarded
                | ReportStatus::Rejected
        )
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report view returned by the WoM service, payload fields plus the values
/// the network computes (reward amounts, engagement score, moderation state).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteReport {
    pub report_id: u64,
    pub hub_address: Address,
    pub deed_id: u64,
    /// Period start, seconds since epoch.
    pub from_date: u64,
    /// Period end, seconds since epoch.
    pub to_date: u64,
    /// Submission instant, milliseconds since epoch.
    pub sent_date: Option<u64>,
    pub period_type: Option<String>,
    pub users_count: u64,
    pub participants_count: u64,
    pub recipients_count: u64,
    pub achievements_count: u64,
    pub reward_token_address: Address,
    pub reward_token_network_id: ChainId,
    pub hub_reward_amount: f64,
    pub status: Option<String>,
    /// Error token recorded by the WoM service, when rejected server-side.
    pub error: Option<String>,
    pub uem_reward_amount: f64,
    pub engagement_score: f64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Merged local + remote view of one period's report, as exposed to the
/// hosting application.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalReportView {
    pub period_id: u64,
    /// Network-assigned report id; 0 when never sent.
    pub report_id: u64,
    pub status: ReportStatus,
    /// Error token of the last failed attempt, when status is `ErrorSending`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub can_send: bool,
    pub can_refresh: bool,
    /// Submission instant, milliseconds since epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_date: Option<u64>,
    /// Freshly recomputed payload; absent when metrics are not available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<ReportPayload>,
    /// Remote copy, populated by refresh/send only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteReport>,
}
