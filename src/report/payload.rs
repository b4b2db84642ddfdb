//! Report payload construction and canonical serialization.
//!
//! The payload is what gets signed, so its byte form must be stable:
//! - field order is fixed (struct declaration order, preserved by serde),
//! - a schema version tag is embedded so signatures stay verifiable if the
//!   layout ever evolves,
//! - addresses and transaction hashes are lowercased, transactions are
//!   de-duplicated and ordered by value (`BTreeSet`),
//! - instants are plain integers (epoch seconds for period bounds, epoch
//!   milliseconds for the sent hint), never locale- or zone-dependent text.
//!
//! Building is a pure function: no I/O, no clocks.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::address;
use crate::error::{Error, Result};
use crate::types::{Address, ChainId, PeriodType, ReportMetrics, RewardPeriod};

/// Version tag embedded in every canonical payload.
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Immutable reward-activity report for one period.
///
/// Field order is the canonical serialization order; do not reorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    pub schema_version: u32,
    pub hub_address: Address,
    pub deed_id: u64,
    /// Period start, seconds since epoch.
    pub from_date: u64,
    /// Period end, seconds since epoch.
    pub to_date: u64,
    /// Submission instant hint, milliseconds since epoch.
    pub sent_date: u64,
    pub period_type: PeriodType,
    pub users_count: u64,
    pub participants_count: u64,
    pub recipients_count: u64,
    pub achievements_count: u64,
    pub reward_token_address: Address,
    pub reward_token_network_id: ChainId,
    /// Total reward over the period, token display units.
    pub hub_reward_amount: f64,
    /// Reward transaction hashes, lowercased, ordered by value.
    pub transactions: BTreeSet<String>,
}

impl ReportPayload {
    /// Canonical bytes of this payload; what gets signed and what a verifier
    /// must rebuild byte-for-byte.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Assemble a validated payload from period boundaries, computed metrics and
/// hub identity.
///
/// `sent_at_hint_millis` comes from the lifecycle store so retries of the
/// same period keep their original submission instant.
pub fn build_report(
    period: &RewardPeriod,
    metrics: &ReportMetrics,
    hub_address: &str,
    deed_id: u64,
    sent_at_hint_millis: u64,
) -> Result<ReportPayload> {
    if period.start_date_in_seconds > period.end_date_in_seconds {
        return Err(Error::InvalidPeriod(format!(
            "start {} is after end {}",
            period.start_date_in_seconds, period.end_date_in_seconds
        )));
    }
    if !metrics.hub_reward_amount.is_finite() || metrics.hub_reward_amount < 0.0 {
        return Err(Error::Validation(format!(
            "reward amount must be a non-negative finite number, got {}",
            metrics.hub_reward_amount
        )));
    }

    let hub_address = address::canonicalize(hub_address)?;
    let reward_token_address = address::canonicalize(&metrics.reward_token_address)?;

    let mut transactions = BTreeSet::new();
    for tx in &metrics.transactions {
        let raw = crate::utils::bytes::strip_hex_prefix(tx);
        if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::Validation(format!("malformed reward transaction hash: {tx:?}")));
        }
        transactions.insert(format!("0x{}", raw.to_lowercase()));
    }

    Ok(ReportPayload {
        schema_version: REPORT_SCHEMA_VERSION,
        hub_address,
        deed_id,
        from_date: period.start_date_in_seconds,
        to_date: period.end_date_in_seconds,
        sent_date: sent_at_hint_millis,
        period_type: period.period_type,
        users_count: metrics.users_count,
        participants_count: metrics.participants_count,
        recipients_count: metrics.recipients_count,
        achievements_count: metrics.achievements_count,
        reward_token_address,
        reward_token_network_id: metrics.reward_token_network_id,
        hub_reward_amount: metrics.hub_reward_amount,
        transactions,
    })
}
