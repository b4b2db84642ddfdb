//! ABI encoding for the UEM reporting contract and ReportSent log decoding.
//!
//! The contract exposes one function:
//!
//! ```text
//! addReport((address,uint256,uint256,uint256,uint256,uint256,address,uint256,uint256,uint256), address, uint256)
//! //          hub     users   recip.  partic. achiev. amount  token   tokenNet from     to      hub      deedId
//! ```
//!
//! Every field is static, so the struct tuple encodes inline: the call data
//! is the 4-byte selector followed by twelve 32-byte words. It emits
//! `ReportSent(address indexed hub, uint256 indexed reportId)` on success.

use num_bigint::BigUint;

use crate::address;
use crate::chain::rpc::RpcLog;
use crate::error::{Error, Result};
use crate::report::payload::ReportPayload;
use crate::types::Address;
use crate::utils::bytes::{hex_to_vec, strip_hex_prefix};
use crate::utils::hash::keccak256;

/// Canonical text signature of the reporting function.
pub const ADD_REPORT_SIGNATURE: &str =
    "addReport((address,uint256,uint256,uint256,uint256,uint256,address,uint256,uint256,uint256),address,uint256)";

/// Canonical text signature of the emitted event.
pub const REPORT_SENT_SIGNATURE: &str = "ReportSent(address,uint256)";

/// Decoded `ReportSent` log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSentEvent {
    pub hub: Address,
    pub report_id: u64,
}

/// 4-byte selector of `addReport`.
pub fn add_report_selector() -> [u8; 4] {
    let digest = keccak256(ADD_REPORT_SIGNATURE.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

/// topic0 of `ReportSent`.
pub fn report_sent_topic() -> [u8; 32] {
    keccak256(REPORT_SENT_SIGNATURE.as_bytes())
}

/// Encode the full `addReport` call data for a payload.
///
/// `decimals` scales the display-unit reward amount into token base units.
pub fn encode_add_report(payload: &ReportPayload, decimals: u32) -> Result<Vec<u8>> {
    let amount = decimal_to_base_units(payload.hub_reward_amount, decimals)?;

    let mut data = Vec::with_capacity(4 + 12 * 32);
    data.extend_from_slice(&add_report_selector());
    // struct tuple, inline (all members static)
    data.extend_from_slice(&word_from_address(&payload.hub_address)?);
    data.extend_from_slice(&word_from_u64(payload.users_count));
    data.extend_from_slice(&word_from_u64(payload.recipients_count));
    data.extend_from_slice(&word_from_u64(payload.participants_count));
    data.extend_from_slice(&word_from_u64(payload.achievements_count));
    data.extend_from_slice(&word_from_uint(&amount)?);
    data.extend_from_slice(&word_from_address(&payload.reward_token_address)?);
    data.extend_from_slice(&word_from_u64(payload.reward_token_network_id));
    data.extend_from_slice(&word_from_u64(payload.from_date));
    data.extend_from_slice(&word_from_u64(payload.to_date));
    // trailing args
    data.extend_from_slice(&word_from_address(&payload.hub_address)?);
    data.extend_from_slice(&word_from_u64(payload.deed_id));
    Ok(data)
}

/// Find the first `ReportSent` log emitted by `contract` in a receipt's logs.
pub fn extract_report_sent(logs: &[RpcLog], contract: &str) -> Result<Option<ReportSentEvent>> {
    let topic0 = format!("0x{}", hex::encode(report_sent_topic()));
    for log in logs {
        if !address::eq_ignore_case(&log.address, contract) {
            continue;
        }
        let Some(first) = log.topics.first() else { continue };
        if !first.eq_ignore_ascii_case(&topic0) {
            continue;
        }
        if log.topics.len() < 3 {
            return Err(Error::RpcResponse(format!(
                "ReportSent log carries {} topics, want 3",
                log.topics.len()
            )));
        }
        let hub = address_from_topic(&log.topics[1])?;
        let report_id = u64_from_topic(&log.topics[2])?;
        return Ok(Some(ReportSentEvent { hub, report_id }));
    }
    Ok(None)
}

/// Scale a display-unit decimal amount into token base units, exactly.
///
/// Goes through the decimal text form of the number, so `52.3365` with 18
/// decimals becomes `52336500000000000000` with no float rounding. Fractional
/// digits beyond the token precision are dropped.
pub fn decimal_to_base_units(amount: f64, decimals: u32) -> Result<BigUint> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::Validation(format!("amount must be non-negative and finite: {amount}")));
    }
    let text = format!("{amount}");
    if text.contains(['e', 'E']) {
        // Fall back to expanded fixed-point formatting for extreme magnitudes.
        let expanded = format!("{amount:.prec$}", prec = decimals as usize);
        return decimal_text_to_base_units(&expanded, decimals);
    }
    decimal_text_to_base_units(&text, decimals)
}

fn decimal_text_to_base_units(text: &str, decimals: u32) -> Result<BigUint> {
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, f),
        None => (text, ""),
    };
    let mut digits = String::with_capacity(int_part.len() + decimals as usize);
    digits.push_str(int_part);
    let take = (decimals as usize).min(frac_part.len());
    digits.push_str(&frac_part[..take]);
    for _ in take..decimals as usize {
        digits.push('0');
    }
    BigUint::parse_bytes(digits.as_bytes(), 10)
        .ok_or_else(|| Error::Validation(format!("unparseable decimal amount: {text:?}")))
}

// ------------------------------ word packing ----------------------------------

fn word_from_address(addr: &str) -> Result<[u8; 32]> {
    let bytes = address::to_fixed_bytes(addr)?;
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(&bytes);
    Ok(word)
}

fn word_from_u64(v: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&v.to_be_bytes());
    word
}

fn word_from_uint(v: &BigUint) -> Result<[u8; 32]> {
    let bytes = v.to_bytes_be();
    if bytes.len() > 32 {
        return Err(Error::Validation("amount exceeds uint256".into()));
    }
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(word)
}

fn address_from_topic(topic: &str) -> Result<Address> {
    let raw = hex_to_vec(topic)?;
    if raw.len() != 32 {
        return Err(Error::RpcResponse(format!("topic is {} bytes, want 32", raw.len())));
    }
    Ok(crate::utils::bytes::hex_prefixed(&raw[12..]))
}

fn u64_from_topic(topic: &str) -> Result<u64> {
    let raw = strip_hex_prefix(topic);
    let big = BigUint::parse_bytes(raw.as_bytes(), 16)
        .ok_or_else(|| Error::RpcResponse(format!("bad topic quantity {topic:?}")))?;
    let bytes = big.to_bytes_be();
    if bytes.len() > 8 {
        return Err(Error::RpcResponse("report id exceeds u64".into()));
    }
    let mut out = [0u8; 8];
    out[8 - bytes.len()..].copy_from_slice(&bytes);
    Ok(u64::from_be_bytes(out))
}

// ----------------------------------- Tests ------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::payload::build_report;
    use crate::types::{PeriodType, ReportMetrics, RewardPeriod};

    fn sample_payload() -> ReportPayload {
        let period = RewardPeriod {
            id: 1,
            period_type: PeriodType::Week,
            start_date_in_seconds: 1_704_067_200,
            end_date_in_seconds: 1_704_672_000,
        };
        let metrics = ReportMetrics {
            users_count: 125,
            participants_count: 85,
            recipients_count: 65,
            achievements_count: 55_698,
            hub_reward_amount: 52.3365,
            reward_token_address: "0x334d85047da64738c065d36e10b2adeb965000d0".into(),
            reward_token_network_id: 137,
            transactions: vec![],
        };
        build_report(&period, &metrics, "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf", 3, 0)
            .unwrap()
    }

    #[test]
    fn call_data_layout() {
        let data = encode_add_report(&sample_payload(), 18).unwrap();
        assert_eq!(data.len(), 4 + 12 * 32);
        assert_eq!(&data[..4], &add_report_selector());
        // word 0: hub address, left-padded
        assert_eq!(&data[4..16], &[0u8; 12]);
        assert_eq!(
            hex::encode(&data[16..36]),
            "7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
        // word 1: users count
        let users = &data[4 + 32..4 + 64];
        assert_eq!(users[31], 125);
        // word 11 (last): deed id
        let deed = &data[4 + 11 * 32..];
        assert_eq!(deed[31], 3);
    }

    #[test]
    fn amount_scaling_is_exact() {
        assert_eq!(
            decimal_to_base_units(52.3365, 18).unwrap().to_string(),
            "52336500000000000000"
        );
        assert_eq!(decimal_to_base_units(0.0, 18).unwrap(), BigUint::default());
        assert_eq!(decimal_to_base_units(1.0, 6).unwrap().to_string(), "1000000");
        // fractional dust beyond the token precision is dropped
        assert_eq!(decimal_to_base_units(0.1234567, 6).unwrap().to_string(), "123456");
        assert!(decimal_to_base_units(f64::NAN, 18).is_err());
        assert!(decimal_to_base_units(-1.0, 18).is_err());
    }

    #[test]
    fn report_sent_log_extraction() {
        let contract = "0x00000000000000000000000000000000000000aa";
        let topic0 = format!("0x{}", hex::encode(report_sent_topic()));
        let hub_topic =
            "0x0000000000000000000000007e5f4552091a69125d5dfcb7b8c2659029395bdf".to_string();
        let id_topic =
            "0x000000000000000000000000000000000000000000000000000000000000002a".to_string();
        let logs = vec![
            // unrelated log from another contract
            RpcLog { address: "0x00000000000000000000000000000000000000bb".into(), topics: vec![topic0.clone()], data: "0x".into() },
            RpcLog {
                address: contract.into(),
                topics: vec![topic0, hub_topic, id_topic],
                data: "0x".into(),
            },
        ];
        let ev = extract_report_sent(&logs, contract).unwrap().unwrap();
        assert_eq!(ev.report_id, 42);
        assert_eq!(ev.hub, "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf");
    }

    #[test]
    fn missing_report_sent_log_is_none() {
        let contract = "0x00000000000000000000000000000000000000aa";
        assert!(extract_report_sent(&[], contract).unwrap().is_none());
    }
}
