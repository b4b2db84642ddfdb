//! End-to-end signing path: custody-created wallet → canonical payload bytes
//! → personal-message signature → sealed envelope → verification and signer
//! recovery.

use std::sync::Arc;

use wom_hub::store::MemorySettingsStore;
use wom_hub::types::{PeriodType, ReportMetrics, RewardPeriod};
use wom_hub::wallet::signer;
use wom_hub::{build_report, ReportPayload, VerifiableEnvelope, WalletCustody};

const HUB_ADDRESS: &str = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf";

fn custody_with_known_key() -> WalletCustody<MemorySettingsStore> {
    let custody = WalletCustody::new(Arc::new(MemorySettingsStore::default()));
    let mut seed = [0u8; 32];
    seed[31] = 1;
    let addr = custody.get_or_create_address("pw", Some(&seed)).unwrap();
    assert_eq!(addr, HUB_ADDRESS);
    custody
}

fn sample_payload() -> ReportPayload {
    let period = RewardPeriod {
        id: 11,
        period_type: PeriodType::Week,
        start_date_in_seconds: 1_704_067_200, // 2024-01-01
        end_date_in_seconds: 1_704_672_000,   // 2024-01-08
    };
    let metrics = ReportMetrics {
        users_count: 125,
        participants_count: 85,
        recipients_count: 65,
        achievements_count: 55_698,
        hub_reward_amount: 52.3365,
        reward_token_address: "0x334D85047dA64738c065d36E10B2AdEb965000d0".into(),
        reward_token_network_id: 137,
        transactions: vec![
            "0x00000000000000000000000000000000000000000000000000000000000000B2".into(),
            "0x00000000000000000000000000000000000000000000000000000000000000a1".into(),
        ],
    };
    build_report(&period, &metrics, HUB_ADDRESS, 3, 1_704_672_060_000).unwrap()
}

#[test]
fn canonical_bytes_are_reproducible_across_builds() {
    let a = sample_payload().canonical_bytes().unwrap();
    let b = sample_payload().canonical_bytes().unwrap();
    assert_eq!(a, b);
}

#[test]
fn full_sign_seal_verify_recover_cycle() {
    let custody = custody_with_known_key();
    let wallet = custody.load_key_pair("pw").unwrap();
    let payload = sample_payload();

    let message = payload.canonical_bytes().unwrap();
    let signature = wallet.sign_message(&message).unwrap();
    let envelope = VerifiableEnvelope::seal(payload, &signature).unwrap();

    // Integrity: the stamped hash re-derives.
    assert!(envelope.is_valid());
    // Authenticity: the signature recovers the hub that built the payload.
    assert_eq!(envelope.signer_address().unwrap(), envelope.payload.hub_address);
    // Determinism: a second pass yields the identical signature and hash.
    let signature2 = wallet.sign_message(&envelope.payload.canonical_bytes().unwrap()).unwrap();
    assert_eq!(signature, signature2);
}

#[test]
fn recovery_detects_payload_substitution() {
    let custody = custody_with_known_key();
    let wallet = custody.load_key_pair("pw").unwrap();
    let payload = sample_payload();
    let signature = wallet.sign_message(&payload.canonical_bytes().unwrap()).unwrap();

    // An attacker swaps the payload but keeps the signature: the hash check
    // still passes (it binds to the signature), but signer recovery over the
    // new canonical bytes no longer yields the claimed hub.
    let mut forged = payload.clone();
    forged.hub_reward_amount = 9_999.0;
    let envelope = VerifiableEnvelope::seal(forged, &signature).unwrap();
    assert!(envelope.is_valid());
    match envelope.signer_address() {
        Ok(addr) => assert_ne!(addr, envelope.payload.hub_address),
        Err(_) => {} // recovery may also fail outright; equally a rejection
    }
}

#[test]
fn envelope_wire_form_flattens_payload() {
    let custody = custody_with_known_key();
    let wallet = custody.load_key_pair("pw").unwrap();
    let payload = sample_payload();
    let signature = wallet.sign_message(&payload.canonical_bytes().unwrap()).unwrap();
    let envelope = VerifiableEnvelope::seal(payload, &signature).unwrap().with_report_id(42);

    let wire: serde_json::Value = serde_json::to_value(&envelope).unwrap();
    assert!(wire.get("hash").is_some());
    assert!(wire.get("signature").is_some());
    assert_eq!(wire["reportId"], serde_json::json!(42));
    // payload fields sit at the top level, not nested
    assert_eq!(wire["usersCount"], serde_json::json!(125));
    assert_eq!(wire["hubAddress"], serde_json::json!(HUB_ADDRESS));
    assert!(wire.get("payload").is_none());
}

#[test]
fn personal_signature_matches_wire_layout() {
    let custody = custody_with_known_key();
    let wallet = custody.load_key_pair("pw").unwrap();
    let sig = wallet.sign_message(b"layout probe").unwrap();

    // 0x + r(32) + s(32) + v(1), lowercase hex
    assert_eq!(sig.len(), 2 + 130);
    assert!(sig.starts_with("0x"));
    assert_eq!(sig.to_lowercase(), sig);
    let recovered = signer::recover_address(&sig, b"layout probe").unwrap();
    assert_eq!(recovered, HUB_ADDRESS);
}
