//! Signed, hash-stamped wrapper around a report payload.
//!
//! The envelope's `hash` is **keccak256 of the signature bytes**, not of the
//! payload. The WoM network indexes submitted reports by this value and
//! re-derives it the same way, so it is kept for wire compatibility. The
//! property it gives is a collision-resistant binding to the signature
//! (proof-of-signature), not content addressing of the payload. Callers who
//! need payload authenticity recover the signer with [`VerifiableEnvelope::signer_address`]
//! and compare it to the claimed hub address — `is_valid` alone only checks
//! hash integrity.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::report::payload::ReportPayload;
use crate::types::{Address, Hex};
use crate::utils::bytes::hex_to_vec;
use crate::utils::hash::keccak256_hex;
use crate::wallet::signer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiableEnvelope {
    pub hash: Hex,
    pub signature: Hex,
    /// Network-assigned report id; 0 until the chain submission succeeds.
    /// Not covered by `hash` or `signature`.
    #[serde(default)]
    pub report_id: u64,
    #[serde(flatten)]
    pub payload: ReportPayload,
}

impl VerifiableEnvelope {
    /// Stamp `payload` + `signature` with the derived hash.
    pub fn seal(payload: ReportPayload, signature: &str) -> Result<Self> {
        let hash = derive_hash(signature)?;
        Ok(Self { hash, signature: signature.to_string(), report_id: 0, payload })
    }

    pub fn with_report_id(mut self, report_id: u64) -> Self {
        self.report_id = report_id;
        self
    }

    /// Re-derive the hash from the envelope's signature.
    pub fn generate_hash(&self) -> Result<Hex> {
        derive_hash(&self.signature)
    }

    /// Hash integrity check: re-derives and compares case-insensitively.
    /// Does not verify the ECDSA signature itself.
    pub fn is_valid(&self) -> bool {
        self.generate_hash()
            .map(|h| h.eq_ignore_ascii_case(&self.hash))
            .unwrap_or(false)
    }

    /// Recover the signer address from the signature over the payload's
    /// canonical bytes. Authenticity = recovered address equals the payload's
    /// hub address.
    pub fn signer_address(&self) -> Result<Address> {
        let message = self.payload.canonical_bytes()?;
        signer::recover_address(&self.signature, &message)
    }
}

fn derive_hash(signature: &str) -> Result<Hex> {
    let sig_bytes = hex_to_vec(signature)?;
    Ok(keccak256_hex(&sig_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::payload::build_report;
    use crate::types::{PeriodType, ReportMetrics, RewardPeriod};
    use crate::wallet::signer::sign_personal;
    use k256::ecdsa::SigningKey;

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

    fn test_key() -> SigningKey {
        let mut sk = [0u8; 32];
        sk[31] = 1;
        SigningKey::from_slice(&sk).unwrap()
    }

    #[test]
    fn seal_then_verify_holds() {
        let payload = sample_payload();
        let sig = sign_personal(&test_key(), &payload.canonical_bytes().unwrap()).unwrap();
        let env = VerifiableEnvelope::seal(payload, &sig).unwrap();
        assert!(env.is_valid());
    }

    #[test]
    fn hash_comparison_is_case_insensitive() {
        let payload = sample_payload();
        let sig = sign_personal(&test_key(), &payload.canonical_bytes().unwrap()).unwrap();
        let mut env = VerifiableEnvelope::seal(payload, &sig).unwrap();
        env.hash = env.hash.to_uppercase().replace("0X", "0x");
        assert!(env.is_valid());
    }

    #[test]
    fn mutated_signature_fails_verification() {
        let payload = sample_payload();
        let sig = sign_personal(&test_key(), &payload.canonical_bytes().unwrap()).unwrap();
        let env = VerifiableEnvelope::seal(payload, &sig).unwrap();

        // Flip one nibble of the signature; hash no longer matches.
        let mut bytes: Vec<char> = env.signature.chars().collect();
        bytes[10] = if bytes[10] == '0' { '1' } else { '0' };
        let tampered = VerifiableEnvelope { signature: bytes.into_iter().collect(), ..env };
        assert!(!tampered.is_valid());
    }

    #[test]
    fn signer_address_recovers_the_hub() {
        let payload = sample_payload();
        let sig = sign_personal(&test_key(), &payload.canonical_bytes().unwrap()).unwrap();
        let env = VerifiableEnvelope::seal(payload, &sig).unwrap();
        assert_eq!(env.signer_address().unwrap(), "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf");
    }

    #[test]
    fn report_id_is_outside_the_sealed_surface() {
        let payload = sample_payload();
        let sig = sign_personal(&test_key(), &payload.canonical_bytes().unwrap()).unwrap();
        let env = VerifiableEnvelope::seal(payload, &sig).unwrap().with_report_id(42);
        assert_eq!(env.report_id, 42);
        assert!(env.is_valid());
    }
}
