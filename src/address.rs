//! Chain address helpers.
//!
//! Addresses are carried as lowercase `0x`-prefixed 20-byte hex strings.
//! Canonicalization happens at the boundaries (report builder, wallet
//! creation); everything downstream may assume the canonical form.

use k256::ecdsa::VerifyingKey;

use crate::error::{Error, Result};
use crate::types::Address;
use crate::utils::bytes::{hex_prefixed, strip_hex_prefix};
use crate::utils::hash::keccak256;

/// Hex digits of a 20-byte address, prefix excluded.
pub const ADDRESS_HEX_LEN: usize = 40;

/// Whether `s` is a well-formed `0x` 20-byte hex address (any case).
pub fn is_valid(s: &str) -> bool {
    let raw = strip_hex_prefix(s);
    raw.len() == ADDRESS_HEX_LEN && raw.chars().all(|c| c.is_ascii_hexdigit())
}

/// Prepend `0x` when missing; no validation.
pub fn ensure_prefixed(s: &str) -> String {
    if s.starts_with("0x") || s.starts_with("0X") {
        s.to_string()
    } else {
        format!("0x{s}")
    }
}

/// Validate and normalize to the canonical lowercase `0x` form.
pub fn canonicalize(s: &str) -> Result<Address> {
    if !is_valid(s) {
        return Err(Error::Address(format!("not a 20-byte hex address: {s:?}")));
    }
    Ok(format!("0x{}", strip_hex_prefix(s).to_lowercase()))
}

/// Decode a canonical address into its fixed 20-byte form.
pub fn to_fixed_bytes(s: &str) -> Result<[u8; 20]> {
    if !is_valid(s) {
        return Err(Error::Address(format!("not a 20-byte hex address: {s:?}")));
    }
    let v = hex::decode(strip_hex_prefix(s))?;
    let mut out = [0u8; 20];
    out.copy_from_slice(&v);
    Ok(out)
}

/// Derive the address of a secp256k1 public key: last 20 bytes of
/// keccak256(uncompressed point without the 0x04 tag).
pub fn from_public_key(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let digest = keccak256(&point.as_bytes()[1..]);
    hex_prefixed(&digest[12..])
}

/// Case-insensitive address equality; `0x` prefixes optional on both sides.
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    strip_hex_prefix(a).eq_ignore_ascii_case(strip_hex_prefix(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;

    #[test]
    fn validation_and_canonical_form() {
        let mixed = "0xAbCd000000000000000000000000000000000001";
        assert!(is_valid(mixed));
        assert_eq!(canonicalize(mixed).unwrap(), "0xabcd000000000000000000000000000000000001");
        assert!(canonicalize("0x1234").is_err());
        assert!(canonicalize("not-an-address").is_err());
    }

    #[test]
    fn prefix_is_added_once() {
        assert_eq!(ensure_prefixed("abcd"), "0xabcd");
        assert_eq!(ensure_prefixed("0xabcd"), "0xabcd");
    }

    #[test]
    fn derives_known_address_for_private_key_one() {
        // secp256k1 private key 0x...01 maps to this address in every EVM
        // client; pins the keccak-over-uncompressed-point derivation.
        let mut sk = [0u8; 32];
        sk[31] = 1;
        let key = SigningKey::from_slice(&sk).unwrap();
        assert_eq!(
            from_public_key(key.verifying_key()),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn case_insensitive_equality() {
        assert!(eq_ignore_case(
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf",
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        ));
        assert!(!eq_ignore_case("0x01", "0x02"));
    }
}
