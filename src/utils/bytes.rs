//! Hex/byte-string helpers shared by the signing and chain layers.

use crate::error::{Error, Result};

/// Encode bytes as lowercase `0x`-prefixed hex.
pub fn hex_prefixed(b: &[u8]) -> String {
    let mut s = String::with_capacity(2 + b.len() * 2);
    s.push_str("0x");
    s.push_str(&hex::encode(b));
    s
}

/// Strip an optional `0x`/`0X` prefix.
pub fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
}

/// Decode a hex string, `0x` prefix optional.
pub fn hex_to_vec(s: &str) -> Result<Vec<u8>> {
    Ok(hex::decode(strip_hex_prefix(s))?)
}

/// Parse an EVM hex quantity (`"0x1a"`) into u64.
pub fn parse_quantity(s: &str) -> Result<u64> {
    let raw = strip_hex_prefix(s);
    u64::from_str_radix(raw, 16)
        .map_err(|e| Error::RpcResponse(format!("bad hex quantity {s:?}: {e}")))
}

/// Parse an EVM hex quantity into an arbitrary-size integer.
pub fn parse_quantity_big(s: &str) -> Result<num_bigint::BigUint> {
    let raw = strip_hex_prefix(s);
    num_bigint::BigUint::parse_bytes(raw.as_bytes(), 16)
        .ok_or_else(|| Error::RpcResponse(format!("bad hex quantity {s:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_roundtrip() {
        assert_eq!(hex_prefixed(&[0xde, 0xad, 0xbe, 0xef]), "0xdeadbeef");
        assert_eq!(hex_to_vec("0xdeadbeef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(hex_to_vec("deadbeef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn quantities() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x1a").unwrap(), 26);
        assert_eq!(parse_quantity_big("0xff").unwrap(), num_bigint::BigUint::from(255u8));
        assert!(parse_quantity("0xzz").is_err());
    }
}
