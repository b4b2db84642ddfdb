//! Keccak-256 helpers.

use sha3::{Digest, Keccak256};

/// Keccak-256 of `data` as a 32-byte array.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut h = Keccak256::new();
    h.update(data);
    h.finalize().into()
}

/// Keccak-256 of `data` as a lowercase `0x`-prefixed hex string.
pub fn keccak256_hex(data: &[u8]) -> String {
    crate::utils::bytes::hex_prefixed(&keccak256(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak_empty_input() {
        // Well-known Keccak-256 of the empty string.
        assert_eq!(
            keccak256_hex(b""),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn keccak_known_vector() {
        // keccak256("hello") — standard vector used across EVM tooling.
        assert_eq!(
            keccak256_hex(b"hello"),
            "0x1c8aff950685c2ed4bc3174f3472287b56d9517b9c948127319a09a7a36deac8"
        );
    }
}
