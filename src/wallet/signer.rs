//! Ethereum `personal_sign`-compatible message signing.
//!
//! Signature layout is the standard 65-byte `r(32) || s(32) || v(1)` packing,
//! `v = 27 + recovery id`, hex-encoded with `0x`. The digest is
//! `keccak256("\x19Ethereum Signed Message:\n" + len(message) + message)`.
//! ECDSA is deterministic (RFC 6979 via k256), so signing the same message
//! with the same key always yields the same bytes.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};

use crate::address;
use crate::error::{Error, Result};
use crate::types::Address;
use crate::utils::bytes::{hex_prefixed, hex_to_vec};
use crate::utils::hash::keccak256;

/// Fixed ASCII prefix of the personal-message scheme.
pub const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Digest of `message` under the personal-message scheme.
pub fn personal_digest(message: &[u8]) -> [u8; 32] {
    let mut prefixed =
        Vec::with_capacity(PERSONAL_MESSAGE_PREFIX.len() + 20 + message.len());
    prefixed.extend_from_slice(PERSONAL_MESSAGE_PREFIX.as_bytes());
    prefixed.extend_from_slice(message.len().to_string().as_bytes());
    prefixed.extend_from_slice(message);
    keccak256(&prefixed)
}

/// Sign `message` with the personal-message scheme; returns the packed
/// 65-byte signature as `0x`-hex.
pub fn sign_personal(key: &SigningKey, message: &[u8]) -> Result<String> {
    let digest = personal_digest(message);
    let (signature, recovery_id) = sign_digest_recoverable(key, &digest)?;
    let mut packed = [0u8; 65];
    packed[..64].copy_from_slice(&signature.to_bytes());
    packed[64] = 27 + recovery_id.to_byte();
    Ok(hex_prefixed(&packed))
}

/// Recoverable ECDSA over a 32-byte prehash. Shared with the transaction
/// encoder, which signs typed-transaction digests instead of personal ones.
pub fn sign_digest_recoverable(
    key: &SigningKey,
    digest: &[u8; 32],
) -> Result<(Signature, RecoveryId)> {
    key.sign_prehash_recoverable(digest)
        .map_err(|e| Error::Signer(format!("ecdsa signing failed: {e}")))
}

/// Recover the signer address from a packed personal-message signature and
/// the original message bytes.
pub fn recover_address(signature_hex: &str, message: &[u8]) -> Result<Address> {
    let raw = hex_to_vec(signature_hex)?;
    if raw.len() != 65 {
        return Err(Error::Signer(format!("signature must be 65 bytes, got {}", raw.len())));
    }
    let signature = Signature::from_slice(&raw[..64])
        .map_err(|e| Error::Signer(format!("malformed signature: {e}")))?;
    let v = raw[64];
    let recovery_byte = if v >= 27 { v - 27 } else { v };
    let recovery_id = RecoveryId::from_byte(recovery_byte)
        .ok_or_else(|| Error::Signer(format!("invalid recovery byte {v}")))?;

    let digest = personal_digest(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)
        .map_err(|e| Error::Signer(format!("address recovery failed: {e}")))?;
    Ok(address::from_public_key(&key))
}
