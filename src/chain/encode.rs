//! RLP and EIP-1559 (type 0x02) transaction encoding.
//!
//! Only the subset the engine needs: byte-string and list items, unsigned
//! integers as minimal big-endian bytes, and the typed-transaction envelope
//! `0x02 || rlp([chainId, nonce, maxPriorityFeePerGas, maxFeePerGas,
//! gasLimit, to, value, data, accessList])`, signed by appending
//! `yParity, r, s` and re-encoding. The access list is always empty here.

use num_bigint::BigUint;

use crate::error::Result;
use crate::utils::hash::keccak256;
use crate::wallet::signer::sign_digest_recoverable;

/// EIP-2718 type byte of a dynamic-fee transaction.
pub const EIP1559_TX_TYPE: u8 = 0x02;

/// Unsigned dynamic-fee contract call.
#[derive(Debug, Clone)]
pub struct Eip1559Tx {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: BigUint,
    pub max_fee_per_gas: BigUint,
    pub gas_limit: BigUint,
    pub to: [u8; 20],
    pub value: BigUint,
    pub data: Vec<u8>,
}

impl Eip1559Tx {
    fn payload_items(&self) -> Vec<Vec<u8>> {
        vec![
            rlp_u64(self.chain_id),
            rlp_u64(self.nonce),
            rlp_uint(&self.max_priority_fee_per_gas),
            rlp_uint(&self.max_fee_per_gas),
            rlp_uint(&self.gas_limit),
            rlp_bytes(&self.to),
            rlp_uint(&self.value),
            rlp_bytes(&self.data),
            rlp_empty_list(),
        ]
    }

    /// Digest the signature commits to: `keccak256(0x02 || rlp(payload))`.
    pub fn signing_digest(&self) -> [u8; 32] {
        let mut preimage = vec![EIP1559_TX_TYPE];
        preimage.extend_from_slice(&rlp_list(&self.payload_items()));
        keccak256(&preimage)
    }

    /// Sign and produce the raw broadcastable transaction bytes.
    pub fn sign(&self, key: &k256::ecdsa::SigningKey) -> Result<Vec<u8>> {
        let digest = self.signing_digest();
        let (signature, recovery_id) = sign_digest_recoverable(key, &digest)?;
        let sig_bytes = signature.to_bytes();

        let mut items = self.payload_items();
        items.push(rlp_u64(recovery_id.to_byte() as u64)); // yParity: 0 or 1
        items.push(rlp_uint(&BigUint::from_bytes_be(&sig_bytes[..32]))); // r
        items.push(rlp_uint(&BigUint::from_bytes_be(&sig_bytes[32..]))); // s

        let mut raw = vec![EIP1559_TX_TYPE];
        raw.extend_from_slice(&rlp_list(&items));
        Ok(raw)
    }
}

// ------------------------------- RLP core -------------------------------------

/// Encode a byte string.
pub fn rlp_bytes(b: &[u8]) -> Vec<u8> {
    if b.len() == 1 && b[0] < 0x80 {
        return vec![b[0]];
    }
    let mut out = encode_length(b.len(), 0x80);
    out.extend_from_slice(b);
    out
}

/// Encode an unsigned integer as its minimal big-endian byte string
/// (zero encodes as the empty string, `0x80`).
pub fn rlp_uint(v: &BigUint) -> Vec<u8> {
    if v == &BigUint::default() {
        return vec![0x80];
    }
    rlp_bytes(&v.to_bytes_be())
}

pub fn rlp_u64(v: u64) -> Vec<u8> {
    rlp_uint(&BigUint::from(v))
}

/// Concatenate already-encoded items into a list.
pub fn rlp_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload_len: usize = items.iter().map(Vec::len).sum();
    let mut out = encode_length(payload_len, 0xc0);
    out.reserve(payload_len);
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

fn rlp_empty_list() -> Vec<u8> {
    vec![0xc0]
}

fn encode_length(len: usize, offset: u8) -> Vec<u8> {
    if len <= 55 {
        vec![offset + len as u8]
    } else {
        let len_bytes = BigUint::from(len).to_bytes_be();
        let mut out = vec![offset + 55 + len_bytes.len() as u8];
        out.extend_from_slice(&len_bytes);
        out
    }
}

// ----------------------------------- Tests ------------------------------------
