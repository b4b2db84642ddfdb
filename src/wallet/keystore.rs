//! Passphrase-protected keystore blob.
//!
//! The hub's secp256k1 secret key is persisted only inside this envelope:
//! - PBKDF2-HMAC-SHA3-256 → 32-byte key (random 16-byte salt, 120k rounds),
//! - AES-256-GCM with a random 96-bit nonce,
//! - self-describing JSON envelope, base64 fields, **no plaintext secrets**.
//!
//! The blob is an opaque string handed to the settings substrate; this module
//! does not touch disk. Wrong passphrases fail the AEAD open.
//!
//! Envelope schema:
//! ```jsonc
//! {
//!   "version": 1,
//!   "kdf": { "name": "PBKDF2-SHA3-256", "salt": "<b64>", "iterations": 120000 },
//!   "aead": { "name": "AES-256-GCM", "nonce": "<b64>" },
//!   "createdAt": "2024-01-08T12:34:56Z",
//!   "ciphertext": "<b64>"
//! }
//! ```

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use chrono::{SecondsFormat, Utc};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha3::Sha3_256;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

const KDF_NAME: &str = "PBKDF2-SHA3-256";
const AEAD_NAME: &str = "AES-256-GCM";
const VERSION: u32 = 1;
const KDF_ITERATIONS: u32 = 120_000;

#[derive(Debug, Serialize, Deserialize)]
struct KdfParams {
    name: String,
    salt: String,
    iterations: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct AeadParams {
    name: String,
    nonce: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeystoreEnvelope {
    version: u32,
    kdf: KdfParams,
    aead: AeadParams,
    created_at: String,
    ciphertext: String,
}

/// Encrypt `secret` under `passphrase` into a JSON envelope string.
pub fn seal_secret(secret: &[u8], passphrase: &str) -> Result<String> {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let mut nonce = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut nonce);

    let key = derive_key(passphrase, &salt, KDF_ITERATIONS);
    let cipher = Aes256Gcm::new_from_slice(key.as_ref())
        .map_err(|_| Error::Keystore("bad derived key length".into()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), secret)
        .map_err(|_| Error::Keystore("aead seal failed".into()))?;

    let env = KeystoreEnvelope {
        version: VERSION,
        kdf: KdfParams {
            name: KDF_NAME.to_string(),
            salt: B64.encode(salt),
            iterations: KDF_ITERATIONS,
        },
        aead: AeadParams { name: AEAD_NAME.to_string(), nonce: B64.encode(nonce) },
        created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        ciphertext: B64.encode(&ciphertext),
    };
    serde_json::to_string(&env).map_err(|e| Error::Keystore(format!("serialize envelope: {e}")))
}

/// Decrypt an envelope string produced by [`seal_secret`].
pub fn open_secret(blob: &str, passphrase: &str) -> Result<Zeroizing<Vec<u8>>> {
    let env: KeystoreEnvelope =
        serde_json::from_str(blob).map_err(|e| Error::Keystore(format!("parse envelope: {e}")))?;
    if env.version != VERSION {
        return Err(Error::Keystore(format!("unsupported keystore version {}", env.version)));
    }
    if env.kdf.name != KDF_NAME || env.aead.name != AEAD_NAME {
        return Err(Error::Keystore("unsupported kdf/aead".into()));
    }

    let salt = B64
        .decode(env.kdf.salt.as_bytes())
        .map_err(|e| Error::Keystore(format!("salt b64: {e}")))?;
    let nonce = B64
        .decode(env.aead.nonce.as_bytes())
        .map_err(|e| Error::Keystore(format!("nonce b64: {e}")))?;
    let ciphertext = B64
        .decode(env.ciphertext.as_bytes())
        .map_err(|e| Error::Keystore(format!("ciphertext b64: {e}")))?;
    if salt.len() < 8 || nonce.len() != 12 {
        return Err(Error::Keystore("malformed salt or nonce".into()));
    }

    let key = derive_key(passphrase, &salt, env.kdf.iterations);
    let cipher = Aes256Gcm::new_from_slice(key.as_ref())
        .map_err(|_| Error::Keystore("bad derived key length".into()))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
        .map_err(|_| Error::Keystore("aead open failed (wrong passphrase?)".into()))?;
    Ok(Zeroizing::new(plaintext))
}

fn derive_key(passphrase: &str, salt: &[u8], iterations: u32) -> Zeroizing<[u8; 32]> {
    let mut out = Zeroizing::new([0u8; 32]);
    pbkdf2_hmac::<Sha3_256>(passphrase.as_bytes(), salt, iterations, out.as_mut());
    out
}
