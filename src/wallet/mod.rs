//! Wallet module: hub key custody, keystore encryption and message signing.
//!
//! The hub owns exactly one secp256k1 key pair. Its address is the only
//! plaintext identifier that leaves this module; the secret key is persisted
//! solely as an encrypted keystore blob inside the settings substrate and is
//! decrypted on demand for signing.

use std::sync::{Arc, Mutex};

use k256::ecdsa::SigningKey;
use zeroize::Zeroizing;

use crate::address;
use crate::error::{Error, Result};
use crate::store::SettingsStore;
use crate::types::Address;

pub mod keystore;
pub mod signer;

/// Settings namespace shared with the lifecycle store.
const WOM_CONTEXT: &str = "WoM";
const IDENTITY_SCOPE: &str = "HubIdentity";
const KEY_ADDRESS: &str = "hubAddress";
const KEY_WALLET: &str = "hubWallet";

/// In-memory hub key pair, decrypted for the duration of one operation.
#[derive(Clone)]
pub struct HubWallet {
    signing_key: SigningKey,
    address: Address,
}

impl std::fmt::Debug for HubWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose key material, not even in debug output.
        f.debug_struct("HubWallet").field("address", &self.address).finish()
    }
}

impl HubWallet {
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = address::from_public_key(signing_key.verifying_key());
        Self { signing_key, address }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Personal-message signature over arbitrary bytes.
    pub fn sign_message(&self, message: &[u8]) -> Result<String> {
        signer::sign_personal(&self.signing_key, message)
    }
}

/// Manages the hub key pair: idempotent get-or-create, encrypted persistence,
/// decryption on demand.
pub struct WalletCustody<S> {
    store: Arc<S>,
    // get_or_create is a read-then-write; serialize it so two concurrent
    // callers cannot create two distinct wallets for the same hub.
    create_lock: Mutex<()>,
}

impl<S: SettingsStore> WalletCustody<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store, create_lock: Mutex::new(()) }
    }

    /// Stored hub address, if a wallet exists.
    pub fn address(&self) -> Option<Address> {
        self.store
            .get(WOM_CONTEXT, IDENTITY_SCOPE, KEY_ADDRESS)
            .filter(|a| !a.is_empty())
            .map(|a| address::ensure_prefixed(&a))
    }

    /// Return the existing hub address, or create the wallet first.
    ///
    /// `seed_key` optionally supplies the secret key bytes to adopt (the
    /// platform admin key on first initialization); otherwise a fresh key is
    /// generated. Safe to call concurrently.
    pub fn get_or_create_address(
        &self,
        passphrase: &str,
        seed_key: Option<&[u8]>,
    ) -> Result<Address> {
        let _guard = self
            .create_lock
            .lock()
            .map_err(|_| Error::WalletUnavailable("wallet creation lock poisoned".into()))?;
        if let Some(existing) = self.address() {
            return Ok(existing);
        }

        let signing_key = match seed_key {
            Some(bytes) => SigningKey::from_slice(bytes)
                .map_err(|e| Error::WalletUnavailable(format!("invalid seed key: {e}")))?,
            None => SigningKey::random(&mut rand::thread_rng()),
        };
        let wallet = HubWallet::from_signing_key(signing_key);

        let secret = Zeroizing::new(wallet.signing_key.to_bytes().to_vec());
        let blob = keystore::seal_secret(&secret, passphrase)?;
        self.store.set(WOM_CONTEXT, IDENTITY_SCOPE, KEY_WALLET, &blob);
        self.store.set(WOM_CONTEXT, IDENTITY_SCOPE, KEY_ADDRESS, wallet.address());
        Ok(wallet.address().to_string())
    }

    /// Decrypt the stored keystore blob into a usable key pair.
    pub fn load_key_pair(&self, passphrase: &str) -> Result<HubWallet> {
        let blob = self
            .store
            .get(WOM_CONTEXT, IDENTITY_SCOPE, KEY_WALLET)
            .ok_or_else(|| Error::WalletUnavailable("no hub wallet stored".into()))?;
        let secret = keystore::open_secret(&blob, passphrase)
            .map_err(|e| Error::WalletUnavailable(e.to_string()))?;
        let signing_key = SigningKey::from_slice(&secret)
            .map_err(|e| Error::WalletUnavailable(format!("stored key invalid: {e}")))?;
        Ok(HubWallet::from_signing_key(signing_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySettingsStore;

    fn custody() -> WalletCustody<MemorySettingsStore> {
        WalletCustody::new(Arc::new(MemorySettingsStore::default()))
    }

    #[test]
    fn creates_once_then_returns_same_address() {
        let custody = custody();
        let first = custody.get_or_create_address("pw", None).unwrap();
        let second = custody.get_or_create_address("pw", None).unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("0x"));
        assert_eq!(first.len(), 42);
    }

    #[test]
    fn adopts_supplied_seed_key() {
        let custody = custody();
        let mut seed = [0u8; 32];
        seed[31] = 1;
        let addr = custody.get_or_create_address("pw", Some(&seed)).unwrap();
        assert_eq!(addr, "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf");
    }

    #[test]
    fn load_key_pair_roundtrip() {
        let custody = custody();
        let addr = custody.get_or_create_address("pw", None).unwrap();
        let wallet = custody.load_key_pair("pw").unwrap();
        assert!(crate::address::eq_ignore_case(wallet.address(), &addr));
    }

    #[test]
    fn load_with_wrong_passphrase_is_wallet_unavailable() {
        let custody = custody();
        custody.get_or_create_address("pw", None).unwrap();
        assert!(matches!(custody.load_key_pair("nope"), Err(Error::WalletUnavailable(_))));
    }

    #[test]
    fn load_without_wallet_is_wallet_unavailable() {
        assert!(matches!(custody().load_key_pair("pw"), Err(Error::WalletUnavailable(_))));
    }

    #[test]
    fn concurrent_creation_yields_one_wallet() {
        let custody = Arc::new(custody());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let c = Arc::clone(&custody);
            handles.push(std::thread::spawn(move || c.get_or_create_address("pw", None).unwrap()));
        }
        let addresses: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(addresses.windows(2).all(|w| w[0] == w[1]));
    }
}
