//! Owns the single AES-256-GCM key used for reflections.
//!
//! The key lives in the local store as an exported JWK (`kty: "oct"`).
//! It is generated on first use and read back on every later call, so a
//! cleared store is noticed immediately. A stored key that cannot be
//! imported is discarded and replaced; reflections encrypted under it are
//! unrecoverable from then on.

use std::fmt;
use std::sync::Arc;

use aes_gcm::{Aes256Gcm, Key, KeyInit};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::local_store::LocalStore;
use crate::notifier::Notifier;

pub const ENCRYPTION_KEY_NAME: &str = "encryption_key_v1";

const KEY_LEN: usize = 32;
const JWK_ALG: &str = "A256GCM";

const KEY_CREATED_NOTICE: &str = "Your unique encryption key is stored on this device. \
If you clear the application data, this key will be lost and previously saved \
reflections can NOT be decrypted. Reflections stay unreadable to anyone with \
access to the cloud storage.";

/// Raw key material. Debug output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    pub(crate) fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }

    fn export(&self) -> ExportedKey {
        ExportedKey {
            kty: "oct".into(),
            k: URL_SAFE_NO_PAD.encode(self.0),
            alg: JWK_ALG.into(),
            ext: true,
            key_ops: vec!["encrypt".into(), "decrypt".into()],
        }
    }

    fn import(raw: &str) -> Result<Self, String> {
        let jwk: ExportedKey =
            serde_json::from_str(raw).map_err(|e| format!("key is not valid JSON: {e}"))?;
        if jwk.kty != "oct" {
            return Err(format!("unexpected key type '{}'", jwk.kty));
        }
        if jwk.alg != JWK_ALG {
            return Err(format!("unexpected key algorithm '{}'", jwk.alg));
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(jwk.k.trim_end_matches('='))
            .map_err(|e| format!("key material is not base64url: {e}"))?;
        let bytes: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| format!("key is {} bytes, expected {KEY_LEN}", b.len()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// JSON Web Key form of a symmetric key.
#[derive(Debug, Serialize, Deserialize)]
struct ExportedKey {
    kty: String,
    k: String,
    alg: String,
    ext: bool,
    key_ops: Vec<String>,
}

pub struct KeyManager {
    store: Arc<LocalStore>,
    notifier: Arc<Notifier>,
}

impl KeyManager {
    pub fn new(store: Arc<LocalStore>, notifier: Arc<Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Return the reflection key, creating and persisting one if needed.
    ///
    /// `None` means encryption is unavailable: either the OS random source
    /// failed or a new key could not be persisted. Callers must refuse to
    /// encrypt rather than fall back to plaintext.
    pub fn get_key(&self) -> Option<EncryptionKey> {
        let Some(raw) = self.store.get(ENCRYPTION_KEY_NAME) else {
            info!("No encryption key found, generating a new one.");
            return self.generate_and_store();
        };

        match EncryptionKey::import(&raw) {
            Ok(key) => Some(key),
            Err(reason) => {
                error!("Error importing stored key: {reason}");
                self.notifier.notify(
                    "Encryption key unreadable",
                    "Previously encrypted reflections might be unreadable. A new key will be generated.",
                );
                if let Err(e) = self.store.remove(ENCRYPTION_KEY_NAME) {
                    warn!("Failed to discard corrupted key: {e}");
                }
                self.generate_and_store()
            }
        }
    }

    fn generate_and_store(&self) -> Option<EncryptionKey> {
        let mut bytes = [0u8; KEY_LEN];
        if let Err(e) = OsRng.try_fill_bytes(&mut bytes) {
            warn!("Secure random source unavailable: {e}");
            self.notifier.notify_once(
                "crypto-unavailable",
                "Encryption unavailable",
                "Reflections cannot be securely saved on this system.",
            );
            return None;
        }
        let key = EncryptionKey(bytes);

        let exported = match serde_json::to_string(&key.export()) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to export encryption key: {e}");
                return None;
            }
        };
        if let Err(e) = self.store.set(ENCRYPTION_KEY_NAME, exported) {
            error!("Error storing encryption key: {e}");
            self.notifier.notify(
                "Encryption setup failed",
                "Could not set up encryption. Reflections will not be saved.",
            );
            return None;
        }

        info!("New encryption key generated and stored.");
        self.notifier
            .notify("Your reflections will now be encrypted", KEY_CREATED_NOTICE);
        Some(key)
    }
}
