//! Reflection encryption with AES-256-GCM.
//!
//! Every call draws a fresh 12-byte IV, stored next to the ciphertext in an
//! [`EncryptedEnvelope`]. Decryption never fails outward: anything that
//! goes wrong resolves to a placeholder string for display.

use std::sync::Arc;

use aes_gcm::aead::Aead;
use aes_gcm::Nonce;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::key_manager::{EncryptionKey, KeyManager};

pub const IV_LEN: usize = 12;

pub const KEY_MISSING_PLACEHOLDER: &str = "[Decryption key missing or invalid]";
pub const UNDECRYPTABLE_PLACEHOLDER: &str = "[Encrypted reflection - unable to decrypt]";

/// One encrypted reflection: base64 ciphertext (with GCM tag) and base64 IV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub ciphertext: String,
    pub iv: String,
}

pub struct ReflectionCipher {
    keys: Arc<KeyManager>,
}

impl ReflectionCipher {
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self { keys }
    }

    /// Encrypt `plaintext`. `None` means the reflection must not be stored.
    pub fn encrypt(&self, plaintext: &str) -> Option<EncryptedEnvelope> {
        let Some(key) = self.keys.get_key() else {
            warn!("Encryption key is not available. Cannot encrypt reflection.");
            return None;
        };

        let mut iv = [0u8; IV_LEN];
        if let Err(e) = OsRng.try_fill_bytes(&mut iv) {
            error!("Could not generate IV: {e}");
            return None;
        }

        match key
            .cipher()
            .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
        {
            Ok(ciphertext) => Some(EncryptedEnvelope {
                ciphertext: STANDARD.encode(ciphertext),
                iv: STANDARD.encode(iv),
            }),
            Err(e) => {
                error!("Encryption failed: {e}");
                None
            }
        }
    }

    /// Decrypt an envelope's fields, or return a placeholder on any failure.
    pub fn decrypt(&self, ciphertext_b64: &str, iv_b64: &str) -> String {
        let Some(key) = self.keys.get_key() else {
            error!("Decryption key not available.");
            return KEY_MISSING_PLACEHOLDER.to_string();
        };

        match Self::open(&key, ciphertext_b64, iv_b64) {
            Ok(plaintext) => plaintext,
            Err(reason) => {
                error!("Decryption failed: {reason}");
                UNDECRYPTABLE_PLACEHOLDER.to_string()
            }
        }
    }

    pub fn decrypt_envelope(&self, envelope: &EncryptedEnvelope) -> String {
        self.decrypt(&envelope.ciphertext, &envelope.iv)
    }

    fn open(
        key: &EncryptionKey,
        ciphertext_b64: &str,
        iv_b64: &str,
    ) -> Result<String, String> {
        let ciphertext = STANDARD
            .decode(ciphertext_b64)
            .map_err(|e| format!("ciphertext is not base64: {e}"))?;
        let iv = STANDARD
            .decode(iv_b64)
            .map_err(|e| format!("IV is not base64: {e}"))?;
        if iv.len() != IV_LEN {
            return Err(format!("IV is {} bytes, expected {IV_LEN}", iv.len()));
        }

        let plaintext = key
            .cipher()
            .decrypt(Nonce::from_slice(&iv), ciphertext.as_slice())
            .map_err(|_| "authentication failed".to_string())?;
        String::from_utf8(plaintext).map_err(|e| format!("plaintext is not UTF-8: {e}"))
    }
}
