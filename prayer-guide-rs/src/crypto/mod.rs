//! Client-side encryption of reflections.
//!
//! - `key_manager`: one persisted AES-256-GCM key per profile
//! - `cipher`: envelope encryption and placeholder-on-failure decryption

pub mod cipher;
pub mod key_manager;
