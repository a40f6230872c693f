//! Error types for the prayer guide service.
//!
//! Nothing here is process-fatal: every variant maps to a logged,
//! user-visible outcome at the call site.

use thiserror::Error;

/// Failures of the local key–value store.
#[derive(Debug, Error)]
pub enum LocalStoreError {
    #[error("local store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("local store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Failures of a single speech-synthesis request.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("speech request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Backend TTS error: {status} - {message}")]
    Backend { status: u16, message: String },
    #[error("No audio content received.")]
    MissingAudio,
    #[error("invalid audio content: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// Failures of the local audio elements.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio output unavailable")]
    Unavailable,
    #[error("could not decode audio: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum WakeLockError {
    #[error("wake lock not supported on this platform")]
    Unsupported,
    #[error("could not acquire wake lock: {0}")]
    Acquire(String),
}

/// Failures of the session document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("document store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Reasons a save operation is refused or fails. A failed save never
/// performs a partial write.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Please log in to save your prayer.")]
    NotSignedIn,
    #[error("Cannot save an empty prayer.")]
    NothingToSave,
    #[error("Failed to save prayer: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ScriptureError {
    #[error("scripture lookup is not configured")]
    NotConfigured,
    #[error("scripture request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Error fetching scripture: {status}{detail}")]
    Api { status: u16, detail: String },
    #[error("Scripture passage not found.")]
    NotFound,
    #[error("invalid passage clean-up pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Error)]
pub enum PromptLoadError {
    #[error("could not read prompt file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not fetch prompt source: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP error! status: {0}")]
    Status(u16),
    #[error("prompt data is invalid: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Prayer data is empty or could not be loaded.")]
    Empty,
}

/// Failures applying new settings. Settings that were persisted stay
/// persisted even when the prompt reload fails.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not save settings: {0}")]
    Store(#[from] LocalStoreError),
    #[error("{0}")]
    Prompts(#[from] PromptLoadError),
}
