//! Configuration management for prayer-guide-rs.
//!
//! Loads config from YAML files in standard locations. Every section has
//! defaults, so a missing or partial file is never an error.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8767/synthesize-speech".into(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScriptureConfig {
    pub url: String,
    /// Provider API token. Empty disables lookups.
    pub token: String,
    pub context_verses_before: u32,
    pub context_verses_after: u32,
}

impl Default for ScriptureConfig {
    fn default() -> Self {
        Self {
            url: "https://api.esv.org/v3/passage/html/".into(),
            token: String::new(),
            context_verses_before: 1,
            context_verses_after: 1,
        }
    }
}

/// Prompt data sources, one per prayer mode. Each is a file path or an
/// http(s) URL pointing at a JSON array of prompt records.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptSourcesConfig {
    pub method_for_prayer: String,
    pub lords_prayer: String,
}

impl Default for PromptSourcesConfig {
    fn default() -> Self {
        Self {
            method_for_prayer: "data/method_for_prayer.json".into(),
            lords_prayer: "data/lords_prayer.json".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub bell_sound: String,
    pub poll_interval_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            bell_sound: "sounds/bell.mp3".into(),
            poll_interval_ms: 50,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for preferences, the encryption key and saved sessions.
    /// Empty means the platform data dir.
    pub data_dir: String,
}

impl StorageConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        if self.data_dir.is_empty() {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("prayer-guide")
        } else {
            PathBuf::from(&self.data_dir)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { port: 8768 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    pub notifications: bool,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            notifications: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Signed-in user. Saving and recall require one.
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub speech: SpeechConfig,
    pub scripture: ScriptureConfig,
    pub prompts: PromptSourcesConfig,
    pub audio: AudioConfig,
    pub storage: StorageConfig,
    pub api: ApiConfig,
    pub feedback: FeedbackConfig,
    pub user: UserConfig,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./config.yaml
    /// 2. ~/.config/prayer-guide/config.yaml
    /// 3. /etc/prayer-guide/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("config.yaml")),
                dirs::home_dir().map(|h| h.join(".config/prayer-guide/config.yaml")),
                Some(PathBuf::from("/etc/prayer-guide/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }

    fn parse(contents: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_sections() {
        let config = Config::parse(
            "speech:\n  url: http://tts.local/speak\napi:\n  port: 9000\nuser:\n  id: alice\n",
        )
        .unwrap();
        assert_eq!(config.speech.url, "http://tts.local/speak");
        assert_eq!(config.speech.timeout_secs, 30);
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.user.id.as_deref(), Some("alice"));
        assert_eq!(config.scripture.context_verses_before, 1);
        assert!(config.scripture.token.is_empty());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("nope.yaml")));
        assert_eq!(config.api.port, 8768);
        assert!(config.user.id.is_none());
    }

    #[test]
    fn explicit_data_dir_is_used_verbatim() {
        let storage = StorageConfig {
            data_dir: "/tmp/prayers".into(),
        };
        assert_eq!(storage.resolved_dir(), PathBuf::from("/tmp/prayers"));
    }
}
