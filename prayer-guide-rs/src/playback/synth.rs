//! Remote speech synthesis: `POST {text}` → `{audioContent: base64}`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::SpeechConfig;
use crate::error::SynthesisError;

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` into encoded audio bytes.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesisReply {
    audio_content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BackendError {
    error: Option<String>,
    message: Option<String>,
}

pub struct HttpSynthesizer {
    url: String,
    client: Client,
}

impl HttpSynthesizer {
    pub fn new(config: &SpeechConfig) -> Result<Self, SynthesisError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            url: config.url.clone(),
            client,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError> {
        let t_start = Instant::now();
        let resp = self
            .client
            .post(&self.url)
            .json(&json!({ "text": text }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body: BackendError = resp.json().await.unwrap_or_default();
            let message = body
                .error
                .or(body.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());
            warn!("Speech backend returned {status}: {message}");
            return Err(SynthesisError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        let reply: SynthesisReply = resp.json().await?;
        let encoded = reply
            .audio_content
            .filter(|c| !c.is_empty())
            .ok_or(SynthesisError::MissingAudio)?;
        let audio = STANDARD.decode(encoded)?;

        debug!(
            "Synthesized {} chars into {} bytes ({:.0}ms)",
            text.len(),
            audio.len(),
            t_start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(audio)
    }
}
