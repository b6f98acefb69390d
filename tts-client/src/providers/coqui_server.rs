//! Coqui TTS server provider
//!
//! Talks to `tts-server` (Coqui TTS) over its `/api/tts` endpoint, which
//! answers with a complete WAV file.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::error::{Result, SynthesisError};
use crate::model::{SpeechModel, SpeechRequest};

/// Model served by a Coqui TTS HTTP server
pub struct CoquiServerModel {
    base_url: String,
    timeout: Duration,
    client: Client,
}

impl CoquiServerModel {
    /// Create a new server-backed model
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SynthesisError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/tts", self.base_url)
    }
}

#[async_trait]
impl SpeechModel for CoquiServerModel {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>> {
        if request.text.trim().is_empty() {
            return Err(SynthesisError::InvalidInput("empty text".into()));
        }

        let speaker_wav = request.voice_ref.to_string_lossy().to_string();
        let response = self
            .client
            .get(self.endpoint())
            .query(&[
                ("text", request.text.as_str()),
                ("speaker_wav", speaker_wav.as_str()),
                ("language_id", request.language.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SynthesisError::Timeout {
                        seconds: self.timeout.as_secs(),
                    }
                } else {
                    SynthesisError::Request {
                        message: format!("Request failed: {}", e),
                        status_code: None,
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(classify_status(status, message));
        }

        let bytes = response.bytes().await.map_err(|e| SynthesisError::Request {
            message: format!("Failed to read response body: {}", e),
            status_code: None,
        })?;

        if bytes.is_empty() {
            return Err(SynthesisError::InvalidOutput("server returned an empty body".into()));
        }

        Ok(bytes.to_vec())
    }

    fn name(&self) -> &'static str {
        "Coqui TTS server"
    }

    fn is_available(&self) -> Result<()> {
        if self.base_url.starts_with("http://") || self.base_url.starts_with("https://") {
            Ok(())
        } else {
            Err(SynthesisError::Config(format!(
                "TTS server URL must start with http:// or https://: {}",
                self.base_url
            )))
        }
    }
}

fn classify_status(status: StatusCode, message: String) -> SynthesisError {
    match status.as_u16() {
        400 | 422 => SynthesisError::InvalidInput(message),
        429 | 503 => SynthesisError::ResourceExhausted(message),
        _ if super::is_resource_exhaustion(&message) => SynthesisError::ResourceExhausted(message),
        code => SynthesisError::Request {
            message,
            status_code: Some(code),
        },
    }
}
