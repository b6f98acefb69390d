use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::Result;

/// One synthesis call: a chunk of text spoken in the cloned voice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub text: String,
    /// Reference recording of the voice to clone
    pub voice_ref: PathBuf,
    /// Language code understood by the model (e.g. "tr", "en")
    pub language: String,
}

impl SpeechRequest {
    pub fn new(
        text: impl Into<String>,
        voice_ref: impl Into<PathBuf>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            voice_ref: voice_ref.into(),
            language: language.into(),
        }
    }
}

/// Trait for speech-synthesis models
///
/// Implementations are not required to be reentrant: callers hand one
/// instance to at most one synthesis at a time.
#[async_trait]
pub trait SpeechModel: Send + Sync {
    /// Synthesize the request and return a complete WAV file as bytes
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>>;

    /// Get the model name for display
    fn name(&self) -> &'static str;

    /// Check if the model can be reached (server configured, CLI installed, etc.)
    fn is_available(&self) -> Result<()>;
}
