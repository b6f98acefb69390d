use thiserror::Error;

/// Failure of a single synthesis call.
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("Synthesis timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model resources exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Model returned unusable audio: {0}")]
    InvalidOutput(String),

    #[error("Model not available: {0}")]
    ModelUnavailable(String),

    #[error("Request failed{}: {message}", status_code.map(|c| format!(" (HTTP {})", c)).unwrap_or_default())]
    Request {
        message: String,
        status_code: Option<u16>,
    },

    #[error("TTS command failed: {0}")]
    Command(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SynthesisError>;
