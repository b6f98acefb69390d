//! Speech-synthesis client library for the narrator workspace
//!
//! Provides a unified interface over speech models that turn a text chunk,
//! a voice reference and a language into WAV bytes:
//! - Coqui TTS server (HTTP)
//! - Coqui `tts` CLI (subprocess)
//! - Mock model (tests)

pub mod config;
pub mod error;
pub mod model;
pub mod providers;

pub use config::{ModelBackend, ModelConfig};
pub use error::{Result, SynthesisError};
pub use model::{SpeechModel, SpeechRequest};
pub use providers::{CoquiCliModel, CoquiServerModel, MockModel, create_model};
