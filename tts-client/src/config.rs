use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, SynthesisError};

/// Default Coqui multilingual voice-cloning model (XTTS v2)
pub const DEFAULT_MODEL_NAME: &str = "tts_models/multilingual/multi-dataset/xtts_v2";

/// Default address of a locally running `tts-server`
pub const DEFAULT_BASE_URL: &str = "http://localhost:5002";

/// Default per-call timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Supported model backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelBackend {
    CoquiServer,
    CoquiCli,
}

impl ModelBackend {
    /// Parse backend kind from string
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "coqui-server" | "coqui_server" | "server" => Ok(Self::CoquiServer),
            "coqui-cli" | "coqui_cli" | "cli" => Ok(Self::CoquiCli),
            _ => Err(SynthesisError::Config(format!("Unknown model backend: {}", s))),
        }
    }
}

/// Speech model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_backend")]
    pub backend: ModelBackend,

    /// Base URL of the TTS server (coqui-server)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path to the `tts` binary (coqui-cli); looked up in PATH when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cli_path: Option<PathBuf>,

    /// Model identifier passed to the CLI
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Upper bound for a single synthesis call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Number of model instances, which bounds how many documents are
    /// narrated in parallel
    #[serde(default = "default_instances")]
    pub instances: usize,
}

fn default_backend() -> ModelBackend {
    ModelBackend::CoquiServer
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model_name() -> String {
    DEFAULT_MODEL_NAME.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_instances() -> usize {
    1
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            base_url: default_base_url(),
            cli_path: None,
            model_name: default_model_name(),
            timeout_secs: default_timeout_secs(),
            instances: default_instances(),
        }
    }
}
