//! narrator configuration management.

use crate::pipeline::PipelineContext;
use crate::progress::ProgressStore;
use crate::text::chunker::{DEFAULT_MAX_CHARS, DEFAULT_MAX_TOKENS};
use crate::text::{
    HfTokenCounter, PunctuationSplitter, SeamsSplitter, SentenceSplitter, TextError, TokenCounter,
    WordTokenCounter,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tts_client::ModelConfig;

const DEFAULT_LANGUAGE: &str = "tr";

/// Sentence detector used before chunking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SplitterKind {
    /// Dialog-aware detector from the `seams` crate
    #[default]
    Seams,
    /// Split on terminal punctuation followed by whitespace
    Punctuation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarratorConfig {
    /// Default voice reference audio path for cloning
    #[serde(default)]
    pub voice_ref: Option<PathBuf>,

    /// Language code passed to the model
    #[serde(default = "default_language")]
    pub language: String,

    /// Character budget per chunk
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Token budget per chunk
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default)]
    pub sentence_splitter: SplitterKind,

    /// HuggingFace tokenizer.json used for token estimates. None counts words
    /// and punctuation instead.
    #[serde(default)]
    pub tokenizer_path: Option<PathBuf>,

    /// Root for progress logs and segments. None means the platform data dir.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub model: ModelConfig,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_max_chars() -> usize {
    DEFAULT_MAX_CHARS
}

fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            voice_ref: None,
            language: default_language(),
            max_chars: default_max_chars(),
            max_tokens: default_max_tokens(),
            sentence_splitter: SplitterKind::default(),
            tokenizer_path: None,
            data_dir: None,
            model: ModelConfig::default(),
        }
    }
}

impl NarratorConfig {
    /// Get the config file path: ~/.config/cli-programs/narrator.toml
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("cli-programs").join("narrator.toml"))
    }

    /// Load config from file, returning default if file doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: NarratorConfig =
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Base directory for working state.
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_local_dir()
                .or_else(dirs::home_dir)
                .map(|d| d.join("narrator"))
                .context("Could not determine data directory"),
        }
    }

    pub fn progress_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("progress"))
    }

    pub fn segments_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("segments"))
    }

    pub fn build_splitter(&self) -> Result<Arc<dyn SentenceSplitter>, TextError> {
        Ok(match self.sentence_splitter {
            SplitterKind::Seams => Arc::new(SeamsSplitter::new()?),
            SplitterKind::Punctuation => Arc::new(PunctuationSplitter),
        })
    }

    pub fn build_counter(&self) -> Result<Arc<dyn TokenCounter>, TextError> {
        Ok(match &self.tokenizer_path {
            Some(path) => Arc::new(HfTokenCounter::from_file(path)?),
            None => Arc::new(WordTokenCounter),
        })
    }

    /// Wire the configured collaborators into a pipeline context.
    pub fn pipeline_context(&self) -> Result<PipelineContext> {
        Ok(PipelineContext {
            splitter: self.build_splitter().context("Failed to set up sentence splitter")?,
            counter: self.build_counter().context("Failed to load tokenizer")?,
            progress: ProgressStore::new(self.progress_dir()?),
            segments_root: self.segments_dir()?,
            max_chars: self.max_chars,
            max_tokens: self.max_tokens,
        })
    }
}
