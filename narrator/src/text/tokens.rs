//! Token count estimation.

use super::{TextError, TokenCounter};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tokenizers::Tokenizer;

/// Token count from a HuggingFace `tokenizer.json` (e.g. GPT-2).
pub struct HfTokenCounter {
    tokenizer: Tokenizer,
}

impl HfTokenCounter {
    pub fn from_file(path: &Path) -> Result<Self, TextError> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| {
                TextError::Tokenizer(format!("failed to load {}: {}", path.display(), e))
            })?;
        Ok(Self { tokenizer })
    }
}

impl TokenCounter for HfTokenCounter {
    fn count(&self, text: &str) -> Result<usize, TextError> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| TextError::Tokenizer(e.to_string()))?;
        Ok(encoding.len())
    }
}

static WORD_PIECE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+|[^\w\s]").expect("word piece pattern is valid"));

/// Approximation used when no tokenizer file is configured: every word and
/// every punctuation mark counts as one token.
#[derive(Debug, Default, Clone, Copy)]
pub struct WordTokenCounter;

impl TokenCounter for WordTokenCounter {
    fn count(&self, text: &str) -> Result<usize, TextError> {
        Ok(WORD_PIECE.find_iter(text).count())
    }
}
