//! Text processing for narration: cleaning, sentence splitting, token
//! estimation and chunking.

pub mod chunker;
mod cleaner;
mod sentences;
mod tokens;

pub use chunker::chunk;
pub use cleaner::normalize_paragraphs;
pub use sentences::{PunctuationSplitter, SeamsSplitter};
pub use tokens::{HfTokenCounter, WordTokenCounter};

use thiserror::Error;

/// One sentence as produced by a [`SentenceSplitter`]. Never split further.
pub type Sentence = String;

/// A bounded run of sentences synthesized as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position in the document's chunk sequence; the resumability key
    pub index: usize,
    /// Sentences joined by single spaces
    pub text: String,
    /// Length of `text` in characters
    pub char_length: usize,
    /// Sum of the per-sentence token estimates
    pub estimated_token_count: usize,
}

impl Chunk {
    /// Create a new chunk.
    pub fn new(index: usize, text: String, estimated_token_count: usize) -> Self {
        let char_length = text.chars().count();
        Self {
            index,
            text,
            char_length,
            estimated_token_count,
        }
    }

    /// Whether the chunk breaks either bound (only possible for a lone sentence).
    pub fn exceeds(&self, max_chars: usize, max_tokens: usize) -> bool {
        self.char_length > max_chars || self.estimated_token_count > max_tokens
    }
}

#[derive(Error, Debug)]
pub enum TextError {
    #[error("Sentence tokenizer found no sentences in the text")]
    NoSentenceBoundaries,

    #[error("Chunk bounds must be positive (max_chars={max_chars}, max_tokens={max_tokens})")]
    InvalidBounds { max_chars: usize, max_tokens: usize },

    #[error("Sentence splitting failed: {0}")]
    Splitter(String),

    #[error("Token counting failed: {0}")]
    Tokenizer(String),
}

/// Splits a text body into ordered sentences.
pub trait SentenceSplitter: Send + Sync {
    fn split(&self, text: &str) -> Result<Vec<Sentence>, TextError>;
}

/// Split `text` into trimmed, non-empty sentences in reading order.
pub fn split_sentences(
    splitter: &dyn SentenceSplitter,
    text: &str,
) -> Result<Vec<Sentence>, TextError> {
    Ok(splitter
        .split(text)?
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Estimates how many model tokens a piece of text costs.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> Result<usize, TextError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_creation() {
        let chunk = Chunk::new(3, "Merhaba dünya.".to_string(), 4);
        assert_eq!(chunk.index, 3);
        assert_eq!(chunk.char_length, 14);
        assert_eq!(chunk.estimated_token_count, 4);
        assert!(!chunk.exceeds(14, 4));
        assert!(chunk.exceeds(13, 4));
        assert!(chunk.exceeds(14, 3));
    }

    struct Verbatim(Vec<&'static str>);

    impl SentenceSplitter for Verbatim {
        fn split(&self, _text: &str) -> Result<Vec<Sentence>, TextError> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    #[test]
    fn test_split_sentences_drops_blank_output() {
        let splitter = Verbatim(vec!["  Bir. ", "", "   ", "İki."]);
        assert_eq!(split_sentences(&splitter, "ignored").unwrap(), vec!["Bir.", "İki."]);
    }
}
