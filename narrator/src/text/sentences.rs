//! Sentence splitting.

use super::{Sentence, SentenceSplitter, TextError};
use seams::sentence_detector::dialog_detector::SentenceDetectorDialog;

/// Dialog-aware sentence splitting backed by the seams detector.
pub struct SeamsSplitter {
    detector: SentenceDetectorDialog,
}

impl SeamsSplitter {
    pub fn new() -> Result<Self, TextError> {
        let detector = SentenceDetectorDialog::new()
            .map_err(|e| {
                TextError::Splitter(format!("seams detector failed to initialize: {:?}", e))
            })?;
        Ok(Self { detector })
    }
}

impl SentenceSplitter for SeamsSplitter {
    fn split(&self, text: &str) -> Result<Vec<Sentence>, TextError> {
        let sentences = self
            .detector
            .detect_sentences_borrowed(text)
            .map_err(|e| TextError::Splitter(format!("{:?}", e)))?;

        Ok(sentences
            .iter()
            .map(|s| s.normalize())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    }
}

/// Characters that end a sentence.
const TERMINATORS: &[char] = &['.', '!', '?', '\u{2026}'];

/// Characters that may trail a terminator and still belong to the sentence.
const CLOSERS: &[char] = &['"', '\'', ')', ']', '\u{201d}', '\u{2019}', '\u{00bb}'];

/// Rule-based splitter: a sentence ends after a run of terminators (plus any
/// closing quotes) followed by whitespace, or at a line break.
#[derive(Debug, Default, Clone, Copy)]
pub struct PunctuationSplitter;

impl SentenceSplitter for PunctuationSplitter {
    fn split(&self, text: &str) -> Result<Vec<Sentence>, TextError> {
        let mut sentences = Vec::new();
        let mut current = String::new();
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '\n' {
                push_sentence(&mut sentences, &mut current);
                continue;
            }
            current.push(c);

            if TERMINATORS.contains(&c) {
                while let Some(&next) = chars.peek() {
                    if TERMINATORS.contains(&next) || CLOSERS.contains(&next) {
                        current.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if chars.peek().is_none_or(|next| next.is_whitespace()) {
                    push_sentence(&mut sentences, &mut current);
                }
            }
        }
        push_sentence(&mut sentences, &mut current);

        Ok(sentences)
    }
}

fn push_sentence(sentences: &mut Vec<Sentence>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    current.clear();
}
