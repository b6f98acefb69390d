//! Sentence packing under a character budget and a token budget.

use super::{Chunk, Sentence, TextError, TokenCounter};

/// Default character budget per chunk.
pub const DEFAULT_MAX_CHARS: usize = 200;

/// Default token budget per chunk.
pub const DEFAULT_MAX_TOKENS: usize = 300;

/// Pack sentences greedily into chunks.
///
/// A sentence joins the current chunk only if both the projected character
/// length (counting the space that follows every sentence) stays within
/// `max_chars` and the running token sum stays within `max_tokens`. Tokens
/// are counted once per sentence and summed. A sentence that alone exceeds a
/// bound becomes a chunk of its own and is never split.
///
/// # Returns
/// Chunks indexed from 0, or `NoSentenceBoundaries` if there are no
/// sentences to pack.
pub fn chunk(
    sentences: &[Sentence],
    max_chars: usize,
    max_tokens: usize,
    counter: &dyn TokenCounter,
) -> Result<Vec<Chunk>, TextError> {
    if max_chars == 0 || max_tokens == 0 {
        return Err(TextError::InvalidBounds {
            max_chars,
            max_tokens,
        });
    }
    if sentences.is_empty() {
        return Err(TextError::NoSentenceBoundaries);
    }

    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_chars = 0;
    let mut buffer_tokens = 0;

    for sentence in sentences {
        let sentence_chars = sentence.chars().count();
        let sentence_tokens = counter.count(sentence)?;

        let fits = buffer_chars + sentence_chars + 1 <= max_chars
            && buffer_tokens + sentence_tokens <= max_tokens;

        if !fits && !buffer.is_empty() {
            flush(&mut chunks, &mut buffer, buffer_tokens, max_chars, max_tokens);
            buffer_chars = 0;
            buffer_tokens = 0;
        }

        buffer.push_str(sentence);
        buffer.push(' ');
        buffer_chars += sentence_chars + 1;
        buffer_tokens += sentence_tokens;
    }

    if !buffer.is_empty() {
        flush(&mut chunks, &mut buffer, buffer_tokens, max_chars, max_tokens);
    }

    Ok(chunks)
}

fn flush(
    chunks: &mut Vec<Chunk>,
    buffer: &mut String,
    tokens: usize,
    max_chars: usize,
    max_tokens: usize,
) {
    let chunk = Chunk::new(chunks.len(), buffer.trim_end().to_string(), tokens);
    if chunk.exceeds(max_chars, max_tokens) {
        log::warn!(
            "chunk {} holds a single oversized sentence ({} chars, {} tokens; limits {}/{})",
            chunk.index,
            chunk.char_length,
            chunk.estimated_token_count,
            max_chars,
            max_tokens
        );
    }
    chunks.push(chunk);
    buffer.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::WordTokenCounter;
    use proptest::prelude::*;

    /// One token per character, for predictable token limits.
    struct CharCounter;

    impl TokenCounter for CharCounter {
        fn count(&self, text: &str) -> Result<usize, TextError> {
            Ok(text.chars().count())
        }
    }

    fn sentences(items: &[&str]) -> Vec<Sentence> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_each_alone_under_tight_budget() {
        let chunks = chunk(&sentences(&["A.", "B.", "C."]), 5, 300, &WordTokenCounter).unwrap();
        assert_eq!(texts(&chunks), vec!["A.", "B.", "C."]);
        assert_eq!(
            chunks.iter().map(|c| c.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_all_together_under_loose_budget() {
        let chunks = chunk(&sentences(&["A.", "B.", "C."]), 100, 300, &WordTokenCounter).unwrap();
        assert_eq!(texts(&chunks), vec!["A. B. C."]);
        assert_eq!(chunks[0].char_length, 8);
        assert_eq!(chunks[0].estimated_token_count, 6);
    }

    #[test]
    fn test_empty_sentences_fail_closed() {
        let result = chunk(&[], 200, 300, &WordTokenCounter);
        assert!(matches!(result, Err(TextError::NoSentenceBoundaries)));
    }

    #[test]
    fn test_zero_bounds_rejected() {
        let input = sentences(&["A."]);
        assert!(matches!(
            chunk(&input, 0, 10, &WordTokenCounter),
            Err(TextError::InvalidBounds { .. })
        ));
        assert!(matches!(
            chunk(&input, 10, 0, &WordTokenCounter),
            Err(TextError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn test_token_budget_closes_chunk() {
        // Plenty of characters, but only 5 tokens per chunk.
        let input = sentences(&["one two.", "three four.", "five."]);
        let chunks = chunk(&input, 1000, 5, &WordTokenCounter).unwrap();
        assert_eq!(texts(&chunks), vec!["one two.", "three four. five."]);
        assert!(chunks.iter().all(|c| c.estimated_token_count <= 5));
    }

    #[test]
    fn test_oversized_sentence_stands_alone() {
        let long = "x".repeat(50);
        let input = vec!["Short.".to_string(), long.clone(), "Tail.".to_string()];
        let chunks = chunk(&input, 20, 300, &CharCounter).unwrap();
        assert_eq!(texts(&chunks), vec!["Short.", long.as_str(), "Tail."]);
        assert!(chunks[1].exceeds(20, 300));
        assert_eq!(chunks[1].char_length, 50);
    }

    #[test]
    fn test_oversized_first_sentence() {
        let input = sentences(&["This sentence is far too long.", "Ok."]);
        let chunks = chunk(&input, 10, 300, &CharCounter).unwrap();
        assert_eq!(texts(&chunks), vec!["This sentence is far too long.", "Ok."]);
    }

    #[test]
    fn test_char_length_counts_characters_not_bytes() {
        let input = sentences(&["Çok güzel.", "Öyle mi?"]);
        let chunks = chunk(&input, 20, 300, &WordTokenCounter).unwrap();
        assert_eq!(texts(&chunks), vec!["Çok güzel. Öyle mi?"]);
        assert_eq!(chunks[0].char_length, 19);
    }

    #[test]
    fn test_counter_error_propagates() {
        struct Broken;
        impl TokenCounter for Broken {
            fn count(&self, _text: &str) -> Result<usize, TextError> {
                Err(TextError::Tokenizer("vocab missing".into()))
            }
        }
        let result = chunk(&sentences(&["A."]), 10, 10, &Broken);
        assert!(matches!(result, Err(TextError::Tokenizer(_))));
    }

    fn sentence_strategy() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-zA-Z]{1,8}( [a-zA-Z]{1,8}){0,6}[.!?]", 1..40)
    }

    proptest! {
        #[test]
        fn prop_deterministic(
            input in sentence_strategy(),
            max_chars in 1usize..120,
            max_tokens in 1usize..40,
        ) {
            let first = chunk(&input, max_chars, max_tokens, &WordTokenCounter).unwrap();
            let second = chunk(&input, max_chars, max_tokens, &WordTokenCounter).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_bounds_respected_or_single_sentence(
            input in sentence_strategy(),
            max_chars in 1usize..120,
            max_tokens in 1usize..40,
        ) {
            let chunks = chunk(&input, max_chars, max_tokens, &WordTokenCounter).unwrap();
            for c in &chunks {
                if c.exceeds(max_chars, max_tokens) {
                    prop_assert!(
                        input.contains(&c.text),
                        "oversized chunk is not a lone sentence: {:?}",
                        c.text
                    );
                }
            }
        }

        #[test]
        fn prop_sentences_preserved_in_order(
            input in sentence_strategy(),
            max_chars in 1usize..120,
            max_tokens in 1usize..40,
        ) {
            let chunks = chunk(&input, max_chars, max_tokens, &WordTokenCounter).unwrap();
            let rejoined: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
            prop_assert_eq!(rejoined.join(" "), input.join(" "));
            for (i, c) in chunks.iter().enumerate() {
                prop_assert_eq!(c.index, i);
            }
        }
    }
}
