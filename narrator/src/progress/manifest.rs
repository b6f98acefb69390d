//! Manifest describing which chunking a stored progress log belongs to.

use crate::text::Chunk;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Chunking parameters and content hash recorded alongside the progress log.
///
/// Chunk indices only mean the same thing across runs while the text and
/// the bounds are unchanged; the fingerprint detects when they are not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Document identity the progress belongs to
    pub document_id: String,
    /// Source file the text was extracted from
    pub source: PathBuf,
    /// SHA256 over bounds and every chunk text
    pub fingerprint: String,
    /// Number of chunks in the document
    pub total_chunks: usize,
    /// Character budget used for chunking
    pub max_chars: usize,
    /// Token budget used for chunking
    pub max_tokens: usize,
    /// When progress for this chunking was first recorded
    pub created_at: DateTime<Utc>,
    /// When the manifest was last written
    pub updated_at: DateTime<Utc>,
}

impl Manifest {
    /// Create a manifest for a freshly chunked document.
    pub fn new(
        document_id: &str,
        source: PathBuf,
        chunks: &[Chunk],
        max_chars: usize,
        max_tokens: usize,
    ) -> Self {
        let now = Utc::now();
        Self {
            document_id: document_id.to_string(),
            source,
            fingerprint: fingerprint(chunks, max_chars, max_tokens),
            total_chunks: chunks.len(),
            max_chars,
            max_tokens,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether stored progress was recorded against the same chunking.
    pub fn matches(&self, other: &Manifest) -> bool {
        self.fingerprint == other.fingerprint && self.total_chunks == other.total_chunks
    }
}

/// Hash the chunk sequence together with the bounds that produced it.
pub fn fingerprint(chunks: &[Chunk], max_chars: usize, max_tokens: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("max_chars={}\nmax_tokens={}\n", max_chars, max_tokens));
    for chunk in chunks {
        hasher.update(chunk.index.to_le_bytes());
        hasher.update((chunk.text.len() as u64).to_le_bytes());
        hasher.update(chunk.text.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
