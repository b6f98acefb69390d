use crate::progress::ProgressError;
use crate::text::TextError;
use std::path::PathBuf;
use thiserror::Error;
use tts_client::SynthesisError;

/// Why a document could not be narrated.
///
/// Completed progress is kept on disk for every variant, so rerunning the
/// same document resumes where it stopped.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No sentence boundaries found; nothing to narrate")]
    NoSentenceBoundaries,

    #[error("Text processing failed: {0}")]
    Text(TextError),

    #[error("Failed to extract text from {}: {message}", path.display())]
    Extraction { path: PathBuf, message: String },

    #[error("Synthesis failed at chunk {index}: {source}")]
    Synthesis {
        index: usize,
        #[source]
        source: SynthesisError,
    },

    #[error("Failed to store segment for chunk {index}: {message}")]
    SegmentWrite { index: usize, message: String },

    #[error("Segment for chunk {index} is missing or corrupt ({}): {message}", path.display())]
    SegmentRead {
        index: usize,
        path: PathBuf,
        message: String,
    },

    #[error("Segment for chunk {index} does not match the audio format of earlier segments: {message}")]
    FormatMismatch { index: usize, message: String },

    #[error("Merge failed: {0}")]
    Merge(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Document {0} appears more than once in the batch")]
    DuplicateDocument(String),

    #[error("No model instances available")]
    NoModelInstances,

    #[error("Pipeline task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Progress(#[from] ProgressError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TextError> for PipelineError {
    fn from(err: TextError) -> Self {
        match err {
            TextError::NoSentenceBoundaries => PipelineError::NoSentenceBoundaries,
            other => PipelineError::Text(other),
        }
    }
}

/// Failure while removing a finished document's working files. Logged only.
#[derive(Error, Debug)]
pub enum CleanupError {
    #[error("Failed to remove segments at {}: {source}", path.display())]
    Segments {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to clear progress: {0}")]
    Progress(#[from] ProgressError),
}
