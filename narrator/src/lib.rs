//! narrator - resumable narration of long documents
//!
//! Documents are split into bounded chunks of whole sentences, each chunk is
//! synthesized into its own WAV segment, and the segments are concatenated
//! into one file per document. Completed chunks are recorded durably, so an
//! interrupted run picks up where it stopped.

pub mod audio;
pub mod batch;
pub mod config;
pub mod document;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod storage;
pub mod synth;
pub mod text;

pub use error::PipelineError;
