//! Durable per-document record of which chunks have been synthesized.

mod manifest;
mod store;

pub use manifest::{Manifest, fingerprint};
pub use store::{ProgressSet, ProgressStore};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProgressError {
    #[error("Progress storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProgressError>;
