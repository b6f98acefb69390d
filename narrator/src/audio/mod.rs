//! Waveform segments and their ordered concatenation.

pub mod merge;
mod segment;

pub use merge::{discover_segments, merge_segments, segment_file_name, segment_index};
pub use segment::{AudioSegment, Samples};
