//! Ordered concatenation of per-chunk segment files.

use super::AudioSegment;
use crate::storage;
use hound::{WavReader, WavSpec, WavWriter};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const SEGMENT_PREFIX: &str = "segment_";
const SEGMENT_EXT: &str = ".wav";

/// File name of the segment for chunk `index`. Zero padding makes lexical
/// order match index order.
pub fn segment_file_name(index: usize) -> String {
    format!("{}{:06}{}", SEGMENT_PREFIX, index, SEGMENT_EXT)
}

/// Parse the chunk index back out of a segment file name.
pub fn segment_index(file_name: &str) -> Option<usize> {
    file_name
        .strip_prefix(SEGMENT_PREFIX)?
        .strip_suffix(SEGMENT_EXT)?
        .parse()
        .ok()
}

/// A segment that keeps a document from being merged.
#[derive(Error, Debug)]
pub enum SegmentFault {
    #[error("Segment for chunk {index} is missing")]
    Missing { index: usize },

    #[error("Segment for chunk {index} at {} is unreadable: {source}", path.display())]
    Unreadable {
        index: usize,
        path: PathBuf,
        source: hound::Error,
    },

    #[error("Segment for chunk {index} has format {found:?}, expected {expected:?}")]
    FormatMismatch {
        index: usize,
        expected: WavSpec,
        found: WavSpec,
    },
}

impl SegmentFault {
    pub fn index(&self) -> usize {
        match self {
            SegmentFault::Missing { index }
            | SegmentFault::Unreadable { index, .. }
            | SegmentFault::FormatMismatch { index, .. } => *index,
        }
    }
}

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("No segments to merge")]
    Empty,

    /// Ordered by chunk index.
    #[error("{}", describe_faults(.0))]
    Segments(Vec<SegmentFault>),

    #[error("Failed to write merged audio: {0}")]
    Write(#[from] hound::Error),

    #[error("Failed to list segments: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_faults(faults: &[SegmentFault]) -> String {
    match faults {
        [] => "No unusable segments".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
    }
}

/// What ended up in a merged file.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeSummary {
    pub segments: usize,
    pub duration_ms: u64,
    pub spec: WavSpec,
}

/// Find segment files in `dir`, keyed and ordered by chunk index.
///
/// Files that do not follow the segment naming (including unpublished
/// temp files) are ignored. A missing directory yields no segments.
pub fn discover_segments(dir: &Path) -> std::io::Result<BTreeMap<usize, PathBuf>> {
    let mut segments = BTreeMap::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(segments),
        Err(e) => return Err(e),
    };

    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(index) = segment_index(&entry.file_name().to_string_lossy()) {
            segments.insert(index, entry.path());
        }
    }

    Ok(segments)
}

/// Check the header of every segment for chunks `0..expected`.
///
/// Reports every missing or unreadable segment and every segment whose
/// format differs from the first readable one, in index order.
pub fn check_segments(segments: &BTreeMap<usize, PathBuf>, expected: usize) -> Vec<SegmentFault> {
    let mut faults = Vec::new();
    let mut reference: Option<WavSpec> = None;

    for index in 0..expected {
        let Some(path) = segments.get(&index) else {
            faults.push(SegmentFault::Missing { index });
            continue;
        };
        let spec = match WavReader::open(path) {
            Ok(reader) => reader.spec(),
            Err(source) => {
                faults.push(SegmentFault::Unreadable {
                    index,
                    path: path.clone(),
                    source,
                });
                continue;
            }
        };
        match reference {
            None => reference = Some(spec),
            Some(expected) if expected != spec => faults.push(SegmentFault::FormatMismatch {
                index,
                expected,
                found: spec,
            }),
            Some(_) => {}
        }
    }

    faults
}

/// Concatenate the segments for chunks `0..expected` found in `dir` into
/// `output`, in index order.
///
/// Every index must be present and all segments must share one format.
/// The output is published atomically, so a failed merge leaves no file.
pub fn merge_segments(
    dir: &Path,
    expected: usize,
    output: &Path,
) -> Result<MergeSummary, MergeError> {
    if expected == 0 {
        return Err(MergeError::Empty);
    }

    let segments = discover_segments(dir)?;
    if let Some((&extra, _)) = segments.range(expected..).next() {
        log::warn!(
            "{}: ignoring segments from chunk {} on, document has {} chunks",
            dir.display(),
            extra,
            expected
        );
    }

    let faults = check_segments(&segments, expected);
    if !faults.is_empty() {
        return Err(MergeError::Segments(faults));
    }

    // Headers are sound, but sample data can still be truncated.
    let read_segment = |index: usize| -> Result<AudioSegment, MergeError> {
        let path = segments
            .get(&index)
            .ok_or_else(|| MergeError::Segments(vec![SegmentFault::Missing { index }]))?;
        AudioSegment::read(path).map_err(|source| {
            MergeError::Segments(vec![SegmentFault::Unreadable {
                index,
                path: path.clone(),
                source,
            }])
        })
    };

    // The first segment fixes the format of the merged file.
    let first = read_segment(0)?;
    let spec = first.spec;

    let temp = storage::temp_beside(output)?;
    let mut out = BufWriter::new(temp.as_file());
    let mut wav = WavWriter::new(&mut out, spec)?;
    first.write_samples(&mut wav)?;
    let mut total_ms = first.duration_ms();

    for index in 1..expected {
        let segment = read_segment(index)?;
        segment.write_samples(&mut wav)?;
        total_ms += segment.duration_ms();
    }

    wav.finalize()?;
    out.flush()?;
    drop(out);
    storage::publish(temp, output)?;

    Ok(MergeSummary {
        segments: expected,
        duration_ms: total_ms,
        spec,
    })
}
