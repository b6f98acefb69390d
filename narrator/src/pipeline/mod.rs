//! Per-document narration: chunk, synthesize what is missing, merge, clean up.
//!
//! Progress is recorded after every chunk, so a run that stops for any reason
//! (model error, cancellation, crash) resumes at the first unfinished chunk.

mod state;

pub use state::{PipelineReport, PipelineState};

use crate::audio::merge::{MergeError, SegmentFault};
use crate::audio::{merge_segments, segment_file_name};
use crate::document::{DocumentJob, extract_paragraphs};
use crate::error::{CleanupError, PipelineError};
use crate::progress::{Manifest, ProgressError, ProgressSet, ProgressStore};
use crate::synth::SynthesisWorker;
use crate::text::{
    Chunk, SentenceSplitter, TokenCounter, chunk, normalize_paragraphs, split_sentences,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Collaborators and settings shared by every document in a run.
#[derive(Clone)]
pub struct PipelineContext {
    pub splitter: Arc<dyn SentenceSplitter>,
    pub counter: Arc<dyn TokenCounter>,
    pub progress: ProgressStore,
    /// Parent of the per-document segment directories
    pub segments_root: PathBuf,
    pub max_chars: usize,
    pub max_tokens: usize,
}

impl PipelineContext {
    /// Working directory holding the segments of one document.
    pub fn segment_dir(&self, document_id: &str) -> PathBuf {
        self.segments_root.join(document_id)
    }
}

/// Receives lifecycle and progress notifications. All methods default to
/// doing nothing.
pub trait PipelineObserver: Send + Sync {
    fn state_changed(&self, _document_id: &str, _state: PipelineState) {}

    /// Chunking finished; `completed` chunks are already done from earlier runs.
    fn chunks_planned(&self, _document_id: &str, _total: usize, _completed: usize) {}

    fn chunk_completed(
        &self,
        _document_id: &str,
        _index: usize,
        _completed: usize,
        _total: usize,
    ) {
    }
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

struct Lifecycle<'a> {
    document_id: &'a str,
    observer: &'a dyn PipelineObserver,
    state: PipelineState,
}

impl<'a> Lifecycle<'a> {
    fn new(document_id: &'a str, observer: &'a dyn PipelineObserver) -> Self {
        Self {
            document_id,
            observer,
            state: PipelineState::Init,
        }
    }

    fn enter(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {}",
            self.state,
            next
        );
        log::debug!("{}: {} -> {}", self.document_id, self.state, next);
        self.state = next;
        self.observer.state_changed(self.document_id, next);
    }
}

/// Runs documents through the narration state machine.
#[derive(Clone)]
pub struct DocumentPipeline {
    ctx: PipelineContext,
}

impl DocumentPipeline {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    /// Extract, normalise, split and chunk a document.
    pub fn plan(&self, source: &Path) -> Result<Vec<Chunk>, PipelineError> {
        let paragraphs = extract_paragraphs(source)?;
        let body = normalize_paragraphs(&paragraphs);
        let sentences = split_sentences(self.ctx.splitter.as_ref(), &body)?;
        Ok(chunk(
            &sentences,
            self.ctx.max_chars,
            self.ctx.max_tokens,
            self.ctx.counter.as_ref(),
        )?)
    }

    /// Discard stored progress and segments so the next run starts over.
    pub fn reset(&self, document_id: &str) -> Result<(), PipelineError> {
        self.ctx.progress.clear(document_id)?;
        remove_dir_if_present(&self.ctx.segment_dir(document_id))?;
        Ok(())
    }

    /// Narrate one document into `job.output`.
    ///
    /// On error the state machine ends in `Failed`; completed chunks stay
    /// recorded so that the next run only synthesizes the rest.
    pub async fn run(
        &self,
        job: &DocumentJob,
        worker: &SynthesisWorker,
        cancel: &CancellationToken,
        observer: &dyn PipelineObserver,
    ) -> Result<PipelineReport, PipelineError> {
        let mut lifecycle = Lifecycle::new(&job.id, observer);
        let result = self.drive(job, worker, cancel, &mut lifecycle).await;

        if let Err(err) = &result {
            lifecycle.enter(PipelineState::Failed);
            match err {
                PipelineError::Cancelled => log::info!("{}: cancelled, progress kept", job.id),
                err => log::error!("{}: {}", job.id, err),
            }
        }
        result
    }

    async fn drive(
        &self,
        job: &DocumentJob,
        worker: &SynthesisWorker,
        cancel: &CancellationToken,
        lifecycle: &mut Lifecycle<'_>,
    ) -> Result<PipelineReport, PipelineError> {
        lifecycle.enter(PipelineState::Chunking);
        let planner = self.clone();
        let source = job.source.clone();
        let chunks = tokio::task::spawn_blocking(move || planner.plan(&source))
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))??;

        let total = chunks.len();
        let oversized = chunks
            .iter()
            .filter(|c| c.exceeds(self.ctx.max_chars, self.ctx.max_tokens))
            .count();
        let completed = self.resume_point(job, &chunks)?;
        let mut done = completed.range(..total).count();
        lifecycle.observer.chunks_planned(&job.id, total, done);
        log::info!(
            "{}: {} chunks ({} already synthesized) via {}",
            job.id,
            total,
            done,
            worker.model_name()
        );

        lifecycle.enter(PipelineState::Synthesizing);
        let segment_dir = self.ctx.segment_dir(&job.id);
        let mut synthesized = 0;
        let mut skipped = 0;

        for chunk in &chunks {
            if completed.contains(&chunk.index) {
                skipped += 1;
                continue;
            }
            if cancel.is_cancelled() {
                log::info!("{}: stopping before chunk {}", job.id, chunk.index);
                return Err(PipelineError::Cancelled);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::info!("{}: abandoning chunk {}", job.id, chunk.index);
                    return Err(PipelineError::Cancelled);
                }
                result = worker.synthesize(chunk, &segment_dir) => {
                    result?;
                }
            }

            self.ctx.progress.mark_complete(&job.id, chunk.index)?;
            synthesized += 1;
            done += 1;
            lifecycle.observer.chunk_completed(&job.id, chunk.index, done, total);
        }

        lifecycle.enter(PipelineState::Merging);
        let dir = segment_dir.clone();
        let output = job.output.clone();
        let merged = tokio::task::spawn_blocking(move || merge_segments(&dir, total, &output))
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))?;
        let summary = merged.map_err(|err| self.merge_failure(&job.id, &segment_dir, err))?;
        log::info!(
            "{}: wrote {} ({} ms)",
            job.id,
            job.output.display(),
            summary.duration_ms
        );

        for err in self.cleanup(&job.id) {
            log::warn!("{}: cleanup incomplete: {}", job.id, err);
        }
        lifecycle.enter(PipelineState::Done);

        Ok(PipelineReport {
            document_id: job.id.clone(),
            output: job.output.clone(),
            total_chunks: total,
            synthesized,
            skipped,
            oversized,
            duration_ms: summary.duration_ms,
            final_state: PipelineState::Done,
        })
    }

    /// Load the progress that still applies to this chunking, discarding it
    /// when the manifest shows it was recorded against different chunks.
    fn resume_point(
        &self,
        job: &DocumentJob,
        chunks: &[Chunk],
    ) -> Result<ProgressSet, PipelineError> {
        let progress = &self.ctx.progress;
        let mut manifest = Manifest::new(
            &job.id,
            job.source.clone(),
            chunks,
            self.ctx.max_chars,
            self.ctx.max_tokens,
        );

        let stale = match progress.load_manifest(&job.id) {
            Ok(Some(stored)) if stored.matches(&manifest) => {
                manifest.created_at = stored.created_at;
                false
            }
            Ok(Some(_)) => {
                log::warn!(
                    "{}: text or chunk bounds changed since the last run, discarding stored progress",
                    job.id
                );
                true
            }
            Ok(None) => {
                if !progress.load(&job.id)?.is_empty() {
                    log::warn!("{}: progress has no manifest, discarding it", job.id);
                }
                true
            }
            Err(ProgressError::Manifest(e)) => {
                log::warn!("{}: unreadable manifest ({}), discarding stored progress", job.id, e);
                true
            }
            Err(e) => return Err(e.into()),
        };

        if stale {
            self.reset(&job.id)?;
        }
        progress.save_manifest(&manifest)?;
        Ok(progress.load(&job.id)?)
    }

    /// Forget every chunk whose segment cannot be merged, so the next run
    /// synthesizes all of them again, and report the first one.
    fn merge_failure(
        &self,
        document_id: &str,
        segment_dir: &Path,
        err: MergeError,
    ) -> PipelineError {
        let faults = match err {
            MergeError::Segments(faults) => faults,
            other => return PipelineError::Merge(other.to_string()),
        };
        let indices: Vec<usize> = faults.iter().map(SegmentFault::index).collect();
        self.forget(document_id, &indices);

        match faults.into_iter().next() {
            Some(SegmentFault::Missing { index }) => PipelineError::SegmentRead {
                index,
                path: segment_dir.join(segment_file_name(index)),
                message: "segment file is missing".to_string(),
            },
            Some(SegmentFault::Unreadable {
                index,
                path,
                source,
            }) => PipelineError::SegmentRead {
                index,
                path,
                message: source.to_string(),
            },
            Some(SegmentFault::FormatMismatch {
                index,
                expected,
                found,
            }) => PipelineError::FormatMismatch {
                index,
                message: format!(
                    "expected {} ch/{} Hz/{} bit, found {} ch/{} Hz/{} bit",
                    expected.channels,
                    expected.sample_rate,
                    expected.bits_per_sample,
                    found.channels,
                    found.sample_rate,
                    found.bits_per_sample
                ),
            },
            None => PipelineError::Merge("no unusable segment reported".to_string()),
        }
    }

    fn forget(&self, document_id: &str, indices: &[usize]) {
        let progress = &self.ctx.progress;
        for &index in indices {
            if let Err(e) = progress.forget(document_id, index) {
                log::warn!("{}: failed to reset chunk {}: {}", document_id, index, e);
            }
        }
        log::warn!(
            "{}: chunks {:?} will be synthesized again",
            document_id,
            indices
        );
    }

    fn cleanup(&self, document_id: &str) -> Vec<CleanupError> {
        let mut errors = Vec::new();
        let dir = self.ctx.segment_dir(document_id);
        if let Err(source) = remove_dir_if_present(&dir) {
            errors.push(CleanupError::Segments { path: dir, source });
        }
        if let Err(e) = self.ctx.progress.clear(document_id) {
            errors.push(e.into());
        }
        errors
    }
}

fn remove_dir_if_present(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
