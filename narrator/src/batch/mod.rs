//! Runs many documents concurrently, one pipeline per document.

mod pool;

pub use pool::{ModelLease, ModelPool};

use crate::document::DocumentJob;
use crate::error::PipelineError;
use crate::pipeline::{
    DocumentPipeline, NoopObserver, PipelineContext, PipelineObserver, PipelineReport,
};
use crate::synth::SynthesisWorker;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Per-request synthesis settings shared by every document.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Reference recording of the voice to clone
    pub voice_ref: PathBuf,
    /// Language code passed to the model
    pub language: String,
    /// Continue from stored progress (false discards it first)
    pub resume: bool,
}

/// Result of one document in a batch.
#[derive(Debug)]
pub struct DocumentOutcome {
    pub document_id: String,
    pub source: PathBuf,
    pub result: Result<PipelineReport, PipelineError>,
}

impl DocumentOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

enum Pending {
    Spawned(JoinHandle<Result<PipelineReport, PipelineError>>),
    Rejected(PipelineError),
}

/// Fans documents out over the model pool.
pub struct BatchOrchestrator {
    pool: Arc<ModelPool>,
    pipeline: DocumentPipeline,
    settings: WorkerSettings,
    observer: Arc<dyn PipelineObserver>,
}

impl BatchOrchestrator {
    pub fn new(
        pool: ModelPool,
        ctx: PipelineContext,
        settings: WorkerSettings,
    ) -> Result<Self, PipelineError> {
        if pool.is_empty() {
            return Err(PipelineError::NoModelInstances);
        }
        Ok(Self {
            pool: Arc::new(pool),
            pipeline: DocumentPipeline::new(ctx),
            settings,
            observer: Arc::new(NoopObserver),
        })
    }

    /// Report pipeline progress to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Narrate every job and return one outcome per job, in input order.
    ///
    /// A failing document never affects the others. Only the first job with
    /// a given document id runs; later ones fail as duplicates.
    pub async fn run(
        &self,
        jobs: Vec<DocumentJob>,
        cancel: CancellationToken,
    ) -> Vec<DocumentOutcome> {
        let mut seen = HashSet::new();
        let mut pending = Vec::with_capacity(jobs.len());

        for job in jobs {
            let document_id = job.id.clone();
            let source = job.source.clone();

            let task = if seen.insert(document_id.clone()) {
                Pending::Spawned(tokio::spawn(run_document(
                    Arc::clone(&self.pool),
                    self.pipeline.clone(),
                    self.settings.clone(),
                    Arc::clone(&self.observer),
                    cancel.clone(),
                    job,
                )))
            } else {
                log::warn!("{}: {} is already in this batch", document_id, source.display());
                Pending::Rejected(PipelineError::DuplicateDocument(document_id.clone()))
            };
            pending.push((document_id, source, task));
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        for (document_id, source, task) in pending {
            let result = match task {
                Pending::Rejected(err) => Err(err),
                Pending::Spawned(handle) => match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        log::error!("{}: task ended abnormally: {}", document_id, e);
                        Err(PipelineError::Task(e.to_string()))
                    }
                },
            };
            outcomes.push(DocumentOutcome {
                document_id,
                source,
                result,
            });
        }

        outcomes
    }
}

async fn run_document(
    pool: Arc<ModelPool>,
    pipeline: DocumentPipeline,
    settings: WorkerSettings,
    observer: Arc<dyn PipelineObserver>,
    cancel: CancellationToken,
    job: DocumentJob,
) -> Result<PipelineReport, PipelineError> {
    let lease = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
        lease = pool.acquire() => lease?,
    };
    log::debug!("{}: leased a {} instance", job.id, lease.model().name());

    if !settings.resume {
        pipeline.reset(&job.id)?;
    }

    let worker = SynthesisWorker::new(lease.model(), settings.voice_ref, settings.language);
    pipeline.run(&job, &worker, &cancel, observer.as_ref()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressStore;
    use crate::text::{PunctuationSplitter, WordTokenCounter};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;
    use tts_client::{MockModel, SpeechModel};

    fn context(root: &std::path::Path) -> PipelineContext {
        PipelineContext {
            splitter: Arc::new(PunctuationSplitter),
            counter: Arc::new(WordTokenCounter),
            progress: ProgressStore::new(root.join("progress")),
            segments_root: root.join("segments"),
            max_chars: 20,
            max_tokens: 300,
        }
    }

    fn settings(resume: bool) -> WorkerSettings {
        WorkerSettings {
            voice_ref: PathBuf::from("/voices/speaker.wav"),
            language: "tr".to_string(),
            resume,
        }
    }

    /// Pool of `size` leases that all share `model`, so its counters see every call.
    fn shared_pool(model: &Arc<MockModel>, size: usize) -> ModelPool {
        ModelPool::new(
            (0..size)
                .map(|_| Arc::clone(model) as Arc<dyn SpeechModel>)
                .collect(),
        )
    }

    fn orchestrator(
        model: &Arc<MockModel>,
        size: usize,
        root: &std::path::Path,
    ) -> BatchOrchestrator {
        BatchOrchestrator::new(shared_pool(model, size), context(root), settings(true)).unwrap()
    }

    fn jobs(root: &std::path::Path, texts: &[&str]) -> Vec<DocumentJob> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let source = root.join(format!("doc{}.txt", i));
                fs::write(&source, text).unwrap();
                DocumentJob::new(&source, root.join("out").join(format!("doc{}.wav", i))).unwrap()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let temp_dir = TempDir::new().unwrap();
        let model = Arc::new(MockModel::fails_on_text("POISON"));
        let orchestrator = orchestrator(&model, 2, temp_dir.path());

        let jobs = jobs(
            temp_dir.path(),
            &["First document. It is fine.", "This one has POISON. Sadly.", "Third. Also fine."],
        );
        let ids: Vec<_> = jobs.iter().map(|j| j.id.clone()).collect();
        let outcomes = orchestrator.run(jobs, CancellationToken::new()).await;

        assert_eq!(outcomes.iter().map(|o| o.document_id.clone()).collect::<Vec<_>>(), ids);
        assert!(outcomes[0].is_success());
        assert!(matches!(
            outcomes[1].result,
            Err(PipelineError::Synthesis { index: 0, .. })
        ));
        assert!(outcomes[2].is_success());
        assert!(temp_dir.path().join("out").join("doc0.wav").exists());
        assert!(!temp_dir.path().join("out").join("doc1.wav").exists());
        assert!(temp_dir.path().join("out").join("doc2.wav").exists());
    }

    #[tokio::test]
    async fn test_concurrency_bounded_by_pool() {
        let temp_dir = TempDir::new().unwrap();
        let model = Arc::new(MockModel::always_succeeds().with_delay(Duration::from_millis(10)));
        let orchestrator = orchestrator(&model, 2, temp_dir.path());

        let jobs = jobs(
            temp_dir.path(),
            &["Bir. İki. Üç.", "Dört. Beş. Altı.", "Yedi. Sekiz.", "Dokuz. On."],
        );
        let outcomes = orchestrator.run(jobs, CancellationToken::new()).await;

        assert!(outcomes.iter().all(DocumentOutcome::is_success));
        assert!(model.max_in_flight() <= 2);
        assert_eq!(model.call_count(), 4);
    }

    #[tokio::test]
    async fn test_single_instance_serializes_documents() {
        let temp_dir = TempDir::new().unwrap();
        let model = Arc::new(MockModel::always_succeeds().with_delay(Duration::from_millis(5)));
        let orchestrator = orchestrator(&model, 1, temp_dir.path());

        let jobs = jobs(temp_dir.path(), &["A. B.", "C. D.", "E. F."]);
        let outcomes = orchestrator.run(jobs, CancellationToken::new()).await;

        assert!(outcomes.iter().all(DocumentOutcome::is_success));
        assert_eq!(model.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_document_runs_once() {
        let temp_dir = TempDir::new().unwrap();
        let model = Arc::new(MockModel::always_succeeds());
        let orchestrator = orchestrator(&model, 2, temp_dir.path());

        let mut jobs = jobs(temp_dir.path(), &["Only once."]);
        jobs.push(jobs[0].clone());
        let outcomes = orchestrator.run(jobs, CancellationToken::new()).await;

        assert!(outcomes[0].is_success());
        assert!(matches!(outcomes[1].result, Err(PipelineError::DuplicateDocument(_))));
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_batch_reports_every_document() {
        let temp_dir = TempDir::new().unwrap();
        let model = Arc::new(MockModel::always_succeeds());
        let orchestrator = orchestrator(&model, 1, temp_dir.path());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcomes = orchestrator
            .run(jobs(temp_dir.path(), &["One.", "Two."]), cancel)
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| matches!(o.result, Err(PipelineError::Cancelled))));
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_no_resume_discards_progress() {
        let temp_dir = TempDir::new().unwrap();
        let jobs = jobs(temp_dir.path(), &["Birinci cümle. İkinci cümle. Üçüncü cümle."]);

        let failing = Arc::new(MockModel::fails_on_call(1));
        BatchOrchestrator::new(shared_pool(&failing, 1), context(temp_dir.path()), settings(true))
            .unwrap()
            .run(jobs.clone(), CancellationToken::new())
            .await;

        let model = Arc::new(MockModel::always_succeeds());
        let ctx = context(temp_dir.path());
        let outcomes = BatchOrchestrator::new(shared_pool(&model, 1), ctx, settings(false))
            .unwrap()
            .run(jobs, CancellationToken::new())
            .await;

        let report = outcomes[0].result.as_ref().unwrap();
        assert_eq!(report.total_chunks, 3);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.synthesized, report.total_chunks);
    }

    #[test]
    fn test_empty_pool_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let pool = ModelPool::new(Vec::new());
        let result = BatchOrchestrator::new(pool, context(temp_dir.path()), settings(true));
        assert!(matches!(result, Err(PipelineError::NoModelInstances)));
    }
}
