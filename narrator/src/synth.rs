//! Per-chunk synthesis: model call, validation, atomic segment publish.

use crate::audio::{AudioSegment, segment_file_name};
use crate::error::PipelineError;
use crate::text::Chunk;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tts_client::{SpeechModel, SpeechRequest, SynthesisError};

/// Turns chunks into segment files using one model instance.
pub struct SynthesisWorker {
    model: Arc<dyn SpeechModel>,
    voice_ref: PathBuf,
    language: String,
}

impl SynthesisWorker {
    pub fn new(
        model: Arc<dyn SpeechModel>,
        voice_ref: impl Into<PathBuf>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            model,
            voice_ref: voice_ref.into(),
            language: language.into(),
        }
    }

    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    /// Synthesize `chunk` and publish it as `segment_dir/segment_NNNNNN.wav`.
    ///
    /// The segment only appears under its final name once fully written; a
    /// failed call leaves nothing behind. Progress is not touched here.
    pub async fn synthesize(
        &self,
        chunk: &Chunk,
        segment_dir: &Path,
    ) -> Result<AudioSegment, PipelineError> {
        let index = chunk.index;
        let request = SpeechRequest::new(
            chunk.text.clone(),
            self.voice_ref.clone(),
            self.language.clone(),
        );

        let bytes = self
            .model
            .synthesize(&request)
            .await
            .map_err(|source| PipelineError::Synthesis { index, source })?;

        let segment = AudioSegment::from_wav_bytes(&bytes).map_err(|e| PipelineError::Synthesis {
            index,
            source: SynthesisError::InvalidOutput(e.to_string()),
        })?;
        if segment.samples.is_empty() {
            return Err(PipelineError::Synthesis {
                index,
                source: SynthesisError::InvalidOutput("waveform has no samples".into()),
            });
        }

        let dest = segment_dir.join(segment_file_name(index));
        let segment = tokio::task::spawn_blocking(move || segment.save(&dest).map(|_| segment))
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))?
            .map_err(|e| PipelineError::SegmentWrite {
                index,
                message: e.to_string(),
            })?;

        log::debug!(
            "chunk {} synthesized by {} ({} ms of audio)",
            index,
            self.model.name(),
            segment.duration_ms()
        );
        Ok(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Samples;
    use tempfile::TempDir;
    use tts_client::MockModel;

    fn worker(model: MockModel) -> SynthesisWorker {
        SynthesisWorker::new(Arc::new(model), "/voices/speaker.wav", "tr")
    }

    #[tokio::test]
    async fn test_writes_segment_named_by_index() {
        let temp_dir = TempDir::new().unwrap();
        let chunk = Chunk::new(4, "Merhaba.".into(), 2);

        let segment = worker(MockModel::always_succeeds())
            .synthesize(&chunk, temp_dir.path())
            .await
            .unwrap();

        let path = temp_dir.path().join("segment_000004.wav");
        assert!(path.exists());
        assert_eq!(AudioSegment::read(&path).unwrap(), segment);
        assert_eq!(segment.samples.len(), "Merhaba.".len());
    }

    #[tokio::test]
    async fn test_request_carries_voice_and_language() {
        let temp_dir = TempDir::new().unwrap();
        let model = Arc::new(MockModel::always_succeeds());
        let worker = SynthesisWorker::new(model.clone(), "/voices/speaker.wav", "tr");

        worker
            .synthesize(&Chunk::new(0, "Selam.".into(), 2), temp_dir.path())
            .await
            .unwrap();
        assert_eq!(model.texts(), vec!["Selam."]);
        assert_eq!(worker.model_name(), "mock");
    }

    #[tokio::test]
    async fn test_model_failure_leaves_no_segment() {
        let temp_dir = TempDir::new().unwrap();
        let chunk = Chunk::new(0, "POISON here.".into(), 3);

        let err = worker(MockModel::fails_on_text("POISON"))
            .synthesize(&chunk, temp_dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Synthesis { index: 0, .. }));
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_output_is_synthesis_error() {
        let temp_dir = TempDir::new().unwrap();
        let chunk = Chunk::new(2, "Hello.".into(), 2);

        let err = worker(MockModel::returns_garbage())
            .synthesize(&chunk, temp_dir.path())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Synthesis {
                index: 2,
                source: SynthesisError::InvalidOutput(_)
            }
        ));
        assert!(!temp_dir.path().join(segment_file_name(2)).exists());
    }

    #[tokio::test]
    async fn test_segment_samples_follow_text() {
        let temp_dir = TempDir::new().unwrap();
        let segment = worker(MockModel::always_succeeds())
            .synthesize(&Chunk::new(0, "AB".into(), 1), temp_dir.path())
            .await
            .unwrap();
        assert_eq!(segment.samples, Samples::Int(vec![65, 66]));
    }
}
