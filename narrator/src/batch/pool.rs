//! Fixed set of model instances, each leased to one document at a time.

use crate::error::PipelineError;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tts_client::{ModelConfig, SpeechModel, create_model};

/// Pool of model instances. Its size is the number of documents that can be
/// synthesized concurrently.
pub struct ModelPool {
    idle: Mutex<Vec<Arc<dyn SpeechModel>>>,
    permits: Arc<Semaphore>,
    size: usize,
}

impl ModelPool {
    pub fn new(models: Vec<Arc<dyn SpeechModel>>) -> Self {
        let size = models.len();
        Self {
            idle: Mutex::new(models),
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Build `config.instances` instances (at least one) of the configured backend.
    pub fn from_config(config: &ModelConfig) -> tts_client::Result<Self> {
        let models = (0..config.instances.max(1))
            .map(|_| create_model(config))
            .collect::<tts_client::Result<Vec<_>>>()?;
        Ok(Self::new(models))
    }

    /// Get number of instances.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Check if pool is empty.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Instances not currently leased.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Wait for a free instance.
    pub async fn acquire(self: &Arc<Self>) -> Result<ModelLease, PipelineError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PipelineError::NoModelInstances)?;

        let model = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .ok_or(PipelineError::NoModelInstances)?;

        Ok(ModelLease {
            model,
            pool: Arc::clone(self),
            _permit: permit,
        })
    }
}

/// Exclusive use of one model instance; returned to the pool on drop.
pub struct ModelLease {
    model: Arc<dyn SpeechModel>,
    pool: Arc<ModelPool>,
    _permit: OwnedSemaphorePermit,
}

impl ModelLease {
    pub fn model(&self) -> Arc<dyn SpeechModel> {
        Arc::clone(&self.model)
    }
}

impl Drop for ModelLease {
    fn drop(&mut self) {
        // The instance goes back before the permit is released.
        self.pool
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&self.model));
    }
}
