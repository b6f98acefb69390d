//! Speech model implementations

mod coqui_cli;
mod coqui_server;
pub mod mock;

pub use coqui_cli::CoquiCliModel;
pub use coqui_server::CoquiServerModel;
pub use mock::MockModel;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{ModelBackend, ModelConfig};
use crate::error::Result;
use crate::model::SpeechModel;

/// Create a model instance from configuration
pub fn create_model(config: &ModelConfig) -> Result<Arc<dyn SpeechModel>> {
    let timeout = Duration::from_secs(config.timeout_secs);

    let model: Arc<dyn SpeechModel> = match config.backend {
        ModelBackend::CoquiServer => Arc::new(CoquiServerModel::new(&config.base_url, timeout)?),
        ModelBackend::CoquiCli => Arc::new(CoquiCliModel::new(
            &config.model_name,
            config.cli_path.clone(),
            timeout,
        )?),
    };

    model.is_available()?;
    Ok(model)
}

/// Classify model stderr / error bodies that indicate exhausted device memory.
pub(crate) fn is_resource_exhaustion(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("out of memory") || lower.contains("cuda error") || lower.contains("oom")
}
