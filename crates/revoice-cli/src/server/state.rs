//! Shared server state

use std::path::PathBuf;
use std::sync::Arc;

use revoice::aligner::ForcedAligner;
use revoice::{ModelStore, SpeechGenerator};
use tokio::sync::Semaphore;

#[derive(Clone)]
pub struct AppState {
    /// The external model's sampling routine.
    pub generator: Arc<dyn SpeechGenerator>,
    pub aligner: Arc<ForcedAligner>,
    pub models: Arc<ModelStore>,
    /// Root of the per-voice upload directories.
    pub voices_dir: PathBuf,
    /// Admission gate for compute-bound inference calls. Requests past the
    /// permit count queue here instead of piling onto the device.
    pub inference_permits: Arc<Semaphore>,
}

impl AppState {
    pub fn new(
        generator: Arc<dyn SpeechGenerator>,
        aligner: ForcedAligner,
        models: ModelStore,
        voices_dir: PathBuf,
        max_concurrent_inferences: usize,
    ) -> Self {
        Self {
            generator,
            aligner: Arc::new(aligner),
            models: Arc::new(models),
            voices_dir,
            inference_permits: Arc::new(Semaphore::new(max_concurrent_inferences.max(1))),
        }
    }
}
