use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::events::{EventSink, EventStream};
use crate::generation::GenerationController;
use crate::model::ModelLifecycleManager;
use crate::types::GenerationRequest;
use crate::utils::total_ram_bytes;

use super::builder::BridgeBuilder;

/// Main entry point for on-device generation.
///
/// One instance per process. Every command the host can issue is a method
/// here; streaming output is read from the [`EventStream`] returned by
/// [`subscribe`](Self::subscribe).
pub struct InferenceBridge {
    pub(super) config: Arc<BridgeConfig>,
    pub(super) models: ModelLifecycleManager,
    pub(super) generation: GenerationController,
    pub(super) events: EventSink,
}

impl InferenceBridge {
    /// Create a new bridge builder
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::new()
    }

    /// Validate and load the model at `path`, replacing any loaded model
    pub async fn load_model(&self, path: impl Into<PathBuf>) -> Result<()> {
        self.models.load_model(path).await
    }

    /// Cancel any generation and release the loaded model
    pub async fn unload_model(&self) {
        self.models.unload_model().await
    }

    pub fn is_model_loaded(&self) -> bool {
        self.models.is_loaded()
    }

    /// Generate a complete response
    pub async fn generate(&self, request: GenerationRequest) -> Result<String> {
        self.generation.generate_sync(request).await
    }

    /// Start a streaming generation; tokens arrive on the subscribed stream
    pub fn start_generation(&self, request: GenerationRequest) -> Result<u64> {
        self.generation.start_streaming(request)
    }

    /// Cancel the running generation. Returns false if nothing was running.
    pub fn stop_generation(&self) -> bool {
        self.generation.stop()
    }

    pub fn subscribe(&self) -> EventStream {
        self.events.subscribe()
    }

    pub fn unsubscribe(&self) {
        self.events.unsubscribe()
    }

    /// Total physical memory of the device in bytes
    pub fn total_ram(&self) -> u64 {
        total_ram_bytes()
    }

    /// A request for `prompt` carrying the configured generation defaults
    pub fn request(&self, prompt: impl Into<String>) -> GenerationRequest {
        GenerationRequest::with_defaults(prompt, &self.config.generation)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn models(&self) -> &ModelLifecycleManager {
        &self.models
    }

    pub fn generation(&self) -> &GenerationController {
        &self.generation
    }

    /// Stop generating, unload the model and stop the worker.
    ///
    /// The worker thread is joined once the last component sharing it is
    /// dropped, which is here unless a cloned manager or controller is
    /// still alive elsewhere.
    pub async fn shutdown(self) {
        info!("Shutting down inference bridge");
        self.generation.stop();
        self.models.unload_model().await;
    }
}

impl Drop for InferenceBridge {
    fn drop(&mut self) {
        self.generation.stop();
        self.events.unsubscribe();
    }
}
