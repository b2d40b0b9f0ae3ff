use std::sync::Arc;

use tracing::info;

use crate::adapter::EngineAdapter;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::events::EventSink;
use crate::generation::GenerationController;
use crate::model::{ModelLifecycleManager, ModelSlot};
use crate::runtime::{ControllerState, Worker};
use crate::utils::{setup_logging, LogConfig};

use super::bridge::InferenceBridge;

/// Builder for constructing an InferenceBridge instance
pub struct BridgeBuilder {
    config: Option<BridgeConfig>,
    engine: Option<Box<dyn EngineAdapter>>,
    init_logging: bool,
}

impl BridgeBuilder {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            config: None,
            engine: None,
            init_logging: false,
        }
    }

    /// Set the bridge configuration
    pub fn with_config(mut self, config: BridgeConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the inference engine the worker will drive
    pub fn with_engine(mut self, engine: impl EngineAdapter) -> Self {
        self.engine = Some(Box::new(engine));
        self
    }

    /// Install the global tracing subscriber at the configured log level.
    ///
    /// Leave this off when the host application sets up tracing itself.
    pub fn with_logging(mut self) -> Self {
        self.init_logging = true;
        self
    }

    /// Build the bridge and start its background worker
    pub fn build(self) -> Result<InferenceBridge> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        if self.init_logging {
            setup_logging(LogConfig::from(&config.monitoring)).map_err(|e| {
                BridgeError::ConfigurationError {
                    message: e.to_string(),
                    parameter: "monitoring.log_level".to_string(),
                }
            })?;
        }

        let engine = self.engine.ok_or_else(|| BridgeError::ConfigurationError {
            message: "An inference engine is required".to_string(),
            parameter: "engine".to_string(),
        })?;

        let worker = Arc::new(Worker::spawn(&config.worker.thread_name, ModelSlot::new(engine))?);
        let state = ControllerState::shared();
        let events = EventSink::new();

        let models = ModelLifecycleManager::new(
            worker.clone(),
            state.clone(),
            events.clone(),
            config.model.validation,
        );
        let generation = GenerationController::new(worker, state, events.clone());

        info!(
            worker = %config.worker.thread_name,
            validation = ?config.model.validation,
            "Inference bridge ready"
        );

        Ok(InferenceBridge {
            config: Arc::new(config),
            models,
            generation,
            events,
        })
    }
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
