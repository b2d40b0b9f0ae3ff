use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::adapter::EngineError;
use crate::config::ValidationStrictness;
use crate::error::{BridgeError, Result};
use crate::events::EventSink;
use crate::runtime::{catch_panic, ControllerState, ModelState, SharedState, Worker};

use super::ModelDirectory;

/// Caller-facing side of the model lifecycle.
///
/// Validation happens on the caller's context; the actual engine load and
/// release run as jobs on the worker, which exclusively owns the handle.
/// Any generation in flight is cancelled before the handle is touched, and
/// because the worker is serial the release only runs after that loop has
/// exited.
#[derive(Clone)]
pub struct ModelLifecycleManager {
    worker: Arc<Worker>,
    state: SharedState,
    events: EventSink,
    strictness: ValidationStrictness,
}

impl ModelLifecycleManager {
    pub(crate) fn new(
        worker: Arc<Worker>,
        state: SharedState,
        events: EventSink,
        strictness: ValidationStrictness,
    ) -> Self {
        Self {
            worker,
            state,
            events,
            strictness,
        }
    }

    /// Validate `path` and load it, replacing any model already loaded.
    ///
    /// On validation failure nothing changes. On engine failure the manager
    /// ends up `Unloaded`.
    pub async fn load_model(&self, path: impl Into<PathBuf>) -> Result<()> {
        let dir = ModelDirectory::validate(path, self.strictness).await?;
        info!(model_path = %dir.path().display(), "Loading model");

        let pending = {
            let mut state = self.state.lock();
            self.cancel_active(&mut state);
            let epoch = state.begin_transition(ModelState::Loading);

            let shared = self.state.clone();
            let submitted = self.worker.call(move |slot| {
                let result = catch_panic(|| slot.load(&dir)).unwrap_or_else(|panic| {
                    error!(panic = %panic, "Engine panicked while loading model");
                    Err(EngineError::Load(format!("engine panicked: {}", panic)))
                });
                let outcome = if result.is_ok() {
                    ModelState::Loaded
                } else {
                    ModelState::Unloaded
                };
                if !shared.lock().finish_transition(epoch, outcome) {
                    debug!(epoch, "Load superseded by a later request");
                }
                result
            });
            if submitted.is_err() {
                state.finish_transition(epoch, ModelState::Unloaded);
            }
            submitted?
        };

        pending.wait().await?.map_err(|source| {
            warn!(error = %source, "Model load failed");
            BridgeError::ModelLoadFailed { source }
        })
    }

    /// Release the loaded model. Idempotent and infallible.
    ///
    /// Resolves once any cancelled generation loop has exited and the handle
    /// has been closed.
    pub async fn unload_model(&self) {
        let pending = {
            let mut state = self.state.lock();
            self.cancel_active(&mut state);
            let epoch = state.begin_transition(ModelState::Unloading);

            let shared = self.state.clone();
            let submitted = self.worker.call(move |slot| {
                // The slot gives up the handle before closing it, so it is empty even after a panic.
                if let Err(panic) = catch_panic(|| slot.release()) {
                    error!(panic = %panic, "Engine panicked while releasing model");
                }
                shared.lock().finish_transition(epoch, ModelState::Unloaded);
            });
            match submitted {
                Ok(pending) => pending,
                Err(e) => {
                    // No worker means the slot has already been dropped.
                    warn!(error = %e, "Unload without a running worker");
                    state.finish_transition(epoch, ModelState::Unloaded);
                    return;
                }
            }
        };

        if let Err(e) = pending.wait().await {
            warn!(error = %e, "Unload did not complete cleanly");
        }
    }

    /// Whether a model is loaded and ready for generation
    pub fn is_loaded(&self) -> bool {
        self.state() == ModelState::Loaded
    }

    pub fn state(&self) -> ModelState {
        self.state.lock().model()
    }

    /// Path of the loaded model, read on the worker after queued jobs have run
    pub async fn loaded_path(&self) -> Option<PathBuf> {
        self.worker
            .call(|slot| slot.path().map(|p| p.to_path_buf()))
            .ok()?
            .wait()
            .await
            .ok()
            .flatten()
    }

    fn cancel_active(&self, state: &mut ControllerState) {
        if let Some(active) = state.take_session() {
            info!(session_id = active.id, "Cancelling generation before model change");
            self.events.revoke(&active.cancel);
        }
    }
}
