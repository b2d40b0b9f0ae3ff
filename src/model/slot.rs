use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, warn};

use crate::adapter::{EngineAdapter, EngineError, ModelHandle};

use super::ModelDirectory;

/// Exclusive owner of the engine and of the (at most one) loaded model.
///
/// Lives on the worker thread. Nothing else may close the handle; generation
/// jobs only borrow it through [`ModelSlot::handle`].
pub struct ModelSlot {
    engine: Box<dyn EngineAdapter>,
    loaded: Option<LoadedModel>,
}

struct LoadedModel {
    path: PathBuf,
    handle: Box<dyn ModelHandle>,
}

impl ModelSlot {
    pub(crate) fn new(engine: Box<dyn EngineAdapter>) -> Self {
        Self {
            engine,
            loaded: None,
        }
    }

    /// Load `dir`, closing any model that is already loaded first
    pub(crate) fn load(&mut self, dir: &ModelDirectory) -> Result<(), EngineError> {
        if self.release() {
            info!(model_path = %dir.path().display(), "Replacing loaded model");
        }

        let start = Instant::now();
        let handle = self.engine.load(dir.path())?;
        info!(
            model_path = %dir.path().display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model loaded"
        );

        self.loaded = Some(LoadedModel {
            path: dir.path().to_path_buf(),
            handle,
        });
        Ok(())
    }

    /// Close the loaded model, if any. Returns whether something was released.
    ///
    /// Close failures are logged and otherwise ignored; the handle is dropped
    /// either way.
    pub(crate) fn release(&mut self) -> bool {
        let Some(mut model) = self.loaded.take() else {
            return false;
        };
        if let Err(e) = model.handle.close() {
            warn!(model_path = %model.path.display(), error = %e, "Error while closing model");
        }
        info!(model_path = %model.path.display(), "Model released");
        true
    }

    pub(crate) fn handle(&self) -> Option<&dyn ModelHandle> {
        self.loaded.as_ref().map(|m| m.handle.as_ref())
    }

    pub fn path(&self) -> Option<&Path> {
        self.loaded.as_ref().map(|m| m.path.as_path())
    }
}

impl Drop for ModelSlot {
    fn drop(&mut self) {
        self.release();
    }
}
