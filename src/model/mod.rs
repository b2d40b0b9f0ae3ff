//! Model directory validation and the loaded-model lifecycle

mod directory;
mod manager;
mod slot;

pub use directory::{required_files, ModelDirectory, REQUIRED_MODEL_FILES, STRICT_MODEL_FILES};
pub use manager::ModelLifecycleManager;
pub(crate) use slot::ModelSlot;
