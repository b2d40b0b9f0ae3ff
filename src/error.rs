use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::adapter::EngineError;

/// Result type used throughout the bridge
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors surfaced by the bridge to its callers.
///
/// Every variant maps onto exactly one wire-level [`ErrorCode`].
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Invalid argument '{argument}': {message}")]
    InvalidArgument {
        argument: String,
        message: String,
    },

    #[error("Model directory not found: {}", path.display())]
    ModelNotFound {
        path: PathBuf,
    },

    #[error("Missing required model file: {file} in {}", path.display())]
    ModelFilesMissing {
        path: PathBuf,
        file: String,
    },

    #[error("Failed to load model: {source}")]
    ModelLoadFailed {
        #[source]
        source: EngineError,
    },

    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("Generation already in progress (session {active_session})")]
    GenerationInProgress {
        active_session: u64,
    },

    #[error("Generation failed: {message}")]
    GenerationFailed {
        message: String,
    },

    #[error("Stream failed: {message}")]
    StreamFailed {
        message: String,
    },

    #[error("Command not implemented: {method}")]
    NotImplemented {
        method: String,
    },

    #[error("Configuration error for {parameter}: {message}")]
    ConfigurationError {
        message: String,
        parameter: String,
    },

    #[error("Background worker unavailable: {message}")]
    WorkerUnavailable {
        message: String,
    },
}

/// Wire-level error codes reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidArgument,
    ModelNotFound,
    ModelFilesMissing,
    ModelLoadFailed,
    ModelNotLoaded,
    GenerationInProgress,
    GenerationFailed,
    StreamFailed,
    NotImplemented,
    InternalError,
}

impl ErrorCode {
    /// The code as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::ModelNotFound => "MODEL_NOT_FOUND",
            ErrorCode::ModelFilesMissing => "MODEL_FILES_MISSING",
            ErrorCode::ModelLoadFailed => "MODEL_LOAD_FAILED",
            ErrorCode::ModelNotLoaded => "MODEL_NOT_LOADED",
            ErrorCode::GenerationInProgress => "GENERATION_IN_PROGRESS",
            ErrorCode::GenerationFailed => "GENERATION_FAILED",
            ErrorCode::StreamFailed => "STREAM_FAILED",
            ErrorCode::NotImplemented => "NOT_IMPLEMENTED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BridgeError {
    pub(crate) fn invalid_argument(argument: &str, message: impl Into<String>) -> Self {
        BridgeError::InvalidArgument {
            argument: argument.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn worker_gone() -> Self {
        BridgeError::WorkerUnavailable {
            message: "worker thread has shut down".to_string(),
        }
    }

    /// The wire-level code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            BridgeError::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            BridgeError::ModelNotFound { .. } => ErrorCode::ModelNotFound,
            BridgeError::ModelFilesMissing { .. } => ErrorCode::ModelFilesMissing,
            BridgeError::ModelLoadFailed { .. } => ErrorCode::ModelLoadFailed,
            BridgeError::ModelNotLoaded => ErrorCode::ModelNotLoaded,
            BridgeError::GenerationInProgress { .. } => ErrorCode::GenerationInProgress,
            BridgeError::GenerationFailed { .. } => ErrorCode::GenerationFailed,
            BridgeError::StreamFailed { .. } => ErrorCode::StreamFailed,
            BridgeError::NotImplemented { .. } => ErrorCode::NotImplemented,
            BridgeError::ConfigurationError { .. } | BridgeError::WorkerUnavailable { .. } => {
                ErrorCode::InternalError
            }
        }
    }
}

/// Extension trait for error classification
pub(crate) trait ErrorExt {
    /// Whether the failure happened before any state was touched
    fn is_rejection(&self) -> bool;
}

impl ErrorExt for BridgeError {
    fn is_rejection(&self) -> bool {
        matches!(
            self,
            BridgeError::InvalidArgument { .. }
                | BridgeError::ModelNotFound { .. }
                | BridgeError::ModelFilesMissing { .. }
                | BridgeError::ModelNotLoaded
                | BridgeError::GenerationInProgress { .. }
                | BridgeError::NotImplemented { .. }
        )
    }
}
