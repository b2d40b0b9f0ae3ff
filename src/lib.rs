//! GenAI Bridge - on-device text generation behind a narrow command boundary
//!
//! This crate wraps an external inference engine with the lifecycle and
//! concurrency control a host application needs: loading and replacing a
//! single model, running at most one generation at a time, streaming tokens
//! with exactly one terminal event, and cancelling promptly without leaking
//! engine resources.

pub mod adapter;
pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod generation;
pub mod model;
pub mod types;
pub mod utils;

mod runtime;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-exports for public API
pub use adapter::{EngineAdapter, EngineError, ModelHandle, SamplingParams, TokenGenerator};
pub use bridge::{BridgeBuilder, InferenceBridge};
pub use config::{BridgeConfig, ValidationStrictness};
pub use dispatch::{CommandDispatcher, CommandError, CommandHandler, MethodCall};
pub use error::{BridgeError, ErrorCode, Result};
pub use events::{EventSink, EventStream};
pub use runtime::ModelState;
pub use types::{GenerationRequest, StreamEvent};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_numbers() {
        assert!(!VERSION.is_empty());
    }
}
