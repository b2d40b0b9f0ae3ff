//! Common type definitions shared by the controller and its callers

use serde::{Deserialize, Serialize};

use crate::adapter::SamplingParams;
use crate::config::GenerationDefaults;
use crate::error::{BridgeError, ErrorCode, Result};

/// A validated generation request. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Prompt text
    pub prompt: String,
    /// Maximum number of tokens to generate
    pub max_tokens: usize,
    /// Sampling temperature, passed to the engine unchanged
    pub temperature: f64,
    /// Nucleus sampling threshold, passed to the engine unchanged
    pub top_p: f64,
}

impl GenerationRequest {
    /// Create a request using the built-in defaults
    pub fn new(prompt: impl Into<String>) -> Self {
        Self::with_defaults(prompt, &GenerationDefaults::default())
    }

    /// Create a request using the given defaults
    pub fn with_defaults(prompt: impl Into<String>, defaults: &GenerationDefaults) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
            top_p: defaults.top_p,
        }
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn top_p(mut self, top_p: f64) -> Self {
        self.top_p = top_p;
        self
    }

    /// Check the request can be handed to the engine
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(BridgeError::invalid_argument(
                "maxTokens",
                "must be a positive integer",
            ));
        }
        Ok(())
    }

    pub(crate) fn sampling(&self) -> SamplingParams {
        SamplingParams {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
        }
    }
}

/// An event delivered on the event channel.
///
/// A streaming session produces zero or more `Token` events followed by
/// exactly one of `End` or `Error`, unless it is cancelled, in which case
/// nothing follows the last delivered token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StreamEvent {
    /// A piece of generated text
    Token { text: String },
    /// The session finished normally
    End,
    /// The session failed
    Error { code: ErrorCode, message: String },
}

impl StreamEvent {
    pub(crate) fn failure(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            code: ErrorCode::StreamFailed,
            message: message.into(),
        }
    }

    /// Whether this event closes out a session
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Token { .. })
    }
}
