//! Capability interface over the external inference engine.
//!
//! The bridge never talks to a native runtime directly. Everything it needs
//! (loading a model directory, tokenizing a prompt, stepping the decoder,
//! decoding tokens back to text) goes through these traits, so the lifecycle
//! and generation logic can be exercised against a scripted engine.

use std::path::Path;

#[cfg(test)]
pub(crate) mod testing;

/// Error type for engine-level operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    Load(String),

    #[error("tokenization failed: {0}")]
    Tokenize(String),

    #[error("{0}")]
    Generate(String),

    #[error("decoding failed: {0}")]
    Decode(String),
}

/// Sampling parameters handed to the engine unchanged
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    /// Upper bound on generated tokens
    pub max_tokens: usize,
    /// Sampling temperature
    pub temperature: f64,
    /// Nucleus sampling threshold
    pub top_p: f64,
}

/// Entry point into an inference engine.
///
/// Lives on the background worker for its whole lifetime and is only ever
/// called from there.
pub trait EngineAdapter: Send + 'static {
    /// Load the model found in `dir`
    fn load(&mut self, dir: &Path) -> Result<Box<dyn ModelHandle>, EngineError>;
}

/// A model loaded inside the engine.
///
/// Owned exclusively by the worker-side model slot. Dropping a handle must
/// release whatever the engine allocated for it; [`ModelHandle::close`] gives
/// implementations a chance to report failures while doing so.
pub trait ModelHandle: Send {
    /// Tokenize a prompt
    fn encode(&self, prompt: &str) -> Result<Vec<u32>, EngineError>;

    /// Create a decoder primed with `prompt_tokens`.
    ///
    /// The generator borrows the handle, so it can never outlive it.
    fn generator<'a>(
        &'a self,
        prompt_tokens: &[u32],
        params: &SamplingParams,
    ) -> Result<Box<dyn TokenGenerator + 'a>, EngineError>;

    /// Release the model. Called at most once, right before the handle is dropped.
    fn close(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Incremental decoder for a single generation.
///
/// Dropping the generator releases its engine-side state.
pub trait TokenGenerator {
    /// Whether the engine reports the sequence as finished
    fn is_done(&self) -> bool;

    /// Compute logits and select the next token
    fn step(&mut self) -> Result<u32, EngineError>;

    /// Decode `token` to the text it appends to the output.
    ///
    /// May return an empty string while a multi-token character is incomplete.
    fn decode(&mut self, token: u32) -> Result<String, EngineError>;
}
