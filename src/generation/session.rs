use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::adapter::{EngineError, ModelHandle};
use crate::types::GenerationRequest;

/// Lifecycle of a single generation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Summary of a finished token loop
#[derive(Debug, Clone, Copy)]
pub struct SessionStats {
    pub tokens: usize,
    pub elapsed: Duration,
}

/// Runtime state of one generation, from admission to terminal outcome
#[derive(Debug)]
pub struct GenerationSession {
    id: u64,
    request: GenerationRequest,
    cancel: CancellationToken,
    state: SessionState,
    tokens: usize,
}

impl GenerationSession {
    pub(crate) fn new(id: u64, request: GenerationRequest, cancel: CancellationToken) -> Self {
        Self {
            id,
            request,
            cancel,
            state: SessionState::Created,
            tokens: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the token loop against `model`.
    ///
    /// Cancellation is checked before every step, never in the middle of one.
    /// `on_token` receives each non-empty decoded piece in production order
    /// and returns false to stop the loop, which is treated as a cancellation.
    /// The engine-side generator is dropped on every exit path.
    pub(crate) fn run<F>(&mut self, model: &dyn ModelHandle, mut on_token: F) -> Result<SessionStats, EngineError>
    where
        F: FnMut(&str) -> bool,
    {
        let start = Instant::now();
        self.state = SessionState::Running;

        let result = self.token_loop(model, &mut on_token);
        self.state = match &result {
            Ok(()) if self.cancel.is_cancelled() => SessionState::Cancelled,
            Ok(()) => SessionState::Completed,
            Err(_) => SessionState::Failed,
        };

        let stats = SessionStats {
            tokens: self.tokens,
            elapsed: start.elapsed(),
        };
        debug!(
            session_id = self.id,
            state = ?self.state,
            tokens = stats.tokens,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "Token loop finished"
        );
        result.map(|()| stats)
    }

    fn token_loop<F>(&mut self, model: &dyn ModelHandle, on_token: &mut F) -> Result<(), EngineError>
    where
        F: FnMut(&str) -> bool,
    {
        let prompt_tokens = model.encode(&self.request.prompt)?;
        trace!(session_id = self.id, prompt_tokens = prompt_tokens.len(), "Prompt encoded");

        let mut generator = model.generator(&prompt_tokens, &self.request.sampling())?;

        while self.tokens < self.request.max_tokens {
            if self.cancel.is_cancelled() {
                return Ok(());
            }
            if generator.is_done() {
                break;
            }

            let token = generator.step()?;
            let text = generator.decode(token)?;
            self.tokens += 1;

            if !text.is_empty() && !on_token(&text) {
                self.cancel.cancel();
                return Ok(());
            }
        }

        Ok(())
    }
}
