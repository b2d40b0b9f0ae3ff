use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn};

use crate::adapter::EngineError;
use crate::error::{BridgeError, Result};
use crate::events::EventSink;
use crate::model::ModelSlot;
use crate::runtime::{catch_panic, ActiveSession, SessionKind, SharedState, Worker};
use crate::types::{GenerationRequest, StreamEvent};

use super::session::{GenerationSession, SessionState};

/// Runs at most one generation at a time on the background worker
#[derive(Clone)]
pub struct GenerationController {
    worker: Arc<Worker>,
    state: SharedState,
    events: EventSink,
}

impl GenerationController {
    pub(crate) fn new(worker: Arc<Worker>, state: SharedState, events: EventSink) -> Self {
        Self {
            worker,
            state,
            events,
        }
    }

    /// Generate the full completion for `request` and return it.
    ///
    /// No partial output is observable; the call resolves once the token loop
    /// has finished on the worker.
    pub async fn generate_sync(&self, request: GenerationRequest) -> Result<String> {
        request.validate()?;

        let pending = {
            let mut state = self.state.lock();
            let active = state.admit(SessionKind::Sync)?;
            let session_id = active.id;
            let shared = self.state.clone();
            let submitted = self.worker.call(move |slot| run_sync(slot, shared, active, request));
            if submitted.is_err() {
                state.release(session_id);
            }
            submitted?
        };

        pending.wait().await?
    }

    /// Start a streaming generation and return its session id immediately.
    ///
    /// Tokens, and then exactly one end or error event, are delivered through
    /// the [`EventSink`]. A cancelled session delivers nothing further.
    pub fn start_streaming(&self, request: GenerationRequest) -> Result<u64> {
        request.validate()?;

        let mut state = self.state.lock();
        let active = state.admit(SessionKind::Stream)?;
        let session_id = active.id;
        self.events.bind(session_id, active.cancel.clone());

        let shared = self.state.clone();
        let events = self.events.clone();
        if let Err(e) = self
            .worker
            .submit(move |slot| run_stream(slot, shared, events, active, request))
        {
            state.release(session_id);
            self.events.unbind(session_id);
            return Err(e);
        }

        if !self.events.has_subscriber() {
            debug!(session_id, "No event subscriber, tokens will be dropped");
        }
        info!(session_id, "Streaming generation started");
        Ok(session_id)
    }

    /// Cancel the active session, if any.
    ///
    /// Returns immediately. The slot is freed right away so a new generation
    /// can be accepted; it will only start running once the cancelled loop has
    /// exited on the worker.
    pub fn stop(&self) -> bool {
        let Some(active) = self.state.lock().take_session() else {
            return false;
        };
        self.events.revoke(&active.cancel);
        info!(session_id = active.id, kind = ?active.kind, "Generation stop requested");
        true
    }

    /// Id of the session currently holding the generation slot
    pub fn active_session(&self) -> Option<u64> {
        self.state.lock().session().map(|s| s.id)
    }
}

/// Frees the generation slot when a job ends, however it ends.
///
/// The slot is released before the terminal event goes out, so a caller
/// reacting to that event can start the next generation right away. For
/// streaming sessions the guard also guarantees a terminal event if the job
/// unwinds before sending one.
struct SessionGuard {
    state: SharedState,
    active: ActiveSession,
    events: Option<EventSink>,
    terminated: bool,
}

impl SessionGuard {
    fn finish(&mut self, event: Option<StreamEvent>) {
        self.state.lock().release(self.active.id);
        self.terminated = true;
        if let (Some(events), Some(event)) = (&self.events, event) {
            events.emit(&self.active.cancel, event);
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.state.lock().release(self.active.id);
        if let Some(events) = &self.events {
            if !self.terminated && std::thread::panicking() {
                events.emit(
                    &self.active.cancel,
                    StreamEvent::failure("generation aborted unexpectedly"),
                );
            }
            events.unbind(self.active.id);
        }
    }
}

fn engine_panicked<T>(panic: String) -> std::result::Result<T, EngineError> {
    error!(panic = %panic, "Engine panicked during generation");
    Err(EngineError::Generate(format!("engine panicked: {}", panic)))
}

fn run_sync(
    slot: &mut ModelSlot,
    state: SharedState,
    active: ActiveSession,
    request: GenerationRequest,
) -> Result<String> {
    let span = info_span!("generation", session_id = active.id, mode = "sync");
    let _enter = span.enter();

    let _guard = SessionGuard {
        state,
        active: active.clone(),
        events: None,
        terminated: false,
    };

    let Some(model) = slot.handle() else {
        return Err(BridgeError::ModelNotLoaded);
    };

    let mut session = GenerationSession::new(active.id, request, active.cancel);
    let mut output = String::new();
    let result = catch_panic(|| {
        session.run(model, |text| {
            output.push_str(text);
            true
        })
    })
    .unwrap_or_else(engine_panicked);

    match (result, session.state()) {
        (Ok(stats), SessionState::Completed) => {
            info!(tokens = stats.tokens, elapsed_ms = stats.elapsed.as_millis() as u64, "Generation completed");
            Ok(output)
        }
        (Ok(_), _) => {
            debug!("Generation cancelled");
            Err(BridgeError::GenerationFailed {
                message: "generation cancelled".to_string(),
            })
        }
        (Err(e), _) => {
            warn!(error = %e, "Generation failed");
            Err(BridgeError::GenerationFailed {
                message: e.to_string(),
            })
        }
    }
}

fn run_stream(
    slot: &mut ModelSlot,
    state: SharedState,
    events: EventSink,
    active: ActiveSession,
    request: GenerationRequest,
) {
    let span = info_span!("generation", session_id = active.id, mode = "stream");
    let _enter = span.enter();

    let mut guard = SessionGuard {
        state,
        active: active.clone(),
        events: Some(events.clone()),
        terminated: false,
    };

    let Some(model) = slot.handle() else {
        guard.finish(Some(StreamEvent::failure(BridgeError::ModelNotLoaded.to_string())));
        return;
    };

    let cancel = active.cancel.clone();
    let mut session = GenerationSession::new(active.id, request, active.cancel);
    let result = catch_panic(|| {
        session.run(model, |text| {
            events.emit(&cancel, StreamEvent::Token {
                text: text.to_string(),
            })
        })
    })
    .unwrap_or_else(engine_panicked);

    match result {
        Ok(stats) if session.state() == SessionState::Completed => {
            info!(tokens = stats.tokens, elapsed_ms = stats.elapsed.as_millis() as u64, "Stream completed");
            guard.finish(Some(StreamEvent::End));
        }
        Ok(stats) => {
            // Cancelled sessions end silently.
            guard.finish(None);
            info!(tokens = stats.tokens, "Stream cancelled");
        }
        Err(e) => {
            warn!(error = %e, "Stream failed");
            guard.finish(Some(StreamEvent::failure(e.to_string())));
        }
    }
}
