use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{BridgeError, Result};

/// Lifecycle state of the model slot as seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelState {
    Unloaded,
    Loading,
    Loaded,
    Unloading,
}

/// How a session reports its output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionKind {
    Sync,
    Stream,
}

#[derive(Debug, Clone)]
pub(crate) struct ActiveSession {
    pub id: u64,
    pub kind: SessionKind,
    pub cancel: CancellationToken,
}

/// State shared between the caller-facing managers and worker jobs.
///
/// Admission checks and job submission both happen while this lock is held,
/// so the worker queue order always matches the order of transitions here.
#[derive(Debug)]
pub(crate) struct ControllerState {
    model: ModelState,
    session: Option<ActiveSession>,
    // Bumped by every load/unload request. A lifecycle job only publishes its
    // final state if no later request superseded it.
    epoch: u64,
    next_session_id: u64,
}

pub(crate) type SharedState = Arc<Mutex<ControllerState>>;

impl ControllerState {
    pub fn shared() -> SharedState {
        Arc::new(Mutex::new(Self {
            model: ModelState::Unloaded,
            session: None,
            epoch: 0,
            next_session_id: 1,
        }))
    }

    pub fn model(&self) -> ModelState {
        self.model
    }

    pub fn session(&self) -> Option<&ActiveSession> {
        self.session.as_ref()
    }

    /// Record a lifecycle request and return its epoch
    pub fn begin_transition(&mut self, next: ModelState) -> u64 {
        self.epoch += 1;
        self.model = next;
        self.epoch
    }

    /// Publish the outcome of the lifecycle job started at `epoch`.
    ///
    /// Returns false if a later request has already taken over.
    pub fn finish_transition(&mut self, epoch: u64, outcome: ModelState) -> bool {
        if self.epoch != epoch {
            return false;
        }
        self.model = outcome;
        true
    }

    /// Reserve the single generation slot
    pub fn admit(&mut self, kind: SessionKind) -> Result<ActiveSession> {
        if self.model != ModelState::Loaded {
            return Err(BridgeError::ModelNotLoaded);
        }
        if let Some(active) = &self.session {
            return Err(BridgeError::GenerationInProgress {
                active_session: active.id,
            });
        }

        let session = ActiveSession {
            id: self.next_session_id,
            kind,
            cancel: CancellationToken::new(),
        };
        self.next_session_id += 1;
        self.session = Some(session.clone());
        Ok(session)
    }

    /// Detach the active session, if any. The caller is responsible for cancelling it.
    pub fn take_session(&mut self) -> Option<ActiveSession> {
        self.session.take()
    }

    /// Free the slot if it is still held by session `id`
    pub fn release(&mut self, id: u64) {
        if self.session.as_ref().is_some_and(|s| s.id == id) {
            self.session = None;
        }
    }
}
