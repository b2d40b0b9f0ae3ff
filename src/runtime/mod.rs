//! Background worker and the controller state it shares with callers

mod state;
mod worker;

pub use state::ModelState;

pub(crate) use state::{ActiveSession, ControllerState, SessionKind, SharedState};
pub(crate) use worker::{catch_panic, Worker};
