//! Generation sessions and the controller that runs them

mod controller;
mod session;

pub use controller::GenerationController;
