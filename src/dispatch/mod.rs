//! Named command vocabulary and its dispatch onto the bridge

mod command;
mod dispatcher;

pub use command::{Command, MethodCall};
pub use dispatcher::{CommandDispatcher, CommandError, CommandHandler, CommandResult};
