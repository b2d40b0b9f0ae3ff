//! Logging setup and host queries

mod logging;
mod system;

pub use logging::{setup_logging, LogConfig};
pub use system::total_ram_bytes;
