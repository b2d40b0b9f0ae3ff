//! Process-scoped entry point tying the components together

mod bridge;
mod builder;

pub use bridge::InferenceBridge;
pub use builder::BridgeBuilder;
