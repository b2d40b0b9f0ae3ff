//! Ordered delivery of token events to a single subscriber

mod sink;
mod stream;

pub use sink::EventSink;
pub use stream::EventStream;
