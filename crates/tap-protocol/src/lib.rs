//! Protocol messages and output sinks for tap-sync.
//!
//! A sync run emits three message kinds — schema, record, state — each a
//! self-describing JSON object identified by a `type` tag. Messages go to
//! a [`MessageSink`] in real time, one per logical event; there is no
//! end-of-run batching.

mod message;
mod sink;

pub use message::Message;
pub use sink::{JsonLinesSink, MemorySink, MessageSink};

/// Errors raised while emitting messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Failed to write message: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize message: {0}")]
    Json(#[from] serde_json::Error),
}
