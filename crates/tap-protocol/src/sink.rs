//! Output sinks.

use std::io::Write;

use crate::{Message, ProtocolError};

/// Append-only destination for protocol messages.
pub trait MessageSink {
    fn write(&mut self, message: &Message) -> Result<(), ProtocolError>;
}

/// Writes one JSON object per line, flushed per message so the consumer
/// sees every event in real time.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesSink { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> MessageSink for JsonLinesSink<W> {
    fn write(&mut self, message: &Message) -> Result<(), ProtocolError> {
        serde_json::to_writer(&mut self.writer, message)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Collects messages in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub messages: Vec<Message>,
}

impl MemorySink {
    pub fn new() -> Self {
        MemorySink::default()
    }

    /// The emitted record messages for one stream.
    pub fn records(&self, stream: &str) -> Vec<&Message> {
        self.messages
            .iter()
            .filter(|m| matches!(m, Message::Record { stream: s, .. } if s == stream))
            .collect()
    }

    /// The emitted state message payloads, in order.
    pub fn states(&self) -> Vec<&serde_json::Value> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Message::State { value } => Some(value),
                _ => None,
            })
            .collect()
    }
}

impl MessageSink for MemorySink {
    fn write(&mut self, message: &Message) -> Result<(), ProtocolError> {
        self.messages.push(message.clone());
        Ok(())
    }
}
