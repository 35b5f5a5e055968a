//! Protocol message shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tap_core::{Record, StreamSchema};

/// One protocol message.
///
/// Serialized with a `type` tag, e.g.:
///
/// ```json
/// {"type": "RECORD", "stream": "users", "record": {"id": 1}, "time_extracted": "..."}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// Announces a stream's shape before its records.
    #[serde(rename = "SCHEMA")]
    Schema {
        stream: String,
        schema: StreamSchema,
        key_properties: Vec<String>,
        /// Empty when the stream has no replication key.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        bookmark_properties: Vec<String>,
    },

    /// One projected, extracted row.
    #[serde(rename = "RECORD")]
    Record {
        stream: String,
        record: Record,
        time_extracted: DateTime<Utc>,
    },

    /// A checkpoint of the full state tree. The downstream consumer is
    /// responsible for persisting the most recent one it has processed.
    #[serde(rename = "STATE")]
    State { value: Value },
}

impl Message {
    pub fn schema(
        stream: impl Into<String>,
        schema: StreamSchema,
        key_properties: Vec<String>,
        bookmark_properties: Vec<String>,
    ) -> Self {
        Message::Schema {
            stream: stream.into(),
            schema,
            key_properties,
            bookmark_properties,
        }
    }

    pub fn record(stream: impl Into<String>, record: Record) -> Self {
        Message::Record {
            stream: stream.into(),
            record,
            time_extracted: Utc::now(),
        }
    }

    pub fn state(value: Value) -> Self {
        Message::State { value }
    }
}
