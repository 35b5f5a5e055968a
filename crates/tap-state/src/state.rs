//! The in-memory state tree.
//!
//! The serialized shape mirrors the persisted-state input so a previous
//! run's output seeds the next run directly:
//!
//! ```json
//! {
//!     "bookmarks": {
//!         "users": {
//!             "replication_key": "updated_at",
//!             "replication_key_value": "2024-01-01T00:00:00Z",
//!             "partitions": [
//!                 {"context": {"account_id": "123"}, "replication_key_value": 42}
//!             ]
//!         }
//!     }
//! }
//! ```
//!
//! Progress markers are deliberately not serialized: the state tree as
//! written to output reflects only finalized progress.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tap_core::PartitionContext;

use crate::StateError;

/// Transient, not-yet-durable candidate bookmark value tracked while a
/// partition's pass is open.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressMarker {
    /// The replication key the marker tracks.
    pub replication_key: String,
    /// The maximum replication-key value observed so far this pass.
    pub value: Value,
}

/// Durable replication position for one (stream, partition) pair.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Bookmark {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key_value: Option<Value>,

    /// In-flight progress for the current pass. Never serialized.
    #[serde(skip)]
    pub progress_marker: Option<ProgressMarker>,
}

impl Bookmark {
    /// The persisted value to resume from, provided the bookmark tracked
    /// the same replication key the stream is configured with now.
    pub fn starting_value(&self, replication_key: &str) -> Option<&Value> {
        if self.replication_key.as_deref() == Some(replication_key) {
            return self.replication_key_value.as_ref();
        }
        None
    }

    /// Whether the bookmark has recorded any durable position.
    pub fn is_empty(&self) -> bool {
        self.replication_key.is_none() && self.replication_key_value.is_none()
    }
}

/// Bookmark for one named partition of a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionState {
    pub context: PartitionContext,

    #[serde(flatten)]
    pub bookmark: Bookmark,
}

/// State for one stream: a stream-level bookmark plus any partition-level
/// bookmarks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamState {
    #[serde(flatten)]
    pub bookmark: Bookmark,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partitions: Vec<PartitionState>,
}

/// The full state tree for a run.
///
/// Created once per sync run, seeded from the previous run's persisted
/// state, mutated throughout the pass. Entries are created lazily and
/// never removed. The tree itself never writes to external storage;
/// persistence of the emitted state message is the downstream consumer's
/// job.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TapState {
    #[serde(default)]
    pub bookmarks: BTreeMap<String, StreamState>,
}

impl TapState {
    pub fn new() -> Self {
        TapState::default()
    }

    /// Seed the tree from an opaque persisted-state value.
    pub fn from_value(value: Value) -> Result<Self, StateError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Read-only access to a stream's state, if it exists yet.
    pub fn stream(&self, stream: &str) -> Option<&StreamState> {
        self.bookmarks.get(stream)
    }

    /// Writable state for a stream, created empty on first access.
    pub fn stream_mut(&mut self, stream: &str) -> &mut StreamState {
        self.bookmarks.entry(stream.to_string()).or_default()
    }

    /// Read-only access to the bookmark for a (stream, partition) pair.
    pub fn bookmark(&self, stream: &str, partition: Option<&PartitionContext>) -> Option<&Bookmark> {
        let stream_state = self.bookmarks.get(stream)?;
        match partition {
            None => Some(&stream_state.bookmark),
            Some(context) => stream_state
                .partitions
                .iter()
                .find(|p| &p.context == context)
                .map(|p| &p.bookmark),
        }
    }

    /// Writable bookmark for a (stream, partition) pair, created empty on
    /// first access. Exactly one bookmark exists per pair; lookups for a
    /// known partition always return the same entry.
    pub fn bookmark_mut(
        &mut self,
        stream: &str,
        partition: Option<&PartitionContext>,
    ) -> &mut Bookmark {
        let stream_state = self.stream_mut(stream);
        match partition {
            None => &mut stream_state.bookmark,
            Some(context) => {
                let index = stream_state
                    .partitions
                    .iter()
                    .position(|p| &p.context == context);
                let index = match index {
                    Some(i) => i,
                    None => {
                        stream_state.partitions.push(PartitionState {
                            context: context.clone(),
                            bookmark: Bookmark::default(),
                        });
                        stream_state.partitions.len() - 1
                    }
                };
                &mut stream_state.partitions[index].bookmark
            }
        }
    }

    /// Partition contexts already represented in state for a stream.
    ///
    /// Used as the default partition enumeration for streams without an
    /// explicit partition list.
    pub fn partitions(&self, stream: &str) -> Vec<PartitionContext> {
        self.bookmarks
            .get(stream)
            .map(|s| s.partitions.iter().map(|p| p.context.clone()).collect())
            .unwrap_or_default()
    }
}
