//! Bookmark state management for tap-sync.
//!
//! Tracks incremental replication progress per (stream, partition) pair.
//!
//! # Architecture
//!
//! This crate provides the checkpointing half of the sync core:
//! - [`TapState`] - the in-memory state tree, seeded from a previous run's
//!   persisted state and emitted as the run's durable artifact
//! - [`Bookmark`] - the per-partition replication position, plus transient
//!   progress markers that only exist during an open pass
//! - [`advance_bookmark`] / [`finalize_progress_marker`] - the two-stage
//!   checkpoint operations: candidates accumulate in a progress marker and
//!   are promoted into the durable bookmark only at clean end-of-partition
//! - [`SignpostCache`] - per-pass frozen ceilings that stop a bookmark from
//!   overrunning the moment the pass started
//!
//! The serialized state tree never contains progress markers or signposts;
//! those are transient and reconciled before any state is written out.

mod progress;
mod signpost;
mod state;
mod value;


pub use progress::{advance_bookmark, finalize_progress_marker, reset_progress_marker};
pub use signpost::{default_signpost, SignpostCache};
pub use state::{Bookmark, PartitionState, ProgressMarker, StreamState, TapState};
pub use value::compare_replication_values;

/// Errors raised by state and bookmark operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// A sorted stream produced a replication-key value below the current
    /// progress-marker maximum.
    #[error("out-of-order replication key value: current maximum is {current}, got {candidate}")]
    OutOfOrder {
        current: serde_json::Value,
        candidate: serde_json::Value,
    },

    /// Two replication-key values of incompatible types were compared.
    #[error("cannot compare replication key values {left} and {right}")]
    Incomparable {
        left: serde_json::Value,
        right: serde_json::Value,
    },

    /// A timestamp-typed replication key held a value that does not parse
    /// as an RFC 3339 timestamp.
    #[error("invalid timestamp in replication key value {value}: {source}")]
    InvalidTimestamp {
        value: serde_json::Value,
        source: chrono::ParseError,
    },

    /// A timestamp-typed replication key held a non-string value.
    #[error("expected an RFC 3339 timestamp string, got {value}")]
    NotATimestamp { value: serde_json::Value },

    /// The persisted state input could not be deserialized.
    #[error("failed to parse persisted state: {0}")]
    Parse(#[from] serde_json::Error),
}
