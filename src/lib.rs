//! tap-sync library
//!
//! The synchronization core of a data-extraction connector framework:
//! given a logical data stream, it drives extraction, tracks incremental
//! progress as bookmarks, and emits schema, record, and state messages to
//! a downstream consumer in real time.
//!
//! # Features
//!
//! - Incremental replication: per-stream and per-partition bookmarks with
//!   two-stage progress markers, so interruptions never expose an
//!   unverified position
//! - Signpost capping: per-pass frozen ceilings stop a bookmark from
//!   overrunning data fetched ahead of the cutoff
//! - Sort-order validation: sorted streams fail fast on out-of-order rows
//!   instead of silently risking skipped data on resume
//! - Catalog-driven selection: streams and fields can be deselected, and
//!   keys or replication methods overridden, without code changes
//! - Periodic checkpointing: intermediate state messages bound the
//!   re-extraction work lost on interruption
//!
//! # Writing a source
//!
//! Implement [`source::RecordSource`] for your stream type; the
//! orchestrator only needs a definition and a row stream per partition.
//! See [`jsonl::JsonlSource`] for a file-backed example.
//!
//! # CLI Usage
//!
//! ```bash
//! # Emit messages for all configured streams to stdout
//! tap-sync sync --config config.json --catalog catalog.json --state state.json
//!
//! # Bounded sample run
//! tap-sync sync --config config.json --max-records 100
//!
//! # Print a fully-selected catalog for the configured streams
//! tap-sync discover --config config.json
//! ```

pub mod config;
pub mod jsonl;
pub mod source;
pub mod sync;
pub mod testing;

pub use config::{JsonlStreamConfig, TapConfig};
pub use jsonl::JsonlSource;
pub use source::{IterRecordStream, RecordSource, RecordStream};
pub use sync::{
    starting_replication_value, SyncError, SyncOptions, Syncer, DEFAULT_STATE_MESSAGE_FREQUENCY,
};

// Re-export the member crates under their protocol roles.
pub use tap_catalog::{Catalog, CatalogEntry};
pub use tap_core::{
    PartitionContext, Record, ReplicationMethod, StreamDefinition, StreamSchema,
};
pub use tap_protocol::{JsonLinesSink, MemorySink, Message, MessageSink};
pub use tap_state::TapState;
