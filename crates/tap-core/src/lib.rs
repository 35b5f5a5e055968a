//! Core types for the tap-sync framework.
//!
//! This crate provides the foundational types used across the sync
//! framework, including:
//!
//! - [`StreamDefinition`] - The static description of a logical data stream
//! - [`ReplicationMethod`] - How a stream replicates (full table, incremental, log based)
//! - [`StreamSchema`] / [`FieldSchema`] - JSON-schema-like field descriptors
//! - [`Record`] / [`PartitionContext`] - Row and partition-key mappings
//!
//! # Architecture
//!
//! The tap-core crate sits at the foundation of the framework:
//!
//! ```text
//! tap-core (this crate)
//!    │
//!    ├─── tap-state     (bookmarks keyed by stream/partition)
//!    ├─── tap-catalog   (selection metadata per stream)
//!    ├─── tap-protocol  (schema/record/state messages)
//!    └─── tap-sync      (orchestrator and concrete sources)
//! ```

pub mod schema;
pub mod stream;

pub use schema::{FieldSchema, SchemaError, StreamSchema, TypeDescriptor};
pub use stream::{ReplicationMethod, StreamDefinition};

/// A single extracted row: property name to JSON value.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// An opaque key-value mapping identifying a sub-scope of a stream,
/// e.g. `{"account_id": "123"}`. `None` at the call sites means the
/// whole stream is one partition.
pub type PartitionContext = serde_json::Map<String, serde_json::Value>;
