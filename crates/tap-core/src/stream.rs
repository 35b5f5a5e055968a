//! Stream definitions and replication methods.

use serde::{Deserialize, Serialize};

use crate::schema::StreamSchema;

/// How a stream replicates from its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplicationMethod {
    /// Re-extract every row on every run; no bookmark is kept.
    FullTable,
    /// Extract only rows whose replication key is newer than the bookmark.
    Incremental,
    /// Follow a change log; bookmark semantics match incremental.
    LogBased,
}

impl ReplicationMethod {
    pub fn as_str(&self) -> &str {
        match self {
            ReplicationMethod::FullTable => "FULL_TABLE",
            ReplicationMethod::Incremental => "INCREMENTAL",
            ReplicationMethod::LogBased => "LOG_BASED",
        }
    }
}

impl std::fmt::Display for ReplicationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The static description of one logical data stream.
///
/// Immutable once a sync begins, except for the fields a catalog may
/// overwrite before sync starts (primary keys, replication key, forced
/// replication method).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDefinition {
    /// Unique stream name.
    pub name: String,

    /// Field name to type descriptor mapping.
    pub schema: StreamSchema,

    /// Primary key fields, in order. May be empty.
    #[serde(default)]
    pub primary_keys: Vec<String>,

    /// Field used to detect "newer" records for incremental extraction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,

    /// Explicit replication method override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forced_replication_method: Option<ReplicationMethod>,

    /// Whether the source guarantees rows arrive in replication-key order.
    /// Enables additional ordering checks during sync.
    #[serde(default)]
    pub is_sorted: bool,
}

impl StreamDefinition {
    pub fn new(name: impl Into<String>, schema: StreamSchema) -> Self {
        StreamDefinition {
            name: name.into(),
            schema,
            primary_keys: Vec::new(),
            replication_key: None,
            forced_replication_method: None,
            is_sorted: false,
        }
    }

    /// The replication method to use: the forced override if set, else
    /// incremental when a replication key is configured, else full table.
    pub fn replication_method(&self) -> ReplicationMethod {
        if let Some(method) = self.forced_replication_method {
            return method;
        }
        if self.replication_key.is_some() {
            return ReplicationMethod::Incremental;
        }
        ReplicationMethod::FullTable
    }

    /// Whether the replication key holds timestamps, judged from the
    /// schema's type descriptor for that field.
    pub fn is_timestamp_replication_key(&self) -> bool {
        let Some(key) = &self.replication_key else {
            return false;
        };
        self.schema
            .field(key)
            .map(|f| f.is_datetime())
            .unwrap_or(false)
    }
}
