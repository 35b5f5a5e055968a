//! Stream selection and metadata catalog for tap-sync.
//!
//! A catalog is an externally-supplied mapping of stream name to selection
//! and metadata overrides. It answers two questions for the orchestrator:
//! whether a stream is selected for output at all, and which of its fields
//! survive projection. Catalog-declared primary keys, replication key, and
//! forced replication method override the stream's configured values for
//! the remainder of the run.
//!
//! Absent entries mean "use stream defaults, fully selected".

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tap_core::{Record, ReplicationMethod, StreamDefinition, StreamSchema};

/// Errors raised while loading a catalog file.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse catalog JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Selection and metadata overrides for one stream.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Whether the stream is selected for output. Absent means selected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,

    /// Fields to keep in records and schema. Absent means all fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_fields: Option<BTreeSet<String>>,

    /// Primary key override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_properties: Option<Vec<String>>,

    /// Replication key override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,

    /// Replication method override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forced_replication_method: Option<ReplicationMethod>,
}

/// Catalog of per-stream selection metadata, loaded once before sync
/// begins.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub streams: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog::default()
    }

    /// Load a catalog from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn entry(&self, stream: &str) -> Option<&CatalogEntry> {
        self.streams.get(stream)
    }

    /// Whether a stream is selected for output. Streams without a catalog
    /// entry default to selected.
    pub fn is_selected(&self, stream: &str) -> bool {
        self.entry(stream)
            .and_then(|e| e.selected)
            .unwrap_or(true)
    }

    /// The stream's schema restricted to its selected fields.
    pub fn selected_schema(&self, stream: &str, schema: &StreamSchema) -> StreamSchema {
        let mut selected = schema.clone();
        if let Some(fields) = self.entry(stream).and_then(|e| e.selected_fields.as_ref()) {
            selected.retain_fields(|name| fields.contains(name));
        }
        selected
    }

    /// Drop any record field deselected in the catalog, in place.
    pub fn project_record(&self, stream: &str, record: &mut Record) {
        if let Some(fields) = self.entry(stream).and_then(|e| e.selected_fields.as_ref()) {
            record.retain(|name, _| fields.contains(name));
        }
    }

    /// Apply catalog overrides to a stream definition before sync starts.
    pub fn apply_to(&self, definition: &mut StreamDefinition) {
        let Some(entry) = self.entry(&definition.name) else {
            return;
        };
        if let Some(keys) = &entry.key_properties {
            tracing::debug!(
                "Catalog overrides primary keys for stream '{}'",
                definition.name
            );
            definition.primary_keys = keys.clone();
        }
        if let Some(key) = &entry.replication_key {
            tracing::debug!(
                "Catalog overrides replication key for stream '{}'",
                definition.name
            );
            definition.replication_key = Some(key.clone());
        }
        if let Some(method) = entry.forced_replication_method {
            tracing::debug!(
                "Catalog forces replication method {} for stream '{}'",
                method,
                definition.name
            );
            definition.forced_replication_method = Some(method);
        }
    }
}
