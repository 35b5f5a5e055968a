//! Tap configuration loading.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tap_core::{ReplicationMethod, SchemaError, StreamDefinition, StreamSchema};

use crate::sync::SyncOptions;

/// Configuration for one run, loaded from a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TapConfig {
    /// Fallback starting point for timestamp replication keys (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,

    /// Records between intermediate state messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_message_frequency: Option<u64>,

    /// Cap on records per stream; hitting it aborts the sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_records: Option<u64>,

    /// The JSONL-backed streams this tap extracts.
    #[serde(default)]
    pub streams: Vec<JsonlStreamConfig>,

    /// Any other settings, kept for source-specific use.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TapConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path:?}"))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {path:?}"))
    }

    pub fn sync_options(&self) -> SyncOptions {
        let defaults = SyncOptions::default();
        SyncOptions {
            state_message_frequency: self
                .state_message_frequency
                .unwrap_or(defaults.state_message_frequency),
            max_records: self.max_records,
            start_date: self.start_date.clone(),
        }
    }
}

/// Configuration for one JSONL-backed stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonlStreamConfig {
    /// Stream name.
    pub name: String,

    /// A `.jsonl` file, or a directory whose `.jsonl` files become one
    /// partition each.
    pub path: PathBuf,

    /// Inline schema. Takes precedence over `schema_path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<StreamSchema>,

    /// Path to a JSON schema file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<PathBuf>,

    #[serde(default)]
    pub primary_keys: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forced_replication_method: Option<ReplicationMethod>,

    /// Whether rows in the files are ordered by the replication key.
    #[serde(default)]
    pub sorted: bool,
}

impl JsonlStreamConfig {
    /// Resolve the stream definition, loading the schema if needed.
    /// A stream without any schema is a configuration error.
    pub fn resolve_definition(&self) -> Result<StreamDefinition, SchemaError> {
        let schema = match (&self.schema, &self.schema_path) {
            (Some(schema), _) => schema.clone(),
            (None, Some(path)) => StreamSchema::from_file(path)?,
            (None, None) => return Err(SchemaError::Missing(self.name.clone())),
        };
        let mut definition = StreamDefinition::new(&self.name, schema);
        definition.primary_keys = self.primary_keys.clone();
        definition.replication_key = self.replication_key.clone();
        definition.forced_replication_method = self.forced_replication_method;
        definition.is_sorted = self.sorted;
        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parsing_and_options() {
        let config: TapConfig = serde_json::from_value(serde_json::json!({
            "start_date": "2024-01-01T00:00:00Z",
            "state_message_frequency": 500,
            "streams": [{
                "name": "users",
                "path": "data/users.jsonl",
                "schema": {"properties": {"id": {"type": "integer"}}},
                "replication_key": "id",
                "sorted": true
            }]
        }))
        .unwrap();

        let options = config.sync_options();
        assert_eq!(options.state_message_frequency, 500);
        assert_eq!(options.max_records, None);
        assert_eq!(options.start_date.as_deref(), Some("2024-01-01T00:00:00Z"));

        let definition = config.streams[0].resolve_definition().unwrap();
        assert_eq!(definition.name, "users");
        assert!(definition.is_sorted);
        assert_eq!(definition.replication_key.as_deref(), Some("id"));
    }

    #[test]
    fn test_stream_without_schema_is_a_config_error() {
        let stream: JsonlStreamConfig = serde_json::from_value(serde_json::json!({
            "name": "users",
            "path": "data/users.jsonl"
        }))
        .unwrap();
        assert!(matches!(
            stream.resolve_definition(),
            Err(SchemaError::Missing(_))
        ));
    }
}
