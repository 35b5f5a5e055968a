//! JSON-schema-like stream schemas.
//!
//! Schemas are resolved once per run and treated as immutable afterwards.
//! Only the pieces the sync core needs are modeled as typed fields; any
//! other JSON-schema keywords are carried through opaquely so they survive
//! a load/emit round trip.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors raised while loading or interpreting a stream schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Error reading a schema file
    #[error("Failed to read schema file: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing schema JSON
    #[error("Failed to parse schema JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The stream has no schema configured at all
    #[error("No schema configured for stream '{0}'")]
    Missing(String),
}

/// The `type` keyword of a field descriptor: a single type name or a
/// union such as `["string", "null"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeDescriptor {
    One(String),
    Many(Vec<String>),
}

impl TypeDescriptor {
    /// Whether the descriptor names (or includes) the given type.
    pub fn includes(&self, name: &str) -> bool {
        match self {
            TypeDescriptor::One(t) => t == name,
            TypeDescriptor::Many(ts) => ts.iter().any(|t| t == name),
        }
    }
}

/// Type descriptor for a single field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TypeDescriptor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Any other JSON-schema keywords, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FieldSchema {
    /// Whether this field holds timestamps (`"format": "date-time"`).
    pub fn is_datetime(&self) -> bool {
        self.format.as_deref() == Some("date-time")
    }
}

/// Schema for one stream: a mapping of field name to type descriptor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamSchema {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, FieldSchema>,

    /// Top-level keywords other than `properties` (typically `"type": "object"`).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StreamSchema {
    /// Load a schema from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Look up the descriptor for a single field.
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.properties.get(name)
    }

    /// Keep only the fields for which `keep` returns true.
    pub fn retain_fields<F: FnMut(&str) -> bool>(&mut self, mut keep: F) {
        self.properties.retain(|name, _| keep(name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_round_trip() {
        let json = serde_json::json!({
            "type": "object",
            "properties": {
                "id": {"type": "integer"},
                "updated_at": {"type": ["string", "null"], "format": "date-time"},
            }
        });
        let schema: StreamSchema = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(schema.properties.len(), 2);
        assert!(schema.field("updated_at").unwrap().is_datetime());
        assert!(!schema.field("id").unwrap().is_datetime());
        assert!(schema
            .field("updated_at")
            .unwrap()
            .kind
            .as_ref()
            .unwrap()
            .includes("null"));

        let back = serde_json::to_value(&schema).unwrap();
        assert_eq!(back, json);
    }

    #[test]
    fn test_retain_fields() {
        let mut schema: StreamSchema = serde_json::from_value(serde_json::json!({
            "properties": {"a": {"type": "string"}, "b": {"type": "string"}}
        }))
        .unwrap();
        schema.retain_fields(|name| name == "a");
        assert!(schema.field("a").is_some());
        assert!(schema.field("b").is_none());
    }
}
