//! Per-pass frozen signposts.
//!
//! A signpost is a ceiling value the bookmark must never advance past
//! during one sync pass. It is computed once per (stream, partition) on
//! first use and the identical value is returned on every subsequent
//! lookup, so rows observed at different real times all compare against
//! the same ceiling.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value;
use tap_core::PartitionContext;

/// Default signpost rule: timestamp-typed replication keys are capped at
/// "now"; other keys get no ceiling (the engine trusts row order).
pub fn default_signpost(is_timestamp_replication_key: bool) -> Option<Value> {
    if is_timestamp_replication_key {
        return Some(Value::String(Utc::now().to_rfc3339()));
    }
    None
}

/// Memo table of frozen signposts, keyed by (stream, partition).
///
/// Built once per pass; populating an entry freezes it for the remainder
/// of the pass. A new pass starts with a new cache, which is the explicit
/// invalidation boundary.
#[derive(Debug, Default)]
pub struct SignpostCache {
    values: HashMap<(String, Option<String>), Option<Value>>,
}

impl SignpostCache {
    pub fn new() -> Self {
        SignpostCache::default()
    }

    /// The frozen signpost for a (stream, partition), computing it via
    /// `compute` on first access only.
    pub fn get_or_compute<F>(
        &mut self,
        stream: &str,
        partition: Option<&PartitionContext>,
        compute: F,
    ) -> Option<Value>
    where
        F: FnOnce() -> Option<Value>,
    {
        let key = (stream.to_string(), partition_key(partition));
        self.values.entry(key).or_insert_with(compute).clone()
    }
}

// serde_json maps are ordered, so serializing the context gives a
// canonical lookup key.
fn partition_key(partition: Option<&PartitionContext>) -> Option<String> {
    partition.map(|context| Value::Object(context.clone()).to_string())
}
