//! Type-aware comparison of replication-key values.

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset};
use serde_json::Value;

use crate::StateError;

/// Compare two replication-key values.
///
/// Timestamp-typed keys are compared chronologically after RFC 3339
/// parsing (so differing offsets compare by instant); numbers compare
/// numerically, strings lexicographically. Mixed or unsupported types are
/// an error rather than an arbitrary ordering, because a wrong comparison
/// could silently corrupt a bookmark.
pub fn compare_replication_values(
    left: &Value,
    right: &Value,
    is_timestamp: bool,
) -> Result<Ordering, StateError> {
    if is_timestamp {
        let l = parse_timestamp(left)?;
        let r = parse_timestamp(right)?;
        return Ok(l.cmp(&r));
    }

    match (left, right) {
        (Value::Number(l), Value::Number(r)) => {
            compare_numbers(l, r).ok_or_else(|| incomparable(left, right))
        }
        (Value::String(l), Value::String(r)) => Ok(l.cmp(r)),
        _ => Err(incomparable(left, right)),
    }
}

// Integers compare exactly; a lossy f64 comparison would make distinct
// values beyond 2^53 (nanosecond epochs, high sequence counters) compare
// equal, and an equal-looking row gets skipped on resume.
fn compare_numbers(left: &serde_json::Number, right: &serde_json::Number) -> Option<Ordering> {
    if let (Some(l), Some(r)) = (left.as_i64(), right.as_i64()) {
        return Some(l.cmp(&r));
    }
    if let (Some(l), Some(r)) = (left.as_u64(), right.as_u64()) {
        return Some(l.cmp(&r));
    }
    // A negative integer against a u64 outside the i64 range.
    if let (Some(l), Some(_)) = (left.as_i64(), right.as_u64()) {
        if l < 0 {
            return Some(Ordering::Less);
        }
    }
    if let (Some(_), Some(r)) = (left.as_u64(), right.as_i64()) {
        if r < 0 {
            return Some(Ordering::Greater);
        }
    }
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => l.partial_cmp(&r),
        _ => None,
    }
}

fn parse_timestamp(value: &Value) -> Result<DateTime<FixedOffset>, StateError> {
    let Value::String(s) = value else {
        return Err(StateError::NotATimestamp {
            value: value.clone(),
        });
    };
    DateTime::parse_from_rfc3339(s).map_err(|source| StateError::InvalidTimestamp {
        value: value.clone(),
        source,
    })
}

fn incomparable(left: &Value, right: &Value) -> StateError {
    StateError::Incomparable {
        left: left.clone(),
        right: right.clone(),
    }
}
