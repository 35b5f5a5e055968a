//! The two-stage checkpoint operations.
//!
//! Candidates observed during a pass accumulate in a transient progress
//! marker; the marker is promoted into the durable bookmark only at clean
//! end-of-partition. A pass interrupted mid-stream never promotes, so the
//! last durable checkpoint is the last fully-finalized one.

use std::cmp::Ordering;

use serde_json::Value;

use crate::state::{Bookmark, ProgressMarker};
use crate::value::compare_replication_values;
use crate::StateError;

/// Discard any progress marker left over from a previous pass.
///
/// Called at the start of each partition's pass so comparisons start
/// fresh.
pub fn reset_progress_marker(bookmark: &mut Bookmark) {
    bookmark.progress_marker = None;
}

/// Advance the partition's progress marker with a newly observed
/// replication-key value.
///
/// - A candidate above `signpost` is ignored for bookmark purposes: the
///   cap only prevents the bookmark from overrunning the pass boundary,
///   the record itself is still emitted by the caller.
/// - For sorted streams, a candidate below the current marker maximum is
///   an ordering violation ([`StateError::OutOfOrder`]) and must abort the
///   partition's pass, because resumability depends on monotonic progress.
/// - Otherwise the marker becomes the maximum of itself and the candidate.
///
/// Nothing here is durable; see [`finalize_progress_marker`].
pub fn advance_bookmark(
    bookmark: &mut Bookmark,
    replication_key: &str,
    candidate: &Value,
    signpost: Option<&Value>,
    is_sorted: bool,
    is_timestamp: bool,
) -> Result<(), StateError> {
    if candidate.is_null() {
        return Ok(());
    }

    if let Some(ceiling) = signpost {
        if compare_replication_values(candidate, ceiling, is_timestamp)? == Ordering::Greater {
            tracing::debug!(
                "Ignoring replication key value {candidate} above signpost {ceiling}"
            );
            return Ok(());
        }
    }

    let marker = match &mut bookmark.progress_marker {
        Some(marker) if marker.replication_key == replication_key => marker,
        _ => {
            bookmark.progress_marker = Some(ProgressMarker {
                replication_key: replication_key.to_string(),
                value: candidate.clone(),
            });
            return Ok(());
        }
    };

    match compare_replication_values(candidate, &marker.value, is_timestamp)? {
        Ordering::Less if is_sorted => Err(StateError::OutOfOrder {
            current: marker.value.clone(),
            candidate: candidate.clone(),
        }),
        Ordering::Less => Ok(()),
        Ordering::Equal => Ok(()),
        Ordering::Greater => {
            marker.value = candidate.clone();
            Ok(())
        }
    }
}

/// Promote the progress marker into the durable bookmark and discard it.
///
/// Called only at clean end-of-partition. A bookmark with no marker (no
/// rows seen, or a full-table stream) is left untouched.
pub fn finalize_progress_marker(bookmark: &mut Bookmark) {
    if let Some(marker) = bookmark.progress_marker.take() {
        bookmark.replication_key = Some(marker.replication_key);
        bookmark.replication_key_value = Some(marker.value);
    }
}
