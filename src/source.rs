//! Extraction-source traits.
//!
//! A [`RecordSource`] is the orchestrator's only view of concrete
//! extraction logic: it describes one stream and produces its rows, one
//! partition at a time. The contract is deliberately narrow so new source
//! types only implement row production plus the optional hooks.

use async_trait::async_trait;
use serde_json::Value;
use tap_core::{PartitionContext, Record, StreamDefinition};
use tap_state::default_signpost;

/// One logical stream and the means to extract its rows.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// The stream's static definition.
    fn definition(&self) -> &StreamDefinition;

    /// Mutable access, used by the orchestrator to apply catalog
    /// overrides before sync starts.
    fn definition_mut(&mut self) -> &mut StreamDefinition;

    /// Explicit partition contexts, if the source partitions its stream.
    ///
    /// `None` falls back to the partitions already known in state, and
    /// then to a single unpartitioned pass.
    fn partitions(&self) -> Option<Vec<PartitionContext>> {
        None
    }

    /// Open a lazy row stream for one partition.
    ///
    /// `starting_value` is the resumption point derived from persisted
    /// state (or the configured start date): rows at or below it are
    /// already durable downstream and should not be produced again. No
    /// ordering guarantee is assumed beyond what the definition's
    /// `is_sorted` declares.
    async fn records(
        &mut self,
        partition: Option<&PartitionContext>,
        starting_value: Option<&Value>,
    ) -> anyhow::Result<Box<dyn RecordStream>>;

    /// Transform or drop a raw row before projection and emission.
    /// Returning `None` drops the row.
    fn post_process(&self, record: Record, _partition: Option<&PartitionContext>) -> Option<Record> {
        Some(record)
    }

    /// The ceiling the bookmark may advance to this pass, computed once
    /// per partition and frozen by the orchestrator.
    ///
    /// Override to cap bookmarks when only a partial set of records may
    /// be available.
    fn replication_key_signpost(&self, _partition: Option<&PartitionContext>) -> Option<Value> {
        default_signpost(self.definition().is_timestamp_replication_key())
    }
}

/// A lazy, possibly unbounded sequence of rows for one partition.
#[async_trait]
pub trait RecordStream: Send {
    /// The next row, or `None` when the partition is exhausted. Errors
    /// are source-specific and propagate uncaught.
    async fn next(&mut self) -> Option<anyhow::Result<Record>>;
}

/// Adapter for sources whose rows come from an ordinary iterator.
pub struct IterRecordStream<I> {
    iter: I,
}

impl<I> IterRecordStream<I>
where
    I: Iterator<Item = anyhow::Result<Record>> + Send,
{
    pub fn new(iter: I) -> Self {
        IterRecordStream { iter }
    }
}

#[async_trait]
impl<I> RecordStream for IterRecordStream<I>
where
    I: Iterator<Item = anyhow::Result<Record>> + Send,
{
    async fn next(&mut self) -> Option<anyhow::Result<Record>> {
        self.iter.next()
    }
}
