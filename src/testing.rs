//! In-memory sources for tests.

use async_trait::async_trait;
use serde_json::Value;
use tap_core::{PartitionContext, Record, StreamDefinition};
use tap_state::{compare_replication_values, default_signpost};

use crate::source::{IterRecordStream, RecordSource, RecordStream};

/// A [`RecordSource`] over fixed in-memory rows.
pub struct StaticSource {
    definition: StreamDefinition,
    partitions: Option<Vec<PartitionContext>>,
    rows: Vec<(Option<PartitionContext>, Vec<Record>)>,
    signpost: Option<Value>,
    respect_starting_value: bool,
}

impl StaticSource {
    pub fn new(definition: StreamDefinition) -> Self {
        StaticSource {
            definition,
            partitions: None,
            rows: Vec::new(),
            signpost: None,
            respect_starting_value: false,
        }
    }

    /// Add rows for one partition (`None` for the unpartitioned stream).
    pub fn with_rows(mut self, partition: Option<PartitionContext>, rows: Vec<Record>) -> Self {
        if let Some(context) = &partition {
            self.partitions
                .get_or_insert_with(Vec::new)
                .push(context.clone());
        }
        self.rows.push((partition, rows));
        self
    }

    /// Freeze a custom signpost instead of the default rule.
    pub fn with_signpost(mut self, signpost: Value) -> Self {
        self.signpost = Some(signpost);
        self
    }

    /// Filter out rows at or below the starting value, like a real
    /// incremental source resuming from a bookmark.
    pub fn respecting_starting_value(mut self) -> Self {
        self.respect_starting_value = true;
        self
    }
}

#[async_trait]
impl RecordSource for StaticSource {
    fn definition(&self) -> &StreamDefinition {
        &self.definition
    }

    fn definition_mut(&mut self) -> &mut StreamDefinition {
        &mut self.definition
    }

    fn partitions(&self) -> Option<Vec<PartitionContext>> {
        self.partitions.clone()
    }

    async fn records(
        &mut self,
        partition: Option<&PartitionContext>,
        starting_value: Option<&Value>,
    ) -> anyhow::Result<Box<dyn RecordStream>> {
        let mut rows = self
            .rows
            .iter()
            .find(|(context, _)| context.as_ref() == partition)
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default();

        if self.respect_starting_value {
            if let (Some(key), Some(starting)) =
                (self.definition.replication_key.clone(), starting_value)
            {
                let is_timestamp = self.definition.is_timestamp_replication_key();
                rows.retain(|row| match row.get(&key) {
                    Some(value) => {
                        compare_replication_values(value, starting, is_timestamp)
                            .map(|o| o == std::cmp::Ordering::Greater)
                            .unwrap_or(true)
                    }
                    None => true,
                });
            }
        }

        Ok(Box::new(IterRecordStream::new(rows.into_iter().map(Ok))))
    }

    fn replication_key_signpost(&self, _partition: Option<&PartitionContext>) -> Option<Value> {
        self.signpost
            .clone()
            .or_else(|| default_signpost(self.definition.is_timestamp_replication_key()))
    }
}

/// Build a [`Record`] from a JSON object literal.
pub fn record(value: Value) -> Record {
    value
        .as_object()
        .expect("test record must be a JSON object")
        .clone()
}

/// Build a [`PartitionContext`] from a JSON object literal.
pub fn partition(value: Value) -> PartitionContext {
    value
        .as_object()
        .expect("test partition must be a JSON object")
        .clone()
}
