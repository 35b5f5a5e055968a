//! The sync orchestration loop.
//!
//! Drives one stream at a time: emits the schema message, walks the
//! stream's partitions strictly sequentially, interleaves record emission
//! with bookmark advancement and periodic state flushes, and finalizes
//! each partition's progress marker at clean end-of-partition.
//!
//! The state tree is shared across streams by reference; each stream
//! mutates only its own sub-entry, and streams are synced sequentially,
//! so no locking is involved. Concurrent stream syncs over one tree are
//! out of scope.

use serde_json::Value;
use tap_catalog::Catalog;
use tap_core::{PartitionContext, Record, ReplicationMethod, StreamDefinition};
use tap_protocol::{Message, MessageSink, ProtocolError};
use tap_state::{
    advance_bookmark, finalize_progress_marker, reset_progress_marker, SignpostCache, StateError,
    TapState,
};

use crate::source::{RecordSource, RecordStream as _};

/// Number of records between intermediate state messages, unless
/// configured otherwise.
pub const DEFAULT_STATE_MESSAGE_FREQUENCY: u64 = 10_000;

/// Errors that abort a stream's sync.
///
/// Modeled as tagged variants rather than opaque failures so callers can
/// pattern-match: a hit record limit is an intentional short-circuit and
/// gets different exit behavior than a true failure.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A sorted stream produced an out-of-order replication-key value.
    /// Carries the offending row's 1-based ordinal and partition context.
    #[error("sorting error detected on row #{ordinal}: {source}")]
    OrderingViolation {
        ordinal: u64,
        partition: Option<PartitionContext>,
        #[source]
        source: StateError,
    },

    /// The stream's record cap was reached. Intentional short-circuit for
    /// bounded test or sample runs.
    #[error("stream prematurely aborted: max record limit ({limit}) reached")]
    LimitReached { limit: u64 },

    /// An incremental or log-based stream has no replication key. A
    /// setup mistake, never retryable.
    #[error("no replication key configured for stream '{stream}' (replication method {method})")]
    MissingReplicationKey {
        stream: String,
        method: ReplicationMethod,
    },

    /// Bookmark comparison failed outside the ordering check (bad
    /// timestamp, incomparable types).
    #[error(transparent)]
    State(#[from] StateError),

    /// The output sink rejected a message.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Opaque extraction-source failure, propagated without
    /// interpretation.
    #[error("extraction source error: {0}")]
    Source(#[source] anyhow::Error),

    /// The state tree could not be rendered for a state message.
    #[error("failed to serialize state: {0}")]
    SerializeState(#[from] serde_json::Error),
}

/// Tunables for one sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Emit an intermediate state message every this many records.
    pub state_message_frequency: u64,

    /// Optional cap on records per stream, counted across partitions.
    pub max_records: Option<u64>,

    /// Fallback starting point for timestamp replication keys when no
    /// usable bookmark is persisted (RFC 3339).
    pub start_date: Option<String>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            state_message_frequency: DEFAULT_STATE_MESSAGE_FREQUENCY,
            max_records: None,
            start_date: None,
        }
    }
}

/// The resumption point for a (stream, partition): the persisted bookmark
/// value when it tracks the stream's current replication key, else the
/// configured start date for timestamp keys, else nothing.
pub fn starting_replication_value(
    state: &TapState,
    definition: &StreamDefinition,
    partition: Option<&PartitionContext>,
    start_date: Option<&str>,
) -> Option<Value> {
    let key = definition.replication_key.as_deref()?;
    if let Some(bookmark) = state.bookmark(&definition.name, partition) {
        if let Some(value) = bookmark.starting_value(key) {
            return Some(value.clone());
        }
    }
    if definition.is_timestamp_replication_key() {
        if let Some(date) = start_date {
            return Some(Value::String(date.to_string()));
        }
    }
    None
}

/// Orchestrates stream syncs against a shared state tree and output sink.
pub struct Syncer<'a> {
    catalog: Option<&'a Catalog>,
    options: SyncOptions,
    signposts: SignpostCache,
}

impl<'a> Syncer<'a> {
    pub fn new(catalog: Option<&'a Catalog>, options: SyncOptions) -> Self {
        Syncer {
            catalog,
            options,
            signposts: SignpostCache::new(),
        }
    }

    /// Sync every source in order, sharing one state tree.
    pub async fn sync_all(
        &mut self,
        sources: &mut [Box<dyn RecordSource>],
        state: &mut TapState,
        sink: &mut dyn MessageSink,
    ) -> Result<(), SyncError> {
        for source in sources {
            self.sync_stream(source.as_mut(), state, sink).await?;
        }
        Ok(())
    }

    /// Sync one stream. Returns the number of records emitted.
    ///
    /// On any fatal condition the final state message is still attempted,
    /// so the last emitted state always reflects fully-finalized progress
    /// and a restart resumes no later than the correct position.
    pub async fn sync_stream(
        &mut self,
        source: &mut dyn RecordSource,
        state: &mut TapState,
        sink: &mut dyn MessageSink,
    ) -> Result<u64, SyncError> {
        if let Some(catalog) = self.catalog {
            catalog.apply_to(source.definition_mut());
        }
        let definition = source.definition().clone();

        if !self
            .catalog
            .map(|c| c.is_selected(&definition.name))
            .unwrap_or(true)
        {
            tracing::info!("Skipping deselected stream '{}'", definition.name);
            return Ok(0);
        }

        tracing::info!(
            "Beginning {} sync of stream '{}'...",
            definition.replication_method(),
            definition.name
        );
        self.write_schema_message(&definition, sink)?;

        match self.sync_records(source, &definition, state, sink).await {
            Ok(rows_sent) => {
                tracing::info!(
                    "Completed '{}' sync ({} records).",
                    definition.name,
                    rows_sent
                );
                self.write_state_message(state, sink)?;
                Ok(rows_sent)
            }
            Err(err) => {
                // Best-effort durability on abort: partitions that were
                // cleanly finalized before the failure are still
                // checkpointed.
                if let Err(state_err) = self.write_state_message(state, sink) {
                    tracing::warn!(
                        "Failed to emit state message while aborting '{}' sync: {state_err}",
                        definition.name
                    );
                }
                Err(err)
            }
        }
    }

    async fn sync_records(
        &mut self,
        source: &mut dyn RecordSource,
        definition: &StreamDefinition,
        state: &mut TapState,
        sink: &mut dyn MessageSink,
    ) -> Result<u64, SyncError> {
        let partitions: Vec<Option<PartitionContext>> = match source.partitions() {
            Some(contexts) if !contexts.is_empty() => contexts.into_iter().map(Some).collect(),
            _ => {
                let known = state.partitions(&definition.name);
                if known.is_empty() {
                    vec![None]
                } else {
                    known.into_iter().map(Some).collect()
                }
            }
        };

        let mut rows_sent: u64 = 0;
        for partition in &partitions {
            let partition = partition.as_ref();
            reset_progress_marker(state.bookmark_mut(&definition.name, partition));
            let starting = starting_replication_value(
                state,
                definition,
                partition,
                self.options.start_date.as_deref(),
            );

            let mut records = source
                .records(partition, starting.as_ref())
                .await
                .map_err(SyncError::Source)?;

            while let Some(row) = records.next().await {
                let row = row.map_err(SyncError::Source)?;

                if let Some(limit) = self.options.max_records {
                    if rows_sent >= limit {
                        return Err(SyncError::LimitReached { limit });
                    }
                }
                // Flush happens before writing record N+1 rather than
                // after record N; the very first record never triggers
                // an early flush. Consumers may depend on this boundary.
                if rows_sent != 0 && (rows_sent - 1) % self.options.state_message_frequency == 0 {
                    self.write_state_message(state, sink)?;
                }

                let Some(mut record) = source.post_process(row, partition) else {
                    continue;
                };
                if let Some(catalog) = self.catalog {
                    catalog.project_record(&definition.name, &mut record);
                }
                sink.write(&Message::record(&definition.name, record.clone()))?;

                self.advance(source, definition, partition, &record, state)
                    .map_err(|err| self.tag_ordering_violation(err, rows_sent + 1, partition))?;
                rows_sent += 1;
            }

            finalize_progress_marker(state.bookmark_mut(&definition.name, partition));
        }
        Ok(rows_sent)
    }

    /// Turn an out-of-order state error into an [`SyncError::OrderingViolation`]
    /// carrying the offending row's ordinal and partition, logging it the
    /// way operators expect to find it.
    fn tag_ordering_violation(
        &self,
        err: SyncError,
        ordinal: u64,
        partition: Option<&PartitionContext>,
    ) -> SyncError {
        match err {
            SyncError::State(source @ StateError::OutOfOrder { .. }) => {
                let context = partition
                    .map(|p| format!(" Partition was {}.", Value::Object(p.clone())))
                    .unwrap_or_default();
                tracing::error!("Sorting error detected on row #{ordinal}.{context} {source}");
                SyncError::OrderingViolation {
                    ordinal,
                    partition: partition.cloned(),
                    source,
                }
            }
            other => other,
        }
    }

    /// Advance the partition's bookmark with the record just emitted.
    ///
    /// Full-table streams keep no bookmark; incremental and log-based
    /// streams require a replication key.
    fn advance(
        &mut self,
        source: &dyn RecordSource,
        definition: &StreamDefinition,
        partition: Option<&PartitionContext>,
        record: &Record,
        state: &mut TapState,
    ) -> Result<(), SyncError> {
        match definition.replication_method() {
            ReplicationMethod::FullTable => Ok(()),
            ReplicationMethod::Incremental | ReplicationMethod::LogBased => {
                let key = definition.replication_key.as_deref().ok_or_else(|| {
                    SyncError::MissingReplicationKey {
                        stream: definition.name.clone(),
                        method: definition.replication_method(),
                    }
                })?;
                // A field deselected by the catalog yields no candidate.
                let Some(candidate) = record.get(key) else {
                    return Ok(());
                };

                let signpost = self
                    .signposts
                    .get_or_compute(&definition.name, partition, || {
                        source.replication_key_signpost(partition)
                    });
                let bookmark = state.bookmark_mut(&definition.name, partition);
                advance_bookmark(
                    bookmark,
                    key,
                    candidate,
                    signpost.as_ref(),
                    definition.is_sorted,
                    definition.is_timestamp_replication_key(),
                )?;
                Ok(())
            }
        }
    }

    fn write_schema_message(
        &self,
        definition: &StreamDefinition,
        sink: &mut dyn MessageSink,
    ) -> Result<(), SyncError> {
        let schema = match self.catalog {
            Some(catalog) => catalog.selected_schema(&definition.name, &definition.schema),
            None => definition.schema.clone(),
        };
        let bookmark_properties: Vec<String> =
            definition.replication_key.iter().cloned().collect();
        sink.write(&Message::schema(
            &definition.name,
            schema,
            definition.primary_keys.clone(),
            bookmark_properties,
        ))?;
        Ok(())
    }

    fn write_state_message(
        &self,
        state: &TapState,
        sink: &mut dyn MessageSink,
    ) -> Result<(), SyncError> {
        let value = serde_json::to_value(state)?;
        sink.write(&Message::state(value))?;
        Ok(())
    }
}
