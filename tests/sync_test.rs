//! End-to-end tests for the sync orchestration loop, using in-memory
//! sources and sinks.

use chrono::{Duration, Utc};
use serde_json::json;
use tap_catalog::{Catalog, CatalogEntry};
use tap_core::{ReplicationMethod, StreamDefinition, StreamSchema};
use tap_protocol::{MemorySink, Message};
use tap_state::TapState;
use tap_sync::sync::{SyncError, SyncOptions, Syncer};
use tap_sync::testing::{partition, record, StaticSource};

fn schema(value: serde_json::Value) -> StreamSchema {
    serde_json::from_value(value).unwrap()
}

fn incremental_definition(name: &str, key: &str, sorted: bool) -> StreamDefinition {
    let mut definition = StreamDefinition::new(
        name,
        schema(json!({
            "properties": {
                "id": {"type": "integer"},
                key: {"type": "integer"},
            }
        })),
    );
    definition.primary_keys = vec!["id".to_string()];
    definition.replication_key = Some(key.to_string());
    definition.is_sorted = sorted;
    definition
}

fn timestamp_definition(name: &str) -> StreamDefinition {
    let mut definition = StreamDefinition::new(
        name,
        schema(json!({
            "properties": {
                "id": {"type": "integer"},
                "updated_at": {"type": "string", "format": "date-time"},
            }
        })),
    );
    definition.replication_key = Some("updated_at".to_string());
    definition
}

#[tokio::test]
async fn test_full_table_sync_emits_records_but_no_bookmark() {
    let definition = StreamDefinition::new(
        "logs",
        schema(json!({"properties": {"id": {"type": "integer"}}})),
    );
    let rows = (0..100).map(|i| record(json!({"id": i}))).collect();
    let mut source = StaticSource::new(definition).with_rows(None, rows);

    let mut state = TapState::new();
    let mut sink = MemorySink::new();
    let mut syncer = Syncer::new(None, SyncOptions::default());
    let sent = syncer
        .sync_stream(&mut source, &mut state, &mut sink)
        .await
        .unwrap();

    assert_eq!(sent, 100);
    assert_eq!(sink.records("logs").len(), 100);
    // No replication key: the bookmark entry stays empty.
    assert!(state.bookmark("logs", None).unwrap().is_empty());

    // Schema first, then the final state message reflects the empty tree.
    assert!(matches!(sink.messages[0], Message::Schema { .. }));
    let last_state = (*sink.states().last().unwrap()).clone();
    assert_eq!(last_state, json!({"bookmarks": {"logs": {}}}));
}

#[tokio::test]
async fn test_sorted_stream_fails_on_third_row() {
    let definition = incremental_definition("events", "seq", true);
    let rows = vec![
        record(json!({"id": 1, "seq": 1})),
        record(json!({"id": 2, "seq": 3})),
        record(json!({"id": 3, "seq": 2})),
    ];
    let mut source = StaticSource::new(definition).with_rows(None, rows);

    let mut state = TapState::new();
    let mut sink = MemorySink::new();
    let mut syncer = Syncer::new(None, SyncOptions::default());
    let err = syncer
        .sync_stream(&mut source, &mut state, &mut sink)
        .await
        .unwrap_err();

    match err {
        SyncError::OrderingViolation {
            ordinal, partition, ..
        } => {
            assert_eq!(ordinal, 3);
            assert!(partition.is_none());
        }
        other => panic!("expected OrderingViolation, got {other:?}"),
    }

    // The failed pass was never finalized, so the durable bookmark is
    // still empty.
    assert!(state.bookmark("events", None).unwrap().is_empty());
}

#[tokio::test]
async fn test_sorted_stream_accepts_ordered_rows() {
    let definition = incremental_definition("events", "seq", true);
    let rows = (1..=3).map(|i| record(json!({"id": i, "seq": i}))).collect();
    let mut source = StaticSource::new(definition).with_rows(None, rows);

    let mut state = TapState::new();
    let mut sink = MemorySink::new();
    let mut syncer = Syncer::new(None, SyncOptions::default());
    syncer
        .sync_stream(&mut source, &mut state, &mut sink)
        .await
        .unwrap();

    assert_eq!(
        state
            .bookmark("events", None)
            .unwrap()
            .replication_key_value,
        Some(json!(3))
    );
}

#[tokio::test]
async fn test_periodic_state_message_cadence() {
    let definition = incremental_definition("events", "seq", false);
    let rows = (1..=7).map(|i| record(json!({"id": i, "seq": i}))).collect();
    let mut source = StaticSource::new(definition).with_rows(None, rows);

    let mut state = TapState::new();
    let mut sink = MemorySink::new();
    let options = SyncOptions {
        state_message_frequency: 3,
        ..Default::default()
    };
    let mut syncer = Syncer::new(None, options);
    syncer
        .sync_stream(&mut source, &mut state, &mut sink)
        .await
        .unwrap();

    // Two intermediate state messages plus the final one.
    assert_eq!(sink.states().len(), 3);

    // The flush fires before writing the next record, never before the
    // first: schema, R1, S, R2, R3, R4, S, R5, R6, R7, S.
    let kinds: Vec<&str> = sink
        .messages
        .iter()
        .map(|m| match m {
            Message::Schema { .. } => "schema",
            Message::Record { .. } => "record",
            Message::State { .. } => "state",
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            "schema", "record", "state", "record", "record", "record", "state", "record",
            "record", "record", "state"
        ]
    );
}

#[tokio::test]
async fn test_signpost_caps_bookmark_but_not_emission() {
    let definition = timestamp_definition("users");
    let past = (Utc::now() - Duration::hours(1)).to_rfc3339();
    let future = (Utc::now() + Duration::hours(1)).to_rfc3339();
    let rows = vec![
        record(json!({"id": 1, "updated_at": past})),
        record(json!({"id": 2, "updated_at": future})),
    ];
    let mut source = StaticSource::new(definition).with_rows(None, rows);

    let mut state = TapState::new();
    let mut sink = MemorySink::new();
    let mut syncer = Syncer::new(None, SyncOptions::default());
    syncer
        .sync_stream(&mut source, &mut state, &mut sink)
        .await
        .unwrap();

    // The row past the frozen "now" ceiling is still emitted...
    assert_eq!(sink.records("users").len(), 2);
    // ...but the durable bookmark never overruns it.
    assert_eq!(
        state.bookmark("users", None).unwrap().replication_key_value,
        Some(json!(past))
    );
}

#[tokio::test]
async fn test_partitions_advance_independent_bookmarks() {
    let definition = incremental_definition("accounts", "seq", true);
    let a = partition(json!({"id": "a"}));
    let b = partition(json!({"id": "b"}));
    // Partition b syncs cleanly first; partition a then violates order.
    let mut source = StaticSource::new(definition)
        .with_rows(
            Some(b.clone()),
            vec![
                record(json!({"id": 1, "seq": 1})),
                record(json!({"id": 2, "seq": 2})),
            ],
        )
        .with_rows(
            Some(a.clone()),
            vec![
                record(json!({"id": 3, "seq": 1})),
                record(json!({"id": 4, "seq": 3})),
                record(json!({"id": 5, "seq": 2})),
            ],
        );

    let mut state = TapState::new();
    let mut sink = MemorySink::new();
    let mut syncer = Syncer::new(None, SyncOptions::default());
    let err = syncer
        .sync_stream(&mut source, &mut state, &mut sink)
        .await
        .unwrap_err();

    match err {
        SyncError::OrderingViolation {
            ordinal, partition, ..
        } => {
            // Ordinal counts across the whole stream.
            assert_eq!(ordinal, 5);
            assert_eq!(partition, Some(a.clone()));
        }
        other => panic!("expected OrderingViolation, got {other:?}"),
    }

    // b's already-finalized bookmark is intact; a's was never promoted.
    assert_eq!(
        state
            .bookmark("accounts", Some(&b))
            .unwrap()
            .replication_key_value,
        Some(json!(2))
    );
    assert!(state.bookmark("accounts", Some(&a)).unwrap().is_empty());

    // Best-effort state message on abort still reflects b's progress.
    let last_state = (*sink.states().last().unwrap()).clone();
    assert_eq!(
        last_state["bookmarks"]["accounts"]["partitions"][0]["replication_key_value"],
        json!(2)
    );
}

#[tokio::test]
async fn test_record_limit_aborts_with_distinct_error() {
    let definition = incremental_definition("events", "seq", false);
    let rows = (1..=5).map(|i| record(json!({"id": i, "seq": i}))).collect();
    let mut source = StaticSource::new(definition).with_rows(None, rows);

    let mut state = TapState::new();
    let mut sink = MemorySink::new();
    let options = SyncOptions {
        max_records: Some(3),
        ..Default::default()
    };
    let mut syncer = Syncer::new(None, options);
    let err = syncer
        .sync_stream(&mut source, &mut state, &mut sink)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::LimitReached { limit: 3 }));
    assert_eq!(sink.records("events").len(), 3);
}

#[tokio::test]
async fn test_rerun_with_carried_state_emits_no_records() {
    let rows: Vec<_> = (1..=3).map(|i| record(json!({"id": i, "seq": i}))).collect();

    let mut state = TapState::new();
    let mut sink = MemorySink::new();
    let mut syncer = Syncer::new(None, SyncOptions::default());
    let mut source = StaticSource::new(incremental_definition("events", "seq", false))
        .with_rows(None, rows.clone())
        .respecting_starting_value();
    let first = syncer
        .sync_stream(&mut source, &mut state, &mut sink)
        .await
        .unwrap();
    assert_eq!(first, 3);

    // Seed a fresh run from the final emitted state, the way a consumer
    // would persist and return it.
    let persisted = (*sink.states().last().unwrap()).clone();
    let mut state = TapState::from_value(persisted).unwrap();
    let mut sink = MemorySink::new();
    let mut syncer = Syncer::new(None, SyncOptions::default());
    let mut source = StaticSource::new(incremental_definition("events", "seq", false))
        .with_rows(None, rows)
        .respecting_starting_value();
    let second = syncer
        .sync_stream(&mut source, &mut state, &mut sink)
        .await
        .unwrap();

    assert_eq!(second, 0);
    // Bookmark survives a pass that saw no rows.
    assert_eq!(
        state
            .bookmark("events", None)
            .unwrap()
            .replication_key_value,
        Some(json!(3))
    );
}

#[tokio::test]
async fn test_catalog_deselects_streams_and_fields() {
    let mut catalog = Catalog::new();
    catalog.streams.insert(
        "skipped".to_string(),
        CatalogEntry {
            selected: Some(false),
            ..Default::default()
        },
    );
    catalog.streams.insert(
        "users".to_string(),
        CatalogEntry {
            selected_fields: Some(["id".to_string(), "seq".to_string()].into()),
            ..Default::default()
        },
    );

    let mut state = TapState::new();
    let mut sink = MemorySink::new();
    let mut syncer = Syncer::new(Some(&catalog), SyncOptions::default());

    // Deselected stream: nothing at all is emitted.
    let mut skipped = StaticSource::new(incremental_definition("skipped", "seq", false))
        .with_rows(None, vec![record(json!({"id": 1, "seq": 1}))]);
    let sent = syncer
        .sync_stream(&mut skipped, &mut state, &mut sink)
        .await
        .unwrap();
    assert_eq!(sent, 0);
    assert!(sink.messages.is_empty());

    // Selected stream: deselected fields are dropped from records and
    // the schema message.
    let mut definition = incremental_definition("users", "seq", false);
    definition.schema = serde_json::from_value(json!({
        "properties": {
            "id": {"type": "integer"},
            "seq": {"type": "integer"},
            "secret": {"type": "string"},
        }
    }))
    .unwrap();
    let mut users = StaticSource::new(definition)
        .with_rows(None, vec![record(json!({"id": 1, "seq": 1, "secret": "x"}))]);
    syncer
        .sync_stream(&mut users, &mut state, &mut sink)
        .await
        .unwrap();

    match &sink.messages[0] {
        Message::Schema { schema, .. } => {
            assert!(schema.field("id").is_some());
            assert!(schema.field("secret").is_none());
        }
        other => panic!("expected schema message, got {other:?}"),
    }
    match sink.records("users")[0] {
        Message::Record { record, .. } => {
            assert!(record.contains_key("seq"));
            assert!(!record.contains_key("secret"));
        }
        other => panic!("expected record message, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_replication_key_is_fatal() {
    let mut definition = StreamDefinition::new(
        "broken",
        schema(json!({"properties": {"id": {"type": "integer"}}})),
    );
    definition.forced_replication_method = Some(ReplicationMethod::Incremental);
    let mut source =
        StaticSource::new(definition).with_rows(None, vec![record(json!({"id": 1}))]);

    let mut state = TapState::new();
    let mut sink = MemorySink::new();
    let mut syncer = Syncer::new(None, SyncOptions::default());
    let err = syncer
        .sync_stream(&mut source, &mut state, &mut sink)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::MissingReplicationKey { .. }));
}

#[tokio::test]
async fn test_start_date_seeds_starting_value() {
    let definition = timestamp_definition("users");
    let old = "2023-12-31T00:00:00+00:00";
    let new = "2024-06-01T00:00:00+00:00";
    let rows = vec![
        record(json!({"id": 1, "updated_at": old})),
        record(json!({"id": 2, "updated_at": new})),
    ];
    let mut source = StaticSource::new(definition)
        .with_rows(None, rows)
        .respecting_starting_value();

    let mut state = TapState::new();
    let mut sink = MemorySink::new();
    let options = SyncOptions {
        start_date: Some("2024-01-01T00:00:00Z".to_string()),
        ..Default::default()
    };
    let mut syncer = Syncer::new(None, options);
    let sent = syncer
        .sync_stream(&mut source, &mut state, &mut sink)
        .await
        .unwrap();

    // Only the row after the start date is extracted.
    assert_eq!(sent, 1);
    assert_eq!(
        state.bookmark("users", None).unwrap().replication_key_value,
        Some(json!(new))
    );
}
