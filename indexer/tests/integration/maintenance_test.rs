use std::sync::Arc;

use config::shared::{IndexerConfig, MaintenanceConfig, MaintenancePolicy, RetryConfig};
use futures::TryStreamExt;
use indexer::IndexedTable;
use indexer::codec::{KeyValue, entry_key};
use indexer::error::ErrorKind;
use indexer::hooks::{ChangeKind, KeyScope};
use indexer::index::{DriftCause, Emitter, IndexRecord, IndexStreamOptions};
use indexer::store::MemoryStore;
use indexer::table::{Mutation, Table};
use indexer::test_utils::faulty_store::{Fault, FaultConfig, FaultInjectingStore, StoreMethod};
use indexer::test_utils::fixtures::by_type;
use indexer::test_utils::observer::RecordingObserver;
use serde_json::{Value, json};
use telemetry::init_test_tracing;
use tokio::sync::broadcast::error::TryRecvError;

use crate::common::{TYPE_INDEX, indexed_table, query_keys};

fn config(policy: MaintenancePolicy) -> IndexerConfig {
    IndexerConfig {
        maintenance: MaintenanceConfig {
            policy,
            retry: RetryConfig {
                max_attempts: 3,
                initial_delay_ms: 1,
                max_delay_ms: 2,
                backoff_factor: 2.0,
            },
        },
        ..IndexerConfig::default()
    }
}

async fn faulty_table(
    policy: MaintenancePolicy,
) -> (
    IndexedTable<FaultInjectingStore<MemoryStore>>,
    FaultInjectingStore<MemoryStore>,
) {
    let store = FaultInjectingStore::wrap(MemoryStore::new());
    let table = IndexedTable::new(Table::new(store.clone()), config(policy)).unwrap();
    table.create_index(TYPE_INDEX, by_type).await;

    (table, store)
}

#[tokio::test(flavor = "multi_thread")]
async fn updates_move_records_between_index_values_test() {
    init_test_tracing();
    let table = indexed_table(&[]).await;

    table.put("a", json!({"type": "toy"})).await.unwrap();
    table.put("a", json!({"type": "tool"})).await.unwrap();

    assert!(
        query_keys(&table, "toy", IndexStreamOptions::new())
            .await
            .is_empty()
    );
    assert_eq!(
        query_keys(&table, "tool", IndexStreamOptions::new()).await,
        vec!["a"]
    );

    // Losing the indexed field removes the entry.
    table.put("a", json!({"name": "untyped"})).await.unwrap();
    assert!(
        query_keys(&table, "tool", IndexStreamOptions::new())
            .await
            .is_empty()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn deletes_remove_index_entries_test() {
    init_test_tracing();
    let (table, things) = crate::common::things_table().await;
    let toy = things
        .iter()
        .find(|thing| thing.value["type"] == "toy")
        .unwrap();

    table.delete(toy.key.clone()).await.unwrap();

    let toys = query_keys(&table, "toy", IndexStreamOptions::new()).await;
    assert_eq!(toys.len(), 4);
    assert!(!toys.contains(&toy.key));

    // Deleting a missing key leaves the index alone.
    table.delete("missing").await.unwrap();
    assert_eq!(
        query_keys(&table, "toy", IndexStreamOptions::new())
            .await
            .len(),
        4
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn batches_maintain_every_index_test() {
    init_test_tracing();
    let table = indexed_table(&[]).await;
    let by_name = |_: &str, value: &Value, emit: &mut Emitter| emit.emit_json(&value["name"]);
    table.create_index("name", by_name).await;
    table.put("c", json!({"type": "toy", "name": "car"})).await.unwrap();

    table
        .batch(vec![
            Mutation::put("a", json!({"type": "toy", "name": "ball"})),
            Mutation::put("b", json!({"type": "tool", "name": "saw"})),
            Mutation::delete("c"),
        ])
        .await
        .unwrap();

    assert_eq!(
        query_keys(&table, "toy", IndexStreamOptions::new()).await,
        vec!["a"]
    );
    assert_eq!(
        query_keys(&table, "tool", IndexStreamOptions::new()).await,
        vec!["b"]
    );
    let cars: Vec<_> = table
        .create_index_stream("name", "car", IndexStreamOptions::new())
        .try_collect()
        .await
        .unwrap();
    assert!(cars.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn batches_writing_a_key_twice_index_the_last_value_test() {
    init_test_tracing();
    let table = indexed_table(&[]).await;

    table
        .batch(vec![
            Mutation::put("a", json!({"type": "toy"})),
            Mutation::put("a", json!({"type": "tool"})),
        ])
        .await
        .unwrap();
    assert!(
        query_keys(&table, "toy", IndexStreamOptions::new())
            .await
            .is_empty()
    );
    assert_eq!(
        query_keys(&table, "tool", IndexStreamOptions::new()).await,
        vec!["a"]
    );

    table
        .batch(vec![
            Mutation::put("b", json!({"type": "toy"})),
            Mutation::delete("b"),
        ])
        .await
        .unwrap();
    assert_eq!(table.get("b").await.unwrap(), None);
    assert!(
        query_keys(&table, "toy", IndexStreamOptions::new())
            .await
            .is_empty()
    );

    table
        .batch(vec![
            Mutation::delete("a"),
            Mutation::put("a", json!({"type": "toy"})),
        ])
        .await
        .unwrap();
    assert_eq!(
        query_keys(&table, "toy", IndexStreamOptions::new()).await,
        vec!["a"]
    );
    assert!(
        query_keys(&table, "tool", IndexStreamOptions::new())
            .await
            .is_empty()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn best_effort_keeps_writes_and_reports_drift_test() {
    init_test_tracing();
    let (table, store) = faulty_table(MaintenancePolicy::BestEffort).await;
    let mut drift = table.subscribe_drift();
    store
        .set_faults(FaultConfig::failing_writes_under(
            table.index_store().key_prefix(),
        ))
        .await;

    table.put("a", json!({"type": "toy"})).await.unwrap();

    assert_eq!(table.get("a").await.unwrap(), Some(json!({"type": "toy"})));
    assert_eq!(store.injected_faults(StoreMethod::Batch).await, 3);

    let report = drift.recv().await.unwrap();
    assert_eq!(report.index_name, TYPE_INDEX);
    assert_eq!(report.primary_key, "a");
    assert_eq!(report.cause, DriftCause::Change(ChangeKind::Put));
    assert_eq!(report.error.kind(), ErrorKind::StoreWriteFailed);

    store.clear_faults().await;
    assert!(
        query_keys(&table, "toy", IndexStreamOptions::new())
            .await
            .is_empty()
    );

    // A rebuild repairs the drift.
    table.update_index(TYPE_INDEX).await.unwrap();
    assert_eq!(
        query_keys(&table, "toy", IndexStreamOptions::new()).await,
        vec!["a"]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn strict_policy_rejects_writes_test() {
    init_test_tracing();
    let (table, store) = faulty_table(MaintenancePolicy::Strict).await;
    let mut drift = table.subscribe_drift();
    store
        .set_faults(FaultConfig::failing_writes_under(
            table.index_store().key_prefix(),
        ))
        .await;

    let err = table.put("a", json!({"type": "toy"})).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IndexWriteFailed);
    assert_eq!(table.get("a").await.unwrap(), None);

    let report = drift.recv().await.unwrap();
    assert_eq!(report.primary_key, "a");
}

#[tokio::test(flavor = "multi_thread")]
async fn transient_index_failures_are_retried_test() {
    init_test_tracing();
    let (table, store) = faulty_table(MaintenancePolicy::Strict).await;
    let mut drift = table.subscribe_drift();
    store
        .set_faults(FaultConfig {
            batch: Some(Fault::Times(2)),
            key_prefix: table.index_store().key_prefix().to_vec(),
            ..FaultConfig::default()
        })
        .await;

    table.put("a", json!({"type": "toy"})).await.unwrap();

    assert_eq!(store.injected_faults(StoreMethod::Batch).await, 2);
    assert!(matches!(drift.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(
        query_keys(&table, "toy", IndexStreamOptions::new()).await,
        vec!["a"]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn observers_see_changes_before_commit_test() {
    init_test_tracing();
    let table = indexed_table(&[]).await;
    let observer = RecordingObserver::new();
    let scope = KeyScope {
        gte: Some("b".to_string()),
        lt: Some("c".to_string()),
    };
    let id = table
        .table()
        .register_observer(Arc::new(observer.clone()), scope)
        .await;

    table.put("a", json!({"type": "toy"})).await.unwrap();
    table.put("b", json!({"type": "toy"})).await.unwrap();
    table.delete("b").await.unwrap();
    observer.notify_on_events(2).await.notified().await;

    let events = observer.events().await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, ChangeKind::Put);
    assert_eq!(events[1].kind, ChangeKind::Delete);
    assert!(events.iter().all(|event| event.key == "b"));

    // A rejecting observer aborts the write.
    observer.set_rejecting(true).await;
    let err = table.put("bb", json!({"type": "tool"})).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(table.get("bb").await.unwrap(), None);
    // The index change made before the rejection is rolled back.
    assert!(
        query_keys(&table, "tool", IndexStreamOptions::new())
            .await
            .is_empty()
    );

    assert!(table.table().unregister_observer(id).await);
    table.put("bb", json!({"type": "tool"})).await.unwrap();
    assert_eq!(observer.events().await.len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn sublevel_records_stay_out_of_parent_indexes_test() {
    init_test_tracing();
    let table = indexed_table(&[]).await;
    let child = IndexedTable::with_defaults(table.table().sublevel("child"));
    child.create_index(TYPE_INDEX, by_type).await;

    table.put("a", json!({"type": "toy"})).await.unwrap();
    child.put("b", json!({"type": "toy"})).await.unwrap();

    assert_eq!(
        query_keys(&table, "toy", IndexStreamOptions::new()).await,
        vec!["a"]
    );
    assert_eq!(
        query_keys(&child, "toy", IndexStreamOptions::new()).await,
        vec!["b"]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn strict_batch_failures_roll_back_earlier_index_changes_test() {
    init_test_tracing();
    let (table, store) = faulty_table(MaintenancePolicy::Strict).await;
    table.put("a", json!({"type": "toy"})).await.unwrap();

    let mut drift = table.subscribe_drift();
    let failing_entry = [
        table.index_store().key_prefix(),
        entry_key(TYPE_INDEX, &KeyValue::from("tool"), "b").as_slice(),
    ]
    .concat();
    store
        .set_faults(FaultConfig::failing_writes_under(&failing_entry))
        .await;

    let err = table
        .batch(vec![
            Mutation::put("a", json!({"type": "tool"})),
            Mutation::put("b", json!({"type": "tool"})),
        ])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IndexWriteFailed);
    store.clear_faults().await;

    assert_eq!(table.get("a").await.unwrap(), Some(json!({"type": "toy"})));
    assert_eq!(table.get("b").await.unwrap(), None);
    assert_eq!(
        query_keys(&table, "toy", IndexStreamOptions::new()).await,
        vec!["a"]
    );
    let tools: Vec<IndexRecord> = table
        .create_index_stream(TYPE_INDEX, "tool", IndexStreamOptions::new())
        .try_collect()
        .await
        .unwrap();
    assert!(tools.is_empty());

    let mut reported = Vec::new();
    while let Ok(report) = drift.try_recv() {
        reported.push(report.primary_key);
    }
    assert_eq!(reported, vec!["b"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_commits_roll_back_index_changes_test() {
    init_test_tracing();
    let (table, store) = faulty_table(MaintenancePolicy::BestEffort).await;
    table.put("a", json!({"type": "toy"})).await.unwrap();

    let mut drift = table.subscribe_drift();
    store
        .set_faults(FaultConfig::failing_writes_under(
            table.table().namespace().key_prefix(),
        ))
        .await;

    let err = table.put("a", json!({"type": "tool"})).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreWriteFailed);
    let err = table
        .batch(vec![
            Mutation::delete("a"),
            Mutation::put("b", json!({"type": "tool"})),
        ])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreWriteFailed);
    store.clear_faults().await;

    assert_eq!(table.get("a").await.unwrap(), Some(json!({"type": "toy"})));
    assert_eq!(
        query_keys(&table, "toy", IndexStreamOptions::new()).await,
        vec!["a"]
    );
    assert!(
        query_keys(&table, "tool", IndexStreamOptions::new())
            .await
            .is_empty()
    );
    assert!(matches!(drift.try_recv(), Err(TryRecvError::Empty)));
}
