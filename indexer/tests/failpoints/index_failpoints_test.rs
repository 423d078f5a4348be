use config::shared::{IndexerConfig, MaintenanceConfig, MaintenancePolicy, RetryConfig};
use futures::TryStreamExt;
use indexer::IndexedTable;
use indexer::error::ErrorKind;
use indexer::failpoints::{INDEX_MAINTENANCE__BEFORE_WRITE, INDEX_REBUILD__BEFORE_WRITE};
use indexer::index::{DriftCause, IndexStreamOptions};
use indexer::store::MemoryStore;
use indexer::table::Table;
use indexer::test_utils::failpoints::IndexFailScenario;
use indexer::test_utils::fixtures::{by_type, load, things};
use serde_json::json;
use telemetry::init_test_tracing;

fn indexed_table(policy: MaintenancePolicy) -> IndexedTable<MemoryStore> {
    let config = IndexerConfig {
        maintenance: MaintenanceConfig {
            policy,
            retry: RetryConfig::no_retry(),
        },
        ..IndexerConfig::default()
    };

    IndexedTable::new(Table::new(MemoryStore::new()), config).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn injected_maintenance_fault_is_reported_as_drift() {
    init_test_tracing();
    let table = indexed_table(MaintenancePolicy::BestEffort);
    table.create_index("type", by_type).await;
    let mut drift = table.subscribe_drift();

    let _scenario = IndexFailScenario::setup(&[(INDEX_MAINTENANCE__BEFORE_WRITE, "return")]);
    table.put("a", json!({"type": "toy"})).await.unwrap();

    let report = drift.recv().await.unwrap();
    assert_eq!(report.error.kind(), ErrorKind::InjectedFault);
    assert_eq!(table.get("a").await.unwrap(), Some(json!({"type": "toy"})));
}

#[tokio::test(flavor = "multi_thread")]
async fn injected_maintenance_fault_fails_strict_writes() {
    init_test_tracing();
    let table = indexed_table(MaintenancePolicy::Strict);
    table.create_index("type", by_type).await;

    let _scenario = IndexFailScenario::setup(&[(INDEX_MAINTENANCE__BEFORE_WRITE, "return")]);
    let err = table.put("a", json!({"type": "toy"})).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::IndexWriteFailed);
    assert_eq!(table.get("a").await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread")]
async fn injected_rebuild_fault_fails_strict_update() {
    init_test_tracing();
    let table = indexed_table(MaintenancePolicy::Strict);
    load(&table, &things()).await;
    table.create_index("type", by_type).await;
    let mut drift = table.subscribe_drift();

    let scenario = IndexFailScenario::setup(&[(INDEX_REBUILD__BEFORE_WRITE, "return")]);
    let err = table.update_index("type").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IndexWriteFailed);
    assert_eq!(drift.recv().await.unwrap().cause, DriftCause::Rebuild);

    scenario.disable(INDEX_REBUILD__BEFORE_WRITE);
    let summary = table.update_index("type").await.unwrap();
    assert_eq!(summary.entries_written, 10);
}

#[tokio::test(flavor = "multi_thread")]
async fn injected_rebuild_fault_is_skipped_when_best_effort() {
    init_test_tracing();
    let table = indexed_table(MaintenancePolicy::BestEffort);
    load(&table, &things()).await;
    table.create_index("type", by_type).await;

    let _scenario = IndexFailScenario::setup(&[(INDEX_REBUILD__BEFORE_WRITE, "return")]);
    let summary = table.update_index("type").await.unwrap();

    assert_eq!(summary.records_scanned, 10);
    assert_eq!(summary.entries_written, 0);

    let found: Vec<_> = table
        .create_index_stream("type", "toy", IndexStreamOptions::new())
        .try_collect()
        .await
        .unwrap();
    assert!(found.is_empty());
}
