use config::shared::IndexerConfig;
use indexer::IndexedTable;
use indexer::codec::{KeyValue, entry_key};
use indexer::error::ErrorKind;
use indexer::index::IndexStreamOptions;
use indexer::store::{KvStore, MemoryStore};
use indexer::table::Table;
use indexer::test_utils::fixtures::{by_type, keys_of_type, load, things};
use telemetry::init_test_tracing;

use crate::common::{TYPE_INDEX, query_keys, things_table};

#[tokio::test(flavor = "multi_thread")]
async fn update_rebuilds_from_every_record_test() {
    init_test_tracing();
    let (table, things) = things_table().await;

    let summary = table.update_index(TYPE_INDEX).await.unwrap();
    assert_eq!(summary.cleared, 10);
    assert_eq!(summary.records_scanned, 10);
    assert_eq!(summary.entries_written, 10);

    assert_eq!(
        query_keys(&table, "tool", IndexStreamOptions::new()).await,
        keys_of_type(&things, "tool")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn update_removes_stale_entries_test() {
    init_test_tracing();
    let (table, things) = things_table().await;

    table
        .index_store()
        .put(
            entry_key(TYPE_INDEX, &KeyValue::from("tool"), "ghost"),
            b"ghost".to_vec(),
        )
        .await
        .unwrap();

    let summary = table.update_index(TYPE_INDEX).await.unwrap();
    assert_eq!(summary.cleared, 11);
    assert_eq!(summary.entries_written, 10);

    assert_eq!(
        query_keys(&table, "tool", IndexStreamOptions::new()).await,
        keys_of_type(&things, "tool")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn update_skips_undecodable_records_test() {
    init_test_tracing();
    let (table, _) = things_table().await;
    table
        .table()
        .namespace()
        .put(b"broken".to_vec(), b"{not json".to_vec())
        .await
        .unwrap();

    let summary = table.update_index(TYPE_INDEX).await.unwrap();
    assert_eq!(summary.records_scanned, 11);
    assert_eq!(summary.entries_written, 10);
}

#[tokio::test(flavor = "multi_thread")]
async fn update_spans_several_pages_test() {
    init_test_tracing();
    let config = IndexerConfig {
        scan_page_size: 3,
        ..IndexerConfig::default()
    };
    let table = IndexedTable::new(Table::new(MemoryStore::new()), config).unwrap();
    let things = things();
    load(&table, &things).await;
    table.create_index(TYPE_INDEX, by_type).await;

    let summary = table.update_index(TYPE_INDEX).await.unwrap();
    assert_eq!(summary.cleared, 0);
    assert_eq!(summary.entries_written, 10);
    assert_eq!(
        query_keys(&table, "toy", IndexStreamOptions::new()).await,
        keys_of_type(&things, "toy")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn update_of_unknown_index_fails_test() {
    init_test_tracing();
    let (table, _) = things_table().await;

    let err = table.update_index("color").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownIndex);
}
