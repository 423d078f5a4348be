use futures::TryStreamExt;
use indexer::IndexedTable;
use indexer::index::{Emitter, IndexStreamOptions};
use indexer::store::MemoryStore;
use indexer::table::Table;
use indexer::test_utils::fixtures::{by_type, keys_of_type, load, things};
use serde_json::{Value, json};
use telemetry::init_test_tracing;

use crate::common::{TYPE_INDEX, query_keys};

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_index_names_are_rejected_test() {
    init_test_tracing();
    let table = IndexedTable::with_defaults(Table::new(MemoryStore::new()));

    assert!(table.create_index(TYPE_INDEX, by_type).await);
    let other = |_: &str, _: &Value, emit: &mut Emitter| emit.emit("other");
    assert!(!table.create_index(TYPE_INDEX, other).await);
    assert_eq!(table.index_names().await, vec![TYPE_INDEX.to_string()]);

    // The first definition is still the one maintaining the index.
    table.put("a", json!({"type": "toy"})).await.unwrap();
    assert_eq!(
        query_keys(&table, "toy", IndexStreamOptions::new()).await,
        vec!["a"]
    );
    assert!(
        query_keys(&table, "other", IndexStreamOptions::new())
            .await
            .is_empty()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn existing_records_are_not_indexed_until_update_test() {
    init_test_tracing();
    let table = IndexedTable::with_defaults(Table::new(MemoryStore::new()));
    let things = things();
    load(&table, &things).await;

    table.create_index(TYPE_INDEX, by_type).await;
    assert!(
        query_keys(&table, "tool", IndexStreamOptions::new())
            .await
            .is_empty()
    );

    table.update_index(TYPE_INDEX).await.unwrap();
    assert_eq!(
        query_keys(&table, "tool", IndexStreamOptions::new()).await,
        keys_of_type(&things, "tool")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn map_functions_can_emit_several_values_test() {
    init_test_tracing();
    let table = IndexedTable::with_defaults(Table::new(MemoryStore::new()));
    table
        .create_index("tag", |_: &str, value: &Value, emit: &mut Emitter| {
            if let Some(tags) = value["tags"].as_array() {
                for tag in tags {
                    emit.emit_json(tag);
                }
            }
        })
        .await;

    table
        .put("a", json!({"tags": ["red", "blue", "red"]}))
        .await
        .unwrap();
    table.put("b", json!({"tags": ["blue"]})).await.unwrap();
    table.put("c", json!({"name": "untagged"})).await.unwrap();

    let blue: Vec<_> = table
        .create_index_stream("tag", "blue", IndexStreamOptions::new().values(false))
        .try_collect()
        .await
        .unwrap();
    assert_eq!(blue.len(), 2);

    // Duplicate emits of one value produce a single entry.
    let red: Vec<_> = table
        .create_index_stream("tag", "red", IndexStreamOptions::new())
        .try_collect()
        .await
        .unwrap();
    assert_eq!(red.len(), 1);
    assert_eq!(red[0].key(), Some("a"));
}

#[tokio::test(flavor = "multi_thread")]
async fn non_string_index_values_are_queryable_test() {
    init_test_tracing();
    let table = IndexedTable::with_defaults(Table::new(MemoryStore::new()));
    table
        .create_index("rank", |_: &str, value: &Value, emit: &mut Emitter| {
            emit.emit_json(&value["rank"])
        })
        .await;

    table.put("a", json!({"rank": 1})).await.unwrap();
    table.put("b", json!({"rank": 2})).await.unwrap();
    table.put("c", json!({"rank": "1"})).await.unwrap();

    let ranked: Vec<_> = table
        .create_index_stream("rank", 1i64, IndexStreamOptions::new().values(false))
        .try_collect()
        .await
        .unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].key(), Some("a"));
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_indexes_stay_empty_test() {
    init_test_tracing();
    let table = IndexedTable::with_defaults(Table::new(MemoryStore::new()));
    assert!(table.create_empty_index("nothing").await);
    load(&table, &things()).await;

    let summary = table.update_index("nothing").await.unwrap();
    assert_eq!(summary.records_scanned, 10);
    assert_eq!(summary.entries_written, 0);
    assert_eq!(table.index_names().await, vec!["nothing".to_string()]);
}
