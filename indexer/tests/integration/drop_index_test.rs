use futures::TryStreamExt;
use indexer::codec::index_prefix;
use indexer::index::{Emitter, IndexStreamOptions};
use indexer::store::{KeyRange, scan};
use indexer::table::TableRange;
use indexer::test_utils::fixtures::{by_type, keys_of_type};
use serde_json::{Value, json};
use telemetry::init_test_tracing;

use crate::common::{TYPE_INDEX, query_keys, things_table};

#[tokio::test(flavor = "multi_thread")]
async fn drop_removes_entries_and_maintenance_test() {
    init_test_tracing();
    let (table, _) = things_table().await;

    assert_eq!(table.drop_index(TYPE_INDEX).await.unwrap(), 10);
    assert!(table.index_names().await.is_empty());
    assert!(
        query_keys(&table, "tool", IndexStreamOptions::new())
            .await
            .is_empty()
    );

    // Later writes no longer touch the dropped index.
    table.put("late", json!({"type": "tool"})).await.unwrap();
    let entries: Vec<_> = scan(
        table.index_store().clone(),
        KeyRange::prefixed(&index_prefix(TYPE_INDEX)),
        None,
        16,
    )
    .try_collect()
    .await
    .unwrap();
    assert!(entries.is_empty());

    // Records are untouched.
    let records: Vec<_> = table
        .read_stream(TableRange::all())
        .try_collect()
        .await
        .unwrap();
    assert_eq!(records.len(), 11);
}

#[tokio::test(flavor = "multi_thread")]
async fn dropped_names_can_be_recreated_test() {
    init_test_tracing();
    let (table, things) = things_table().await;

    table.drop_index(TYPE_INDEX).await.unwrap();
    assert!(table.create_index(TYPE_INDEX, by_type).await);
    table.update_index(TYPE_INDEX).await.unwrap();

    assert_eq!(
        query_keys(&table, "tool", IndexStreamOptions::new()).await,
        keys_of_type(&things, "tool")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn drop_leaves_other_indexes_alone_test() {
    init_test_tracing();
    let (table, things) = things_table().await;
    let by_name = |_: &str, value: &Value, emit: &mut Emitter| emit.emit_json(&value["name"]);
    table.create_index("name", by_name).await;
    table.update_index("name").await.unwrap();

    table.drop_index("name").await.unwrap();

    assert_eq!(
        query_keys(&table, "toy", IndexStreamOptions::new()).await,
        keys_of_type(&things, "toy")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn clear_keeps_the_index_registered_test() {
    init_test_tracing();
    let (table, _) = things_table().await;

    assert_eq!(table.clear_index(TYPE_INDEX).await.unwrap(), 10);
    assert!(
        query_keys(&table, "toy", IndexStreamOptions::new())
            .await
            .is_empty()
    );
    assert_eq!(table.index_names().await, vec![TYPE_INDEX.to_string()]);

    table.put("late", json!({"type": "toy"})).await.unwrap();
    assert_eq!(
        query_keys(&table, "toy", IndexStreamOptions::new()).await,
        vec!["late"]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn dropping_unknown_index_is_a_no_op_test() {
    init_test_tracing();
    let (table, _) = things_table().await;

    assert_eq!(table.drop_index("color").await.unwrap(), 0);
    assert_eq!(table.index_names().await, vec![TYPE_INDEX.to_string()]);
    assert_eq!(table.index_store().store().len().await, 20);
}
