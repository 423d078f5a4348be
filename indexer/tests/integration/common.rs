use futures::TryStreamExt;
use indexer::IndexedTable;
use indexer::index::{IndexRecord, IndexStreamOptions};
use indexer::store::{KvStore, MemoryStore};
use indexer::table::{Record, Table};
use indexer::test_utils::fixtures::{by_type, load, shuffled, stuff, things};

pub const TYPE_INDEX: &str = "type";

/// A table holding `records` with a `type` index created before they were written.
pub async fn indexed_table(records: &[Record]) -> IndexedTable<MemoryStore> {
    let table = IndexedTable::with_defaults(Table::new(MemoryStore::new()));
    assert!(table.create_index(TYPE_INDEX, by_type).await);
    load(&table, &shuffled(records, 7)).await;

    table
}

pub async fn things_table() -> (IndexedTable<MemoryStore>, Vec<Record>) {
    let things = things();
    (indexed_table(&things).await, things)
}

pub async fn stuff_table() -> (IndexedTable<MemoryStore>, Vec<Record>) {
    let stuff = stuff();
    (indexed_table(&stuff).await, stuff)
}

/// Runs a keys-only query on the `type` index.
pub async fn query_keys<S: KvStore>(
    table: &IndexedTable<S>,
    value: &str,
    options: IndexStreamOptions,
) -> Vec<String> {
    table
        .create_index_stream(TYPE_INDEX, value, options.keys(true).values(false))
        .map_ok(|record| match record {
            IndexRecord::Key(key) => key,
            other => panic!("expected a key, got {other:?}"),
        })
        .try_collect()
        .await
        .unwrap()
}

/// Keys of `records` at the given positions.
pub fn keys_at(records: &[Record], positions: &[usize]) -> Vec<String> {
    positions.iter().map(|i| records[*i].key.clone()).collect()
}
