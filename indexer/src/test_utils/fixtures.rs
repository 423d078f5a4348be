//! Record sets used by the query tests.
//!
//! `things` are ten records with random keys, half typed `toy` and half `tool`. `stuff` are
//! ten records whose keys start with a sortable timestamp, one per year from 2010 to 2019,
//! typed `foo` or `bar`. Both are returned in key order of their index; insert them through
//! [`shuffled`] so tests do not depend on insertion order.

use chrono::{NaiveDate, NaiveDateTime};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::IndexedTable;
use crate::index::Emitter;
use crate::store::KvStore;
use crate::table::Record;

pub const THING_TYPES: [&str; 2] = ["toy", "tool"];

pub const STUFF_TYPES: [&str; 10] = [
    "foo", "foo", "bar", "foo", "bar", "bar", "bar", "bar", "foo", "foo",
];

/// Map function indexing records by their `type` field, when they have one.
pub fn by_type(_key: &str, value: &Value, emit: &mut Emitter) {
    if let Some(kind) = value.get("type") {
        emit.emit_json(kind);
    }
}

pub fn things() -> Vec<Record> {
    (0..10)
        .map(|i| Record {
            key: Uuid::new_v4().to_string(),
            value: json!({
                "type": THING_TYPES[i % 2],
                "name": format!("thing {i}"),
            }),
        })
        .collect()
}

/// Midnight of the given day.
pub fn date(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap()
}

/// Sortable key prefix for `at`: seconds precision left-padded to 16 digits, then
/// milliseconds left-padded to 4.
pub fn timestamp_key(at: NaiveDateTime) -> String {
    format!(
        "{:0>16}{:0>4}",
        at.format("%Y%m%d%H%M%S").to_string(),
        at.format("%3f").to_string()
    )
}

/// The `stuff` record of index `idx`, dated `{2010 + idx}-{idx + 1}-{idx + 1}`.
pub fn stuff() -> Vec<Record> {
    (0..10)
        .map(|i| {
            let at = date(2010 + i as i32, i as u32 + 1, i as u32 + 1);
            let suffix = Uuid::new_v4().to_string();

            Record {
                key: format!("{}-{}", timestamp_key(at), &suffix[..8]),
                value: json!({
                    "type": STUFF_TYPES[i],
                    "idx": i,
                    "date": at.to_string(),
                }),
            }
        })
        .collect()
}

/// Returns `records` in a random but reproducible order.
pub fn shuffled(records: &[Record], seed: u64) -> Vec<Record> {
    let mut records = records.to_vec();
    records.shuffle(&mut StdRng::seed_from_u64(seed));
    records
}

/// Writes `records` one by one.
pub async fn load<S: KvStore>(table: &IndexedTable<S>, records: &[Record]) {
    for record in records {
        table
            .put(record.key.clone(), record.value.clone())
            .await
            .unwrap();
    }
}

/// Keys of `records` whose `type` is `kind`, sorted.
pub fn keys_of_type(records: &[Record], kind: &str) -> Vec<String> {
    let mut keys: Vec<_> = records
        .iter()
        .filter(|record| record.value["type"] == kind)
        .map(|record| record.key.clone())
        .collect();
    keys.sort();
    keys
}
