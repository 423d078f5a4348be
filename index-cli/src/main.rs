//! Loads records from a JSON file into an in-memory table, indexes them by one field and
//! prints the result of a single index query as JSON lines.

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::Parser;
use config::load_config;
use config::shared::IndexerConfig;
use futures::TryStreamExt;
use indexer::IndexedTable;
use indexer::codec::KeyValue;
use indexer::index::{Emitter, IndexRecord, IndexStreamOptions};
use indexer::store::MemoryStore;
use indexer::table::{Mutation, Table};
use serde_json::{Map, Value, json};
use telemetry::init_tracing;
use tracing::{info, warn};

const INDEX_NAME: &str = "cli";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file holding an object that maps record keys to record values.
    #[arg(long)]
    records: PathBuf,

    /// JSON pointer of the indexed field, e.g. `/type`.
    #[arg(long)]
    field: String,

    /// Index value to look up. Parsed as JSON when possible, used as a string otherwise.
    #[arg(long)]
    value: String,

    /// Only return records whose key is greater than this one.
    #[arg(long)]
    gt: Option<String>,

    /// Only return records whose key is greater than or equal to this one.
    #[arg(long)]
    gte: Option<String>,

    /// Only return records whose key is less than this one.
    #[arg(long)]
    lt: Option<String>,

    /// Only return records whose key is less than or equal to this one.
    #[arg(long)]
    lte: Option<String>,

    /// Return records in descending key order.
    #[arg(long)]
    reverse: bool,

    /// Maximum number of index entries to read. Zero means no limit.
    #[arg(long)]
    limit: Option<usize>,

    /// Print only the record keys.
    #[arg(long, conflicts_with = "values_only")]
    keys_only: bool,

    /// Print only the record values.
    #[arg(long)]
    values_only: bool,
}

impl Args {
    fn stream_options(&self) -> IndexStreamOptions {
        let mut options = IndexStreamOptions::new()
            .reverse(self.reverse)
            .keys(!self.values_only)
            .values(!self.keys_only);

        options.gt = self.gt.clone();
        options.gte = self.gte.clone();
        options.lt = self.lt.clone();
        options.lte = self.lte.clone();
        options.limit = self.limit;

        options
    }

    fn index_value(&self) -> Result<KeyValue, Box<dyn Error>> {
        let value = serde_json::from_str(&self.value)
            .unwrap_or_else(|_| Value::String(self.value.clone()));

        Ok(KeyValue::try_from(&value)?)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing(env!("CARGO_CRATE_NAME"))?;

    main_impl(Args::parse()).await
}

async fn main_impl(args: Args) -> Result<(), Box<dyn Error>> {
    let config = load_indexer_config()?;
    let table = IndexedTable::new(Table::new(MemoryStore::new()), config)?;

    let pointer = args.field.clone();
    table
        .create_index(INDEX_NAME, move |_: &str, value: &Value, emit: &mut Emitter| {
            if let Some(field) = value.pointer(&pointer) {
                emit.emit_json(field);
            }
        })
        .await;

    let records = read_records(&args.records).await?;
    let count = records.len();
    table
        .batch(
            records
                .into_iter()
                .map(|(key, value)| Mutation::put(key, value))
                .collect(),
        )
        .await?;
    info!(records = count, field = %args.field, "records loaded");

    let mut results =
        table.create_index_stream(INDEX_NAME, args.index_value()?, args.stream_options());
    while let Some(record) = results.try_next().await? {
        println!("{}", render(record));
    }

    info!(
        emitted = results.emitted(),
        skipped = results.skipped(),
        "query finished"
    );

    Ok(())
}

/// Loads the configuration, falling back to the defaults when there is no configuration
/// directory.
fn load_indexer_config() -> Result<IndexerConfig, Box<dyn Error>> {
    match load_config::<IndexerConfig>() {
        Ok(config) => {
            config.validate()?;
            Ok(config)
        }
        Err(err) if err.is_missing_directory() => {
            warn!(error = %err, "using the default indexer configuration");
            Ok(IndexerConfig::default())
        }
        Err(err) => Err(err.into()),
    }
}

async fn read_records(path: &Path) -> Result<Map<String, Value>, Box<dyn Error>> {
    let contents = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&contents)?)
}

fn render(record: IndexRecord) -> Value {
    match record {
        IndexRecord::Entry { key, value } => json!({ "key": key, "value": value }),
        IndexRecord::Key(key) => Value::String(key),
        IndexRecord::Value(value) => value,
    }
}
