use config::shared::{IndexerConfig, MaintenancePolicy};
use futures::StreamExt;
use tracing::{info, warn};

use crate::codec::index_prefix;
use crate::concurrency::retry::retry_with_backoff;
use crate::error::{ErrorKind, IndexResult};
use crate::failpoints::{INDEX_REBUILD__BEFORE_WRITE, index_fail_point};
use crate::index::definition::IndexDefinition;
use crate::index::drift::{DriftCause, DriftReporter, IndexDrift};
use crate::index_error;
use crate::store::{BatchOp, KeyRange, KvStore, Namespace, delete_range, scan};
use crate::table::decode_record;

/// Outcome of a completed rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildSummary {
    /// Entries removed before rebuilding.
    pub cleared: usize,
    /// Primary records read, including the ones that failed to decode.
    pub records_scanned: usize,
    /// Entries written.
    pub entries_written: usize,
}

/// Removes every entry of the index called `name` and returns how many were removed.
pub async fn clear_entries<S: KvStore>(
    index_store: &Namespace<S>,
    name: &str,
    page_size: usize,
) -> IndexResult<usize> {
    delete_range(index_store, KeyRange::prefixed(&index_prefix(name)), page_size).await
}

/// Clears the index of `definition`, then re-indexes every record of `primary`.
///
/// The scan starts only after the clear has completed. Entries are written in batches of
/// `scan_page_size`; records that cannot be decoded are skipped.
pub async fn rebuild_index<S: KvStore>(
    definition: &IndexDefinition,
    primary: &Namespace<S>,
    index_store: &Namespace<S>,
    config: &IndexerConfig,
    drift: &DriftReporter,
) -> IndexResult<RebuildSummary> {
    let name = definition.name();
    let page_size = config.scan_page_size;

    let mut summary = RebuildSummary {
        cleared: clear_entries(index_store, name, page_size).await?,
        ..RebuildSummary::default()
    };

    let mut records = scan(primary.clone(), KeyRange::default(), None, page_size);
    let mut pending = Vec::with_capacity(page_size);

    while let Some(entry) = records.next().await {
        summary.records_scanned += 1;

        let record = match decode_record(entry?) {
            Ok(record) => record,
            Err(err) => {
                warn!(index = name, error = %err, "skipping undecodable record during rebuild");
                continue;
            }
        };

        for entry_key in definition.entry_keys(&record.key, &record.value) {
            pending.push(BatchOp::Put {
                key: entry_key,
                value: record.key.clone().into_bytes(),
            });
        }

        if pending.len() >= page_size {
            let batch = std::mem::take(&mut pending);
            summary.entries_written += write_batch(name, index_store, batch, config, drift).await?;
        }
    }

    if !pending.is_empty() {
        summary.entries_written += write_batch(name, index_store, pending, config, drift).await?;
    }

    info!(
        index = name,
        cleared = summary.cleared,
        records_scanned = summary.records_scanned,
        entries_written = summary.entries_written,
        "index rebuilt"
    );

    Ok(summary)
}

/// Writes one batch, returning the number of entries written.
async fn write_batch<S: KvStore>(
    name: &str,
    index_store: &Namespace<S>,
    batch: Vec<BatchOp>,
    config: &IndexerConfig,
    drift: &DriftReporter,
) -> IndexResult<usize> {
    let len = batch.len();
    let result = retry_with_backoff(&config.maintenance.retry, || {
        let batch = batch.clone();
        async move {
            index_fail_point(INDEX_REBUILD__BEFORE_WRITE)?;
            index_store.batch(batch).await
        }
    })
    .await;

    let Err(err) = result else {
        return Ok(len);
    };

    drift.report(IndexDrift {
        index_name: name.to_string(),
        primary_key: String::new(),
        cause: DriftCause::Rebuild,
        error: err.clone(),
    });

    match config.maintenance.policy {
        MaintenancePolicy::BestEffort => Ok(0),
        MaintenancePolicy::Strict => Err(index_error!(
            ErrorKind::IndexWriteFailed,
            "Index rebuild failed",
            format!("index '{name}', batch of {len} entries"),
            source: err
        )),
    }
}
