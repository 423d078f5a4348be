use std::sync::Arc;

use async_trait::async_trait;
use config::shared::{MaintenanceConfig, MaintenancePolicy};
use serde_json::Value;

use crate::concurrency::retry::retry_with_backoff;
use crate::error::{ErrorKind, IndexResult};
use crate::failpoints::{INDEX_MAINTENANCE__BEFORE_WRITE, index_fail_point};
use crate::hooks::{ChangeEvent, ChangeKind, ChangeObserver};
use crate::index::definition::IndexDefinition;
use crate::index::drift::{DriftCause, DriftReporter, IndexDrift};
use crate::store::{BatchOp, KvStore, Namespace};
use crate::{bail, index_error};

/// Keeps one index in step with the writes of its table.
///
/// Registered as a [`ChangeObserver`] covering the whole table, so it runs before every put
/// and delete is committed. Each change moves the entries of the record from those of the
/// value it replaces to those of the new value, and an aborted change moves them back.
pub struct IndexMaintainer<S> {
    definition: Arc<IndexDefinition>,
    index_store: Namespace<S>,
    maintenance: MaintenanceConfig,
    drift: DriftReporter,
}

impl<S: KvStore> IndexMaintainer<S> {
    pub fn new(
        definition: Arc<IndexDefinition>,
        index_store: Namespace<S>,
        maintenance: MaintenanceConfig,
        drift: DriftReporter,
    ) -> Self {
        Self {
            definition,
            index_store,
            maintenance,
            drift,
        }
    }

    /// Builds the index batch replacing the entries of `from` with those of `to` for `key`.
    ///
    /// Entries shared by both values are written again.
    fn transition(&self, key: &str, from: Option<&Value>, to: Option<&Value>) -> Vec<BatchOp> {
        let entry_keys = |value: Option<&Value>| {
            value
                .map(|value| self.definition.entry_keys(key, value))
                .unwrap_or_default()
        };
        let from_keys = entry_keys(from);
        let to_keys = entry_keys(to);

        let mut ops: Vec<_> = from_keys
            .difference(&to_keys)
            .map(|entry_key| BatchOp::Delete {
                key: entry_key.clone(),
            })
            .collect();
        ops.extend(to_keys.into_iter().map(|entry_key| BatchOp::Put {
            key: entry_key,
            value: key.as_bytes().to_vec(),
        }));

        ops
    }

    /// Writes `ops` with retries. A batch that still fails is reported as drift.
    async fn write(&self, cause: DriftCause, key: &str, ops: Vec<BatchOp>) -> IndexResult<()> {
        if ops.is_empty() {
            return Ok(());
        }

        let result = retry_with_backoff(&self.maintenance.retry, || {
            let ops = ops.clone();
            async move {
                index_fail_point(INDEX_MAINTENANCE__BEFORE_WRITE)?;
                self.index_store.batch(ops).await
            }
        })
        .await;

        if let Err(err) = &result {
            self.drift.report(IndexDrift {
                index_name: self.definition.name().to_string(),
                primary_key: key.to_string(),
                cause,
                error: err.clone(),
            });
        }

        result
    }
}

#[async_trait]
impl<S: KvStore> ChangeObserver for IndexMaintainer<S> {
    async fn on_change(&self, event: &ChangeEvent) -> IndexResult<()> {
        if event.kind == ChangeKind::Put && event.value.is_none() {
            bail!(
                ErrorKind::InvalidState,
                "Put event without a value",
                event.key.clone()
            );
        }

        let ops = self.transition(&event.key, event.previous.as_ref(), event.value.as_ref());
        let Err(err) = self
            .write(DriftCause::Change(event.kind), &event.key, ops)
            .await
        else {
            return Ok(());
        };

        match self.maintenance.policy {
            MaintenancePolicy::BestEffort => Ok(()),
            MaintenancePolicy::Strict => Err(index_error!(
                ErrorKind::IndexWriteFailed,
                "Index maintenance failed",
                format!(
                    "index '{}', key '{}', {}",
                    self.definition.name(),
                    event.key,
                    event.kind
                ),
                source: err
            )),
        }
    }

    async fn on_abort(&self, event: &ChangeEvent) {
        let ops = self.transition(&event.key, event.value.as_ref(), event.previous.as_ref());

        // A failed rollback is reported as drift by `write`.
        let _ = self
            .write(DriftCause::Rollback(event.kind), &event.key, ops)
            .await;
    }
}
