use std::fmt;

use tokio::sync::broadcast;
use tracing::warn;

use crate::error::IndexError;
use crate::hooks::ChangeKind;

/// What was being done to the index when it drifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftCause {
    /// Incremental maintenance of a put or delete.
    Change(ChangeKind),
    /// Undoing the maintenance of a put or delete whose write was aborted.
    Rollback(ChangeKind),
    /// A batch written by a rebuild.
    Rebuild,
}

impl fmt::Display for DriftCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriftCause::Change(kind) => write!(f, "{kind}"),
            DriftCause::Rollback(kind) => write!(f, "rollback of {kind}"),
            DriftCause::Rebuild => f.write_str("rebuild"),
        }
    }
}

/// An index mutation that failed after all retries.
///
/// The index may now miss entries for, or keep stale entries of, `primary_key`. Running
/// `update_index` restores it.
#[derive(Debug, Clone)]
pub struct IndexDrift {
    pub index_name: String,
    /// The record whose entries failed. Empty for rebuild batches spanning several records.
    pub primary_key: String,
    pub cause: DriftCause,
    pub error: IndexError,
}

/// Publishes [`IndexDrift`] reports to any number of subscribers.
#[derive(Debug, Clone)]
pub struct DriftReporter {
    tx: broadcast::Sender<IndexDrift>,
}

impl DriftReporter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribes to reports published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<IndexDrift> {
        self.tx.subscribe()
    }

    /// Logs the drift and publishes it. Nobody listening is not an error.
    pub fn report(&self, drift: IndexDrift) {
        warn!(
            index = %drift.index_name,
            primary_key = %drift.primary_key,
            cause = %drift.cause,
            error = %drift.error,
            "index maintenance failed, index has drifted"
        );

        let _ = self.tx.send(drift);
    }
}
