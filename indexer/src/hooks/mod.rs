//! Pre-commit change observers.
//!
//! A [`HookRegistry`] holds the observers of one table. The table dispatches a
//! [`ChangeEvent`] to every observer whose [`KeyScope`] contains the changed key, in
//! registration order, before it commits the write. Changes accepted by observers are
//! tracked in [`PendingChanges`] until the write commits, so an aborted write can be
//! handed back to them.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::IndexResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Put,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Put => f.write_str("put"),
            ChangeKind::Delete => f.write_str("delete"),
        }
    }
}

/// A write about to be committed to a table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub key: String,
    /// The new value. Only present for [`ChangeKind::Put`].
    pub value: Option<Value>,
    /// The value `key` holds right before this change, including earlier changes of the same
    /// batch. Unreadable stored values count as absent.
    pub previous: Option<Value>,
}

impl ChangeEvent {
    pub fn put(key: impl Into<String>, value: Value) -> Self {
        Self {
            kind: ChangeKind::Put,
            key: key.into(),
            value: Some(value),
            previous: None,
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Delete,
            key: key.into(),
            value: None,
            previous: None,
        }
    }

    pub fn with_previous(mut self, previous: Option<Value>) -> Self {
        self.previous = previous;
        self
    }
}

/// Receives table changes before they are committed.
///
/// Returning an error aborts the write that triggered the event.
#[async_trait]
pub trait ChangeObserver: Send + Sync {
    async fn on_change(&self, event: &ChangeEvent) -> IndexResult<()>;

    /// Called for a change this observer accepted when the write carrying it was aborted,
    /// either by another observer or by a failed commit.
    async fn on_abort(&self, _event: &ChangeEvent) {}
}

/// Identifies one registration in a [`HookRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(u64);

/// Key range an observer is interested in, `[gte, lt)` with open ends when unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyScope {
    pub gte: Option<String>,
    pub lt: Option<String>,
}

impl KeyScope {
    /// Covers every key of the table.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.gte.as_deref().is_none_or(|gte| key >= gte)
            && self.lt.as_deref().is_none_or(|lt| key < lt)
    }
}

struct Registration {
    id: HookId,
    scope: KeyScope,
    observer: Arc<dyn ChangeObserver>,
}

/// The observers registered on one table.
#[derive(Default)]
pub struct HookRegistry {
    next_id: AtomicU64,
    registrations: RwLock<Vec<Registration>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, observer: Arc<dyn ChangeObserver>, scope: KeyScope) -> HookId {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registrations.write().await.push(Registration {
            id,
            scope,
            observer,
        });

        id
    }

    /// Removes a registration. Returns `false` if `id` was not registered.
    pub async fn unregister(&self, id: HookId) -> bool {
        let mut registrations = self.registrations.write().await;
        let before = registrations.len();
        registrations.retain(|registration| registration.id != id);

        registrations.len() != before
    }

    pub async fn len(&self) -> usize {
        self.registrations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.registrations.read().await.is_empty()
    }

    /// Returns the observers whose scope contains `key`, in registration order.
    pub async fn observers_for(&self, key: &str) -> Vec<Arc<dyn ChangeObserver>> {
        // Observers may register or unregister hooks, so the lock is not held while they run.
        self.registrations
            .read()
            .await
            .iter()
            .filter(|registration| registration.scope.contains(key))
            .map(|registration| registration.observer.clone())
            .collect()
    }
}

/// Changes accepted by observers whose write has not been committed yet.
#[derive(Default)]
pub struct PendingChanges {
    accepted: Vec<(Arc<dyn ChangeObserver>, Arc<ChangeEvent>)>,
}

impl PendingChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `observers` on `event` in order, stopping at the first error.
    ///
    /// Observers that ran before the failing one stay recorded as having accepted `event`.
    pub async fn dispatch(
        &mut self,
        observers: &[Arc<dyn ChangeObserver>],
        event: ChangeEvent,
    ) -> IndexResult<()> {
        let event = Arc::new(event);

        for observer in observers {
            observer.on_change(&event).await?;
            self.accepted.push((observer.clone(), event.clone()));
        }

        Ok(())
    }

    /// Number of accepted observer calls.
    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    /// Hands every accepted change back to its observer, latest first.
    pub async fn abort(self) {
        if !self.accepted.is_empty() {
            debug!(accepted = self.accepted.len(), "aborting accepted changes");
        }

        for (observer, event) in self.accepted.into_iter().rev() {
            observer.on_abort(&event).await;
        }
    }
}

impl fmt::Debug for PendingChanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingChanges")
            .field("accepted", &self.accepted.len())
            .finish()
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
