use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Notify, RwLock};

use crate::error::{ErrorKind, IndexResult};
use crate::hooks::{ChangeEvent, ChangeObserver};
use crate::index_error;
use crate::test_utils::notify::TimedNotify;

#[derive(Default)]
struct Inner {
    events: Vec<ChangeEvent>,
    conditions: Vec<(usize, Arc<Notify>)>,
    rejecting: bool,
}

impl Inner {
    fn check_conditions(&mut self) {
        let seen = self.events.len();
        self.conditions.retain(|(expected, notify)| {
            let reached = seen >= *expected;
            if reached {
                notify.notify_one();
            }
            !reached
        });
    }
}

/// A [`ChangeObserver`] that records every event it receives.
///
/// Clones share the same recording. When rejecting, events are still recorded but the observer
/// returns an error, aborting the write.
#[derive(Clone, Default)]
pub struct RecordingObserver {
    inner: Arc<RwLock<Inner>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_rejecting(&self, rejecting: bool) {
        self.inner.write().await.rejecting = rejecting;
    }

    pub async fn events(&self) -> Vec<ChangeEvent> {
        self.inner.read().await.events.clone()
    }

    /// Returns a notification fired once `count` events have been recorded in total.
    pub async fn notify_on_events(&self, count: usize) -> TimedNotify {
        let notify = Arc::new(Notify::new());
        let mut inner = self.inner.write().await;
        inner.conditions.push((count, notify.clone()));
        inner.check_conditions();

        TimedNotify::new(notify)
    }
}

#[async_trait]
impl ChangeObserver for RecordingObserver {
    async fn on_change(&self, event: &ChangeEvent) -> IndexResult<()> {
        let mut inner = self.inner.write().await;
        inner.events.push(event.clone());
        inner.check_conditions();

        if inner.rejecting {
            return Err(index_error!(
                ErrorKind::InvalidState,
                "Change rejected by observer",
                event.key.clone()
            ));
        }

        Ok(())
    }
}
