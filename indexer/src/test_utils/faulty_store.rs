use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{ErrorKind, IndexResult};
use crate::index_error;
use crate::store::{BatchOp, KeyRange, KvEntry, KvStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreMethod {
    Get,
    Batch,
    ScanPage,
}

/// How often an injected fault fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Always,
    /// Fails the next `n` matching calls, then succeeds.
    Times(usize),
}

/// Faults to inject, per method.
///
/// A call matches when the key it touches starts with `key_prefix`: the key of a get, any key
/// of a batch or the lower bound of a scan. An empty prefix matches every call.
#[derive(Debug, Clone, Default)]
pub struct FaultConfig {
    pub get: Option<Fault>,
    pub batch: Option<Fault>,
    pub scan_page: Option<Fault>,
    pub key_prefix: Vec<u8>,
}

impl FaultConfig {
    /// Fails every batch writing under `key_prefix`.
    pub fn failing_writes_under(key_prefix: &[u8]) -> Self {
        Self {
            batch: Some(Fault::Always),
            key_prefix: key_prefix.to_vec(),
            ..Self::default()
        }
    }

    /// Fails every get reading under `key_prefix`.
    pub fn failing_reads_under(key_prefix: &[u8]) -> Self {
        Self {
            get: Some(Fault::Always),
            key_prefix: key_prefix.to_vec(),
            ..Self::default()
        }
    }

    fn fault_mut(&mut self, method: StoreMethod) -> &mut Option<Fault> {
        match method {
            StoreMethod::Get => &mut self.get,
            StoreMethod::Batch => &mut self.batch,
            StoreMethod::ScanPage => &mut self.scan_page,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    faults: FaultConfig,
    calls: HashMap<StoreMethod, usize>,
    injected: HashMap<StoreMethod, usize>,
}

impl Inner {
    /// Records a call and returns whether it must fail.
    fn should_fail(&mut self, method: StoreMethod, keys: &[&[u8]]) -> bool {
        *self.calls.entry(method).or_default() += 1;

        let prefix = self.faults.key_prefix.clone();
        if !keys.iter().any(|key| key.starts_with(&prefix)) {
            return false;
        }

        let fault = self.faults.fault_mut(method);
        let fail = match *fault {
            None | Some(Fault::Times(0)) => false,
            Some(Fault::Always) => true,
            Some(Fault::Times(remaining)) => {
                *fault = Some(Fault::Times(remaining - 1));
                true
            }
        };

        if fail {
            *self.injected.entry(method).or_default() += 1;
        }

        fail
    }
}

/// A [`KvStore`] wrapper that injects failures and counts calls.
///
/// Clones share the same faults and counters.
#[derive(Debug, Clone)]
pub struct FaultInjectingStore<S> {
    inner: S,
    state: Arc<RwLock<Inner>>,
}

impl<S: KvStore> FaultInjectingStore<S> {
    pub fn wrap(inner: S) -> Self {
        Self {
            inner,
            state: Arc::new(RwLock::new(Inner::default())),
        }
    }

    pub async fn set_faults(&self, faults: FaultConfig) {
        self.state.write().await.faults = faults;
    }

    pub async fn clear_faults(&self) {
        self.set_faults(FaultConfig::default()).await;
    }

    /// Number of calls of `method` so far, failed ones included.
    pub async fn calls(&self, method: StoreMethod) -> usize {
        self.state
            .read()
            .await
            .calls
            .get(&method)
            .copied()
            .unwrap_or(0)
    }

    /// Number of calls of `method` that were failed on purpose.
    pub async fn injected_faults(&self, method: StoreMethod) -> usize {
        self.state
            .read()
            .await
            .injected
            .get(&method)
            .copied()
            .unwrap_or(0)
    }

    pub async fn reset_calls(&self) {
        let mut state = self.state.write().await;
        state.calls.clear();
        state.injected.clear();
    }
}

impl<S: KvStore> KvStore for FaultInjectingStore<S> {
    async fn get(&self, key: &[u8]) -> IndexResult<Option<Vec<u8>>> {
        if self.state.write().await.should_fail(StoreMethod::Get, &[key]) {
            return Err(index_error!(
                ErrorKind::StoreReadFailed,
                "Injected store fault",
                "get"
            ));
        }

        self.inner.get(key).await
    }

    async fn batch(&self, ops: Vec<BatchOp>) -> IndexResult<()> {
        let keys: Vec<&[u8]> = ops.iter().map(BatchOp::key).collect();
        if self.state.write().await.should_fail(StoreMethod::Batch, &keys) {
            return Err(index_error!(
                ErrorKind::StoreWriteFailed,
                "Injected store fault",
                "batch"
            ));
        }

        self.inner.batch(ops).await
    }

    async fn scan_page(&self, range: &KeyRange, max_entries: usize) -> IndexResult<Vec<KvEntry>> {
        let lower = range.gt.as_deref().or(range.gte.as_deref()).unwrap_or_default();
        if self
            .state
            .write()
            .await
            .should_fail(StoreMethod::ScanPage, &[lower])
        {
            return Err(index_error!(
                ErrorKind::StoreReadFailed,
                "Injected store fault",
                "scan_page"
            ));
        }

        self.inner.scan_page(range, max_entries).await
    }
}
