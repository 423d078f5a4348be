use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::IndexResult;
use crate::store::base::{BatchOp, KeyRange, KvEntry, KvStore};

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

/// In-memory [`KvStore`] backed by a [`BTreeMap`].
///
/// Clones share the same map. Batches are applied under a single write lock, so readers
/// never observe a partially applied batch.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of stored keys across every namespace.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

impl KvStore for MemoryStore {
    async fn get(&self, key: &[u8]) -> IndexResult<Option<Vec<u8>>> {
        let inner = self.inner.read().await;
        Ok(inner.entries.get(key).cloned())
    }

    async fn batch(&self, ops: Vec<BatchOp>) -> IndexResult<()> {
        let mut inner = self.inner.write().await;
        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    inner.entries.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    inner.entries.remove(&key);
                }
            }
        }

        Ok(())
    }

    async fn scan_page(&self, range: &KeyRange, max_entries: usize) -> IndexResult<Vec<KvEntry>> {
        // `BTreeMap::range` panics on inverted bounds.
        if max_entries == 0 || range.is_empty() {
            return Ok(Vec::new());
        }

        let bounds: (Bound<&[u8]>, Bound<&[u8]>) = (range.lower_bound(), range.upper_bound());
        let inner = self.inner.read().await;
        let matching = inner.entries.range::<[u8], _>(bounds);

        let to_entry = |(key, value): (&Vec<u8>, &Vec<u8>)| KvEntry {
            key: key.clone(),
            value: value.clone(),
        };

        let page = if range.reverse {
            matching.rev().take(max_entries).map(to_entry).collect()
        } else {
            matching.take(max_entries).map(to_entry).collect()
        };

        Ok(page)
    }
}
