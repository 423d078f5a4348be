use std::sync::Arc;

use crate::codec::value::push_terminated_bytes;
use crate::error::IndexResult;
use crate::store::base::{BatchOp, KeyRange, KvEntry, KvStore};

/// Marks the data keys of a namespace.
const DATA_MARKER: u8 = 0x01;

/// Marks the child namespaces of a namespace. Sorts after [`DATA_MARKER`].
const CHILD_MARKER: u8 = 0x02;

/// An isolated key space inside a backing [`KvStore`].
///
/// A namespace is identified by its path of names from the root. Data keys are stored under
/// `path ++ 0x01` and child namespaces under `path ++ 0x02 ++ name`, so the key space of a
/// namespace never overlaps its parent's or a sibling's. Keys passed to and returned from a
/// namespace are relative to it.
#[derive(Debug, Clone)]
pub struct Namespace<S> {
    store: S,
    path: Arc<[u8]>,
    data_prefix: Arc<[u8]>,
}

impl<S: KvStore> Namespace<S> {
    /// Returns the root namespace of `store`.
    pub fn root(store: S) -> Self {
        Self::with_path(store, Vec::new())
    }

    /// Returns the child namespace called `name`.
    ///
    /// Opening the same name twice yields namespaces sharing the same keys.
    pub fn sublevel(&self, name: &str) -> Self {
        let mut path = self.path.to_vec();
        path.push(CHILD_MARKER);
        push_terminated_bytes(&mut path, name.as_bytes());

        Self::with_path(self.store.clone(), path)
    }

    /// Returns the backing store shared by every namespace.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the prefix of this namespace's data keys in the backing store.
    pub fn key_prefix(&self) -> &[u8] {
        &self.data_prefix
    }

    fn with_path(store: S, path: Vec<u8>) -> Self {
        let mut data_prefix = path.clone();
        data_prefix.push(DATA_MARKER);

        Self {
            store,
            path: path.into(),
            data_prefix: data_prefix.into(),
        }
    }

    fn absolute(&self, key: &[u8]) -> Vec<u8> {
        let mut absolute = Vec::with_capacity(self.data_prefix.len() + key.len());
        absolute.extend_from_slice(&self.data_prefix);
        absolute.extend_from_slice(key);
        absolute
    }

    fn absolute_range(&self, range: &KeyRange) -> KeyRange {
        let absolute = |bound: &Option<Vec<u8>>| bound.as_deref().map(|key| self.absolute(key));

        let mut translated = KeyRange {
            gt: absolute(&range.gt),
            gte: absolute(&range.gte),
            lt: absolute(&range.lt),
            lte: absolute(&range.lte),
            reverse: range.reverse,
        };

        if translated.gt.is_none() && translated.gte.is_none() {
            translated.gte = Some(self.data_prefix.to_vec());
        }
        if translated.lt.is_none() && translated.lte.is_none() {
            let mut children = self.path.to_vec();
            children.push(CHILD_MARKER);
            translated.lt = Some(children);
        }

        translated
    }
}

impl<S: KvStore> KvStore for Namespace<S> {
    async fn get(&self, key: &[u8]) -> IndexResult<Option<Vec<u8>>> {
        self.store.get(&self.absolute(key)).await
    }

    async fn batch(&self, ops: Vec<BatchOp>) -> IndexResult<()> {
        let ops = ops
            .into_iter()
            .map(|op| match op {
                BatchOp::Put { key, value } => BatchOp::Put {
                    key: self.absolute(&key),
                    value,
                },
                BatchOp::Delete { key } => BatchOp::Delete {
                    key: self.absolute(&key),
                },
            })
            .collect();

        self.store.batch(ops).await
    }

    async fn scan_page(&self, range: &KeyRange, max_entries: usize) -> IndexResult<Vec<KvEntry>> {
        let prefix_len = self.data_prefix.len();
        let page = self
            .store
            .scan_page(&self.absolute_range(range), max_entries)
            .await?;

        Ok(page
            .into_iter()
            .map(|entry| KvEntry {
                key: entry.key[prefix_len..].to_vec(),
                value: entry.value,
            })
            .collect())
    }
}
