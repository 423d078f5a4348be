use std::cmp::Ordering;
use std::future::Future;
use std::ops::Bound;

use crate::error::IndexResult;

/// A key/value pair read from a [`KvStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// One mutation of an atomic [`KvStore::batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl BatchOp {
    pub fn key(&self) -> &[u8] {
        match self {
            BatchOp::Put { key, .. } | BatchOp::Delete { key } => key,
        }
    }
}

/// Bounds and direction of a range read.
///
/// All supplied bounds apply together: a key must satisfy every one of them. A range with
/// no bounds covers the whole store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRange {
    pub gt: Option<Vec<u8>>,
    pub gte: Option<Vec<u8>>,
    pub lt: Option<Vec<u8>>,
    pub lte: Option<Vec<u8>>,
    pub reverse: bool,
}

impl KeyRange {
    /// Returns the range of every key starting with `prefix`, excluding `prefix` itself.
    pub fn prefixed(prefix: &[u8]) -> Self {
        Self {
            gt: Some(prefix.to_vec()),
            lt: Some(crate::codec::prefix_upper_bound(prefix)),
            ..Self::default()
        }
    }

    pub fn reversed(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Returns the tightest lower bound implied by `gt` and `gte`.
    pub fn lower_bound(&self) -> Bound<&[u8]> {
        match (self.gt.as_deref(), self.gte.as_deref()) {
            (None, None) => Bound::Unbounded,
            (Some(gt), None) => Bound::Excluded(gt),
            (None, Some(gte)) => Bound::Included(gte),
            (Some(gt), Some(gte)) => match gt.cmp(gte) {
                Ordering::Less => Bound::Included(gte),
                Ordering::Equal | Ordering::Greater => Bound::Excluded(gt),
            },
        }
    }

    /// Returns the tightest upper bound implied by `lt` and `lte`.
    pub fn upper_bound(&self) -> Bound<&[u8]> {
        match (self.lt.as_deref(), self.lte.as_deref()) {
            (None, None) => Bound::Unbounded,
            (Some(lt), None) => Bound::Excluded(lt),
            (None, Some(lte)) => Bound::Included(lte),
            (Some(lt), Some(lte)) => match lt.cmp(lte) {
                Ordering::Greater => Bound::Included(lte),
                Ordering::Equal | Ordering::Less => Bound::Excluded(lt),
            },
        }
    }

    /// Returns `true` if no key can satisfy both bounds.
    pub fn is_empty(&self) -> bool {
        match (self.lower_bound(), self.upper_bound()) {
            (Bound::Included(lower), Bound::Included(upper)) => lower > upper,
            (Bound::Included(lower), Bound::Excluded(upper))
            | (Bound::Excluded(lower), Bound::Included(upper))
            | (Bound::Excluded(lower), Bound::Excluded(upper)) => lower >= upper,
            _ => false,
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        let above = match self.lower_bound() {
            Bound::Unbounded => true,
            Bound::Included(lower) => key >= lower,
            Bound::Excluded(lower) => key > lower,
        };
        let below = match self.upper_bound() {
            Bound::Unbounded => true,
            Bound::Included(upper) => key <= upper,
            Bound::Excluded(upper) => key < upper,
        };

        above && below
    }

    /// Narrows the range past `last_key` in the scan direction.
    ///
    /// Used to resume a paged scan after the last key of the previous page.
    pub fn resume_after(&mut self, last_key: &[u8]) {
        if self.reverse {
            self.lt = Some(last_key.to_vec());
            self.lte = None;
        } else {
            self.gt = Some(last_key.to_vec());
            self.gte = None;
        }
    }
}

/// An ordered byte-keyed store.
///
/// Keys compare as unsigned byte strings. Implementations must be cheap to clone, with every
/// clone sharing the same underlying data, and must be safe to use concurrently.
pub trait KvStore: Clone + Send + Sync + 'static {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &[u8]) -> impl Future<Output = IndexResult<Option<Vec<u8>>>> + Send;

    /// Stores `value` under `key`, replacing any previous value.
    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> impl Future<Output = IndexResult<()>> + Send {
        self.batch(vec![BatchOp::Put { key, value }])
    }

    /// Removes `key`. Removing a missing key succeeds.
    fn delete(&self, key: Vec<u8>) -> impl Future<Output = IndexResult<()>> + Send {
        self.batch(vec![BatchOp::Delete { key }])
    }

    /// Applies every operation atomically, in order.
    fn batch(&self, ops: Vec<BatchOp>) -> impl Future<Output = IndexResult<()>> + Send;

    /// Returns up to `max_entries` entries of `range`, in the range's direction.
    fn scan_page(
        &self,
        range: &KeyRange,
        max_entries: usize,
    ) -> impl Future<Output = IndexResult<Vec<KvEntry>>> + Send;
}
