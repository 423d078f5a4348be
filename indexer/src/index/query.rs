use core::pin::Pin;
use core::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{Future, FutureExt, Stream, ready};
use pin_project_lite::pin_project;
use serde_json::Value;
use tracing::debug;

use crate::codec::{KeyValue, bounded_key, prefix_upper_bound, value_prefix};
use crate::error::IndexResult;
use crate::store::{KeyRange, KvEntry, KvStore, Namespace, scan};
use crate::table::read_record;

/// Options of an index query.
///
/// Bounds are raw primary keys and restrict the primary keys returned within the queried
/// index value. Empty-string bounds count as unset, and a limit of zero means no limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStreamOptions {
    pub gt: Option<String>,
    pub gte: Option<String>,
    pub lt: Option<String>,
    pub lte: Option<String>,
    /// Deprecated alias of `gt`.
    pub start: Option<String>,
    /// Deprecated alias of `lt`.
    pub end: Option<String>,
    pub reverse: bool,
    /// Maximum number of index entries scanned. Skipped entries count towards it.
    pub limit: Option<usize>,
    pub keys: bool,
    pub values: bool,
}

impl Default for IndexStreamOptions {
    fn default() -> Self {
        Self {
            gt: None,
            gte: None,
            lt: None,
            lte: None,
            start: None,
            end: None,
            reverse: false,
            limit: None,
            keys: true,
            values: true,
        }
    }
}

impl IndexStreamOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gt(mut self, key: impl Into<String>) -> Self {
        self.gt = Some(key.into());
        self
    }

    pub fn gte(mut self, key: impl Into<String>) -> Self {
        self.gte = Some(key.into());
        self
    }

    pub fn lt(mut self, key: impl Into<String>) -> Self {
        self.lt = Some(key.into());
        self
    }

    pub fn lte(mut self, key: impl Into<String>) -> Self {
        self.lte = Some(key.into());
        self
    }

    #[deprecated(note = "use `gt`")]
    pub fn start(mut self, key: impl Into<String>) -> Self {
        self.start = Some(key.into());
        self
    }

    #[deprecated(note = "use `lt`")]
    pub fn end(mut self, key: impl Into<String>) -> Self {
        self.end = Some(key.into());
        self
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn keys(mut self, keys: bool) -> Self {
        self.keys = keys;
        self
    }

    pub fn values(mut self, values: bool) -> Self {
        self.values = values;
        self
    }

    fn shape(&self) -> RecordShape {
        match (self.keys, self.values) {
            (true, false) => RecordShape::Key,
            (false, true) => RecordShape::Value,
            _ => RecordShape::Entry,
        }
    }

    fn effective_limit(&self) -> Option<usize> {
        self.limit.filter(|limit| *limit > 0)
    }
}

/// One result of an index query, shaped by [`IndexStreamOptions::keys`] and
/// [`IndexStreamOptions::values`].
#[derive(Debug, Clone, PartialEq)]
pub enum IndexRecord {
    Entry { key: String, value: Value },
    Key(String),
    Value(Value),
}

impl IndexRecord {
    pub fn key(&self) -> Option<&str> {
        match self {
            IndexRecord::Entry { key, .. } | IndexRecord::Key(key) => Some(key),
            IndexRecord::Value(_) => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            IndexRecord::Entry { value, .. } | IndexRecord::Value(value) => Some(value),
            IndexRecord::Key(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordShape {
    Entry,
    Key,
    Value,
}

impl RecordShape {
    fn record(self, key: String, value: Value) -> IndexRecord {
        match self {
            RecordShape::Entry => IndexRecord::Entry { key, value },
            RecordShape::Key => IndexRecord::Key(key),
            RecordShape::Value => IndexRecord::Value(value),
        }
    }
}

/// Builds the index-store range of a query for `index_value` of the index called `name`.
///
/// Without a lower bound the range starts just after the value prefix, and without an upper
/// bound it ends at the prefix followed by the `0xFF` sentinel. When both a bound and its
/// deprecated alias are given, the tighter one applies.
pub fn build_range(name: &str, index_value: &KeyValue, options: &IndexStreamOptions) -> KeyRange {
    let prefix = value_prefix(name, index_value);
    let bound = |key: &Option<String>| {
        key.as_deref()
            .filter(|key| !key.is_empty())
            .map(|key| bounded_key(&prefix, key))
    };

    let gt = bound(&options.gt).max(bound(&options.start));
    let gte = bound(&options.gte);
    let lt = match (bound(&options.lt), bound(&options.end)) {
        (Some(lt), Some(end)) => Some(lt.min(end)),
        (lt, end) => lt.or(end),
    };
    let lte = bound(&options.lte);

    let mut range = KeyRange {
        gt,
        gte,
        lt,
        lte,
        reverse: options.reverse,
    };

    if range.gt.is_none() && range.gte.is_none() {
        range.gt = Some(prefix.clone());
    }
    if range.lt.is_none() && range.lte.is_none() {
        range.lt = Some(prefix_upper_bound(&prefix));
    }

    range
}

type Lookup = BoxFuture<'static, (String, IndexResult<Option<Value>>)>;

pin_project! {
    /// Resolves index entries to primary records.
    ///
    /// One primary lookup is in flight at a time and is started only while the stream is
    /// polled, so a consumer that stops polling stops the query. Entries whose record is
    /// missing or unreadable are skipped. An index-store read error is yielded once and ends
    /// the stream.
    #[must_use = "streams do nothing unless polled"]
    pub struct IndexStream<S> {
        #[pin]
        entries: BoxStream<'static, IndexResult<KvEntry>>,
        primary: Namespace<S>,
        lookup: Option<Lookup>,
        shape: RecordShape,
        finished: bool,
        emitted: usize,
        skipped: usize,
    }
}

impl<S: KvStore> IndexStream<S> {
    /// Queries `index_store` for `index_value` of the index called `name`.
    pub fn new(
        primary: Namespace<S>,
        index_store: Namespace<S>,
        name: &str,
        index_value: &KeyValue,
        options: &IndexStreamOptions,
        page_size: usize,
    ) -> Self {
        let range = build_range(name, index_value, options);
        let entries = scan(index_store, range, options.effective_limit(), page_size);

        Self {
            entries,
            primary,
            lookup: None,
            shape: options.shape(),
            finished: false,
            emitted: 0,
            skipped: 0,
        }
    }

    /// Number of records produced so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Number of index entries skipped so far because their record could not be resolved.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<S: KvStore> Stream for IndexStream<S> {
    type Item = IndexResult<IndexRecord>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(lookup) = this.lookup.as_mut() {
                let (key, result) = ready!(lookup.as_mut().poll(cx));
                *this.lookup = None;

                match result {
                    Ok(Some(value)) => {
                        *this.emitted += 1;
                        return Poll::Ready(Some(Ok(this.shape.record(key, value))));
                    }
                    Ok(None) => {
                        *this.skipped += 1;
                        debug!(key, "skipping index entry without a primary record");
                    }
                    Err(err) => {
                        *this.skipped += 1;
                        debug!(
                            key,
                            error = %err,
                            "skipping index entry with unreadable primary record"
                        );
                    }
                }

                continue;
            }

            if *this.finished {
                return Poll::Ready(None);
            }

            match ready!(this.entries.as_mut().poll_next(cx)) {
                Some(Ok(entry)) => match String::from_utf8(entry.value) {
                    Ok(key) => {
                        let primary = this.primary.clone();
                        *this.lookup = Some(
                            async move {
                                let result = read_record(&primary, &key).await;
                                (key, result)
                            }
                            .boxed(),
                        );
                    }
                    Err(err) => {
                        *this.skipped += 1;
                        debug!(error = %err, "skipping index entry with a non UTF-8 primary key");
                    }
                },
                Some(Err(err)) => {
                    *this.finished = true;
                    return Poll::Ready(Some(Err(err)));
                }
                None => {
                    *this.finished = true;
                    return Poll::Ready(None);
                }
            }
        }
    }
}
