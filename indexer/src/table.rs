use std::collections::HashMap;
use std::sync::Arc;

use config::shared::IndexerConfig;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde_json::Value;
use tracing::debug;

use crate::error::{ErrorKind, IndexError, IndexResult};
use crate::hooks::{
    ChangeEvent, ChangeObserver, HookId, HookRegistry, KeyScope, PendingChanges,
};
use crate::index_error;
use crate::store::{BatchOp, KeyRange, KvEntry, KvStore, Namespace, scan};

/// One write of a [`Table::batch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Put { key: String, value: Value },
    Delete { key: String },
}

impl Mutation {
    pub fn put(key: impl Into<String>, value: Value) -> Self {
        Mutation::Put {
            key: key.into(),
            value,
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Mutation::Delete { key: key.into() }
    }
}

/// A record read from a [`Table`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: String,
    pub value: Value,
}

/// Bounds of a [`Table::read_stream`], compared as UTF-8 byte strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRange {
    pub gt: Option<String>,
    pub gte: Option<String>,
    pub lt: Option<String>,
    pub lte: Option<String>,
    pub reverse: bool,
    pub limit: Option<usize>,
}

impl TableRange {
    pub fn all() -> Self {
        Self::default()
    }

    fn to_key_range(&self) -> KeyRange {
        let bytes = |bound: &Option<String>| bound.as_ref().map(|key| key.as_bytes().to_vec());

        KeyRange {
            gt: bytes(&self.gt),
            gte: bytes(&self.gte),
            lt: bytes(&self.lt),
            lte: bytes(&self.lte),
            reverse: self.reverse,
        }
    }
}

/// JSON records stored under string keys in one namespace.
///
/// Every put and delete, including each operation of a batch, is offered to the registered
/// [`ChangeObserver`]s before it is committed. Clones share the same observers. A put or
/// delete is a batch of one mutation.
#[derive(Debug, Clone)]
pub struct Table<S> {
    namespace: Namespace<S>,
    hooks: Arc<HookRegistry>,
    scan_page_size: usize,
}

impl<S: KvStore> Table<S> {
    /// Opens the table stored in the root namespace of `store`.
    pub fn new(store: S) -> Self {
        Self::open(Namespace::root(store))
    }

    /// Opens the table stored in `namespace`.
    pub fn open(namespace: Namespace<S>) -> Self {
        Self {
            namespace,
            hooks: Arc::new(HookRegistry::new()),
            scan_page_size: IndexerConfig::DEFAULT_SCAN_PAGE_SIZE,
        }
    }

    pub fn with_scan_page_size(mut self, scan_page_size: usize) -> Self {
        self.scan_page_size = scan_page_size.max(1);
        self
    }

    /// Opens the child table called `name`. It has its own, initially empty, observers.
    pub fn sublevel(&self, name: &str) -> Self {
        Self::open(self.namespace.sublevel(name)).with_scan_page_size(self.scan_page_size)
    }

    /// Returns the namespace holding this table's records.
    pub fn namespace(&self) -> &Namespace<S> {
        &self.namespace
    }

    pub async fn get(&self, key: &str) -> IndexResult<Option<Value>> {
        read_record(&self.namespace, key).await
    }

    pub async fn put(&self, key: impl Into<String>, value: Value) -> IndexResult<()> {
        self.batch(vec![Mutation::put(key, value)]).await
    }

    pub async fn delete(&self, key: impl Into<String>) -> IndexResult<()> {
        self.batch(vec![Mutation::delete(key)]).await
    }

    /// Applies `mutations` atomically.
    ///
    /// Observers see every mutation, in order, before anything is committed. Each event
    /// carries the value its key holds after the earlier mutations of the batch. When an
    /// observer rejects a mutation or the commit fails, nothing is written and every change
    /// already accepted by an observer is handed back through [`ChangeObserver::on_abort`].
    pub async fn batch(&self, mutations: Vec<Mutation>) -> IndexResult<()> {
        let mut pending = PendingChanges::new();
        let result = self.dispatch_and_commit(mutations, &mut pending).await;

        if let Err(err) = &result {
            if !pending.is_empty() {
                debug!(error = %err, "write aborted after observers accepted it");
            }
            pending.abort().await;
        }

        result
    }

    async fn dispatch_and_commit(
        &self,
        mutations: Vec<Mutation>,
        pending: &mut PendingChanges,
    ) -> IndexResult<()> {
        let mut ops = Vec::with_capacity(mutations.len());
        // Values written by earlier mutations of this batch.
        let mut staged: HashMap<String, Option<Value>> = HashMap::new();

        for mutation in mutations {
            let (event, op) = match mutation {
                Mutation::Put { key, value } => {
                    let op = BatchOp::Put {
                        key: key.as_bytes().to_vec(),
                        value: encode_record(&value)?,
                    };
                    (ChangeEvent::put(key, value), op)
                }
                Mutation::Delete { key } => {
                    let op = BatchOp::Delete {
                        key: key.as_bytes().to_vec(),
                    };
                    (ChangeEvent::delete(key), op)
                }
            };
            ops.push(op);

            let observers = self.hooks.observers_for(&event.key).await;
            let previous = match staged.get(&event.key) {
                Some(value) => value.clone(),
                None if observers.is_empty() => None,
                None => self.stored_value(&event.key).await,
            };
            staged.insert(event.key.clone(), event.value.clone());

            if !observers.is_empty() {
                pending
                    .dispatch(&observers, event.with_previous(previous))
                    .await?;
            }
        }

        self.namespace.batch(ops).await
    }

    /// Returns the committed value of `key`. Read and decode failures count as absent.
    async fn stored_value(&self, key: &str) -> Option<Value> {
        match read_record(&self.namespace, key).await {
            Ok(value) => value,
            Err(err) => {
                debug!(key, error = %err, "could not read stored record");
                None
            }
        }
    }

    /// Streams the records of `range` in key order.
    pub fn read_stream(&self, range: TableRange) -> BoxStream<'static, IndexResult<Record>> {
        scan(
            self.namespace.clone(),
            range.to_key_range(),
            range.limit,
            self.scan_page_size,
        )
        .map(|entry| entry.and_then(decode_record))
        .boxed()
    }

    pub async fn register_observer(
        &self,
        observer: Arc<dyn ChangeObserver>,
        scope: KeyScope,
    ) -> HookId {
        let id = self.hooks.register(observer, scope).await;
        debug!(?id, "change observer registered");

        id
    }

    pub async fn unregister_observer(&self, id: HookId) -> bool {
        let removed = self.hooks.unregister(id).await;
        debug!(?id, removed, "change observer unregistered");

        removed
    }
}

/// Encodes a record for storage.
pub(crate) fn encode_record(value: &Value) -> IndexResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(serialization_failed)
}

fn serialization_failed(err: serde_json::Error) -> IndexError {
    index_error!(
        ErrorKind::SerializationError,
        "Record serialization failed",
        source: err
    )
}

/// Reads and decodes the record stored under `key` in `namespace`.
pub(crate) async fn read_record<S: KvStore>(
    namespace: &Namespace<S>,
    key: &str,
) -> IndexResult<Option<Value>> {
    match namespace.get(key.as_bytes()).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Decodes a raw primary entry into a [`Record`].
pub(crate) fn decode_record(entry: KvEntry) -> IndexResult<Record> {
    let key = String::from_utf8(entry.key).map_err(|err| {
        index_error!(
            ErrorKind::KeyDecodingFailed,
            "Primary key is not valid UTF-8",
            source: err
        )
    })?;
    let value = serde_json::from_slice(&entry.value)?;

    Ok(Record { key, value })
}
