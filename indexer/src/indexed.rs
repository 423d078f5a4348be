use std::sync::Arc;

use config::shared::IndexerConfig;
use futures::stream::BoxStream;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::info;

use crate::bail;
use crate::codec::KeyValue;
use crate::error::{ErrorKind, IndexResult};
use crate::hooks::KeyScope;
use crate::index::rebuild::{clear_entries, rebuild_index};
use crate::index::{
    DriftReporter, IndexDefinition, IndexDrift, IndexMaintainer, IndexRegistry, IndexStream,
    IndexStreamOptions, MapFunction, RebuildSummary,
};
use crate::store::{KvStore, Namespace};
use crate::table::{Mutation, Record, Table, TableRange};

/// A [`Table`] with secondary indexes.
///
/// Index entries live in the `index_namespace` child namespace of the table. Each index is
/// maintained by an observer registered on the table, so writes made through any clone of the
/// table keep the indexes current. Clones of an [`IndexedTable`] share their indexes.
#[derive(Debug, Clone)]
pub struct IndexedTable<S> {
    table: Table<S>,
    index_store: Namespace<S>,
    registry: IndexRegistry,
    config: Arc<IndexerConfig>,
    drift: DriftReporter,
}

impl<S: KvStore> IndexedTable<S> {
    /// Adds index support to `table`. Fails if `config` is invalid.
    pub fn new(table: Table<S>, config: IndexerConfig) -> IndexResult<Self> {
        config.validate()?;

        Ok(Self::with_validated_config(table, config))
    }

    /// Adds index support to `table` with the default configuration.
    pub fn with_defaults(table: Table<S>) -> Self {
        // The default configuration always validates.
        Self::with_validated_config(table, IndexerConfig::default())
    }

    fn with_validated_config(table: Table<S>, config: IndexerConfig) -> Self {
        let table = table.with_scan_page_size(config.scan_page_size);
        let index_store = table.namespace().sublevel(&config.index_namespace);

        Self {
            table,
            index_store,
            registry: IndexRegistry::new(),
            drift: DriftReporter::new(config.drift_channel_capacity),
            config: Arc::new(config),
        }
    }

    /// Registers the index `name` fed by `map`.
    ///
    /// Returns `false` without changing anything if `name` is already registered. Existing
    /// records are not indexed; call [`IndexedTable::update_index`] for that.
    pub async fn create_index(&self, name: &str, map: impl MapFunction + 'static) -> bool {
        self.register(IndexDefinition::new(name, map)).await
    }

    /// Registers the index `name` with a mapping that emits nothing.
    pub async fn create_empty_index(&self, name: &str) -> bool {
        self.register(IndexDefinition::empty(name)).await
    }

    async fn register(&self, definition: IndexDefinition) -> bool {
        let name = definition.name().to_string();
        let created = self
            .registry
            .register_with(definition, |definition| {
                let maintainer = IndexMaintainer::new(
                    definition,
                    self.index_store.clone(),
                    self.config.maintenance.clone(),
                    self.drift.clone(),
                );
                self.table
                    .register_observer(Arc::new(maintainer), KeyScope::all())
            })
            .await;

        if created {
            info!(index = %name, "index created");
        }

        created
    }

    /// Clears the index `name` and rebuilds it from every record of the table.
    ///
    /// Fails with [`ErrorKind::UnknownIndex`] if `name` is not registered.
    pub async fn update_index(&self, name: &str) -> IndexResult<RebuildSummary> {
        let Some(definition) = self.registry.get(name).await else {
            bail!(
                ErrorKind::UnknownIndex,
                "Index does not exist",
                format!("index '{name}' is not registered")
            );
        };

        rebuild_index(
            &definition,
            self.table.namespace(),
            &self.index_store,
            &self.config,
            &self.drift,
        )
        .await
    }

    /// Removes every entry of the index `name` and returns how many were removed.
    ///
    /// The index stays registered, so later writes populate it again.
    pub async fn clear_index(&self, name: &str) -> IndexResult<usize> {
        let cleared = clear_entries(&self.index_store, name, self.config.scan_page_size).await?;
        info!(index = name, cleared, "index cleared");

        Ok(cleared)
    }

    /// Unregisters the index `name` and removes its entries.
    ///
    /// Later writes no longer touch the index and the name can be registered again. Dropping
    /// an unknown name only clears entries stored under it.
    pub async fn drop_index(&self, name: &str) -> IndexResult<usize> {
        if let Some(index) = self.registry.remove(name).await {
            self.table.unregister_observer(index.hook_id).await;
        }

        let cleared = clear_entries(&self.index_store, name, self.config.scan_page_size).await?;
        info!(index = name, cleared, "index dropped");

        Ok(cleared)
    }

    /// Streams the records whose index `name` contains `index_value`, in primary key order.
    ///
    /// An index without entries for `index_value`, or an unknown index, yields nothing.
    pub fn create_index_stream(
        &self,
        name: &str,
        index_value: impl Into<KeyValue>,
        options: IndexStreamOptions,
    ) -> IndexStream<S> {
        IndexStream::new(
            self.table.namespace().clone(),
            self.index_store.clone(),
            name,
            &index_value.into(),
            &options,
            self.config.scan_page_size,
        )
    }

    /// Subscribes to the drift reports of every index of this table.
    pub fn subscribe_drift(&self) -> broadcast::Receiver<IndexDrift> {
        self.drift.subscribe()
    }

    /// Returns the registered index names, sorted.
    pub async fn index_names(&self) -> Vec<String> {
        self.registry.names().await
    }

    pub fn table(&self) -> &Table<S> {
        &self.table
    }

    /// Returns the namespace holding the index entries.
    pub fn index_store(&self) -> &Namespace<S> {
        &self.index_store
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub async fn get(&self, key: &str) -> IndexResult<Option<Value>> {
        self.table.get(key).await
    }

    pub async fn put(&self, key: impl Into<String>, value: Value) -> IndexResult<()> {
        self.table.put(key, value).await
    }

    pub async fn delete(&self, key: impl Into<String>) -> IndexResult<()> {
        self.table.delete(key).await
    }

    pub async fn batch(&self, mutations: Vec<Mutation>) -> IndexResult<()> {
        self.table.batch(mutations).await
    }

    pub fn read_stream(&self, range: TableRange) -> BoxStream<'static, IndexResult<Record>> {
        self.table.read_stream(range)
    }
}
