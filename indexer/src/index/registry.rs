use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::hooks::HookId;
use crate::index::definition::IndexDefinition;

/// A live index: its definition and the observer maintaining it.
#[derive(Debug, Clone)]
pub struct RegisteredIndex {
    pub definition: Arc<IndexDefinition>,
    pub hook_id: HookId,
}

/// The indexes of one table, by name. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct IndexRegistry {
    indexes: Arc<RwLock<HashMap<String, RegisteredIndex>>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, name: &str) -> Option<Arc<IndexDefinition>> {
        self.indexes
            .read()
            .await
            .get(name)
            .map(|index| index.definition.clone())
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.indexes.read().await.contains_key(name)
    }

    /// Returns the registered names, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.indexes.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registers `definition` if its name is free.
    ///
    /// `install_hook` is awaited only when the name is free, with the registry locked, so two
    /// concurrent registrations of one name install a single observer. Returns `false` and
    /// leaves the existing definition untouched when the name is taken.
    pub async fn register_with<F, Fut>(&self, definition: IndexDefinition, install_hook: F) -> bool
    where
        F: FnOnce(Arc<IndexDefinition>) -> Fut,
        Fut: Future<Output = HookId>,
    {
        let mut indexes = self.indexes.write().await;
        if indexes.contains_key(definition.name()) {
            return false;
        }

        let definition = Arc::new(definition);
        let hook_id = install_hook(definition.clone()).await;
        indexes.insert(
            definition.name().to_string(),
            RegisteredIndex {
                definition,
                hook_id,
            },
        );

        true
    }

    pub async fn remove(&self, name: &str) -> Option<RegisteredIndex> {
        self.indexes.write().await.remove(name)
    }
}
