use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::codec::{KeyValue, entry_key};

/// Collects the index values produced by a [`MapFunction`] for one record.
#[derive(Debug, Default)]
pub struct Emitter {
    values: Vec<KeyValue>,
}

impl Emitter {
    pub fn emit(&mut self, value: impl Into<KeyValue>) {
        self.values.push(value.into());
    }

    /// Emits a JSON value. Values without a key encoding, such as objects, are skipped.
    pub fn emit_json(&mut self, value: &Value) {
        match KeyValue::try_from(value) {
            Ok(value) => self.values.push(value),
            Err(err) => debug!(error = %err, "skipping unindexable JSON value"),
        }
    }

    fn into_values(self) -> Vec<KeyValue> {
        self.values
    }
}

/// Computes the index values of a record.
///
/// Implemented for every `Fn(&str, &Value, &mut Emitter)`. Emission is synchronous: only
/// values emitted before `map` returns are indexed, so data the mapping needs from async
/// sources is loaded up front and captured.
pub trait MapFunction: Send + Sync {
    fn map(&self, key: &str, value: &Value, emitter: &mut Emitter);
}

impl<F> MapFunction for F
where
    F: Fn(&str, &Value, &mut Emitter) + Send + Sync,
{
    fn map(&self, key: &str, value: &Value, emitter: &mut Emitter) {
        self(key, value, emitter)
    }
}

/// A mapping that never emits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMap;

impl MapFunction for NoopMap {
    fn map(&self, _key: &str, _value: &Value, _emitter: &mut Emitter) {}
}

/// A named index and the mapping that feeds it. Immutable once created.
#[derive(Clone)]
pub struct IndexDefinition {
    name: String,
    map: Arc<dyn MapFunction>,
}

impl IndexDefinition {
    pub fn new(name: impl Into<String>, map: impl MapFunction + 'static) -> Self {
        Self {
            name: name.into(),
            map: Arc::new(map),
        }
    }

    /// A definition whose mapping emits nothing.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, NoopMap)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the values emitted for one record, in emission order.
    pub fn index_values(&self, key: &str, value: &Value) -> Vec<KeyValue> {
        let mut emitter = Emitter::default();
        self.map.map(key, value, &mut emitter);
        emitter.into_values()
    }

    /// Returns the distinct composite keys of the entries one record maps to.
    pub fn entry_keys(&self, key: &str, value: &Value) -> BTreeSet<Vec<u8>> {
        self.index_values(key, value)
            .iter()
            .map(|index_value| entry_key(&self.name, index_value, key))
            .collect()
    }
}

impl fmt::Debug for IndexDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexDefinition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
