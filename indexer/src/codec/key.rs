use crate::bail;
use crate::codec::value::KeyValue;
use crate::error::{ErrorKind, IndexResult};

/// Byte appended to a prefix to bound every key that extends it.
///
/// No type tag uses this value.
pub const PARTITION_SENTINEL: u8 = 0xFF;

/// One stored index entry: `(index_name, index_value, primary_key)`.
///
/// Entries are ordered by index name, then index value, then primary key, all in codec
/// order. Every component is self-delimiting, so separator characters inside any of them
/// cannot make two different entries collide.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub index_name: String,
    pub index_value: KeyValue,
    pub primary_key: String,
}

impl IndexEntry {
    pub fn new(
        index_name: impl Into<String>,
        index_value: impl Into<KeyValue>,
        primary_key: impl Into<String>,
    ) -> Self {
        Self {
            index_name: index_name.into(),
            index_value: index_value.into(),
            primary_key: primary_key.into(),
        }
    }

    /// Returns the composite key under which this entry is stored.
    pub fn encode_key(&self) -> Vec<u8> {
        entry_key(&self.index_name, &self.index_value, &self.primary_key)
    }
}

/// Builds the composite key for `(index_name, index_value, primary_key)`.
pub fn entry_key(index_name: &str, index_value: &KeyValue, primary_key: &str) -> Vec<u8> {
    let mut key = value_prefix(index_name, index_value);
    push_text(&mut key, primary_key);
    key
}

/// Returns the prefix shared by every entry of one index.
pub fn index_prefix(index_name: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(index_name.len() + 3);
    push_text(&mut prefix, index_name);
    prefix
}

/// Returns the prefix shared by every entry of one index value.
pub fn value_prefix(index_name: &str, index_value: &KeyValue) -> Vec<u8> {
    let mut prefix = index_prefix(index_name);
    index_value.encode_into(&mut prefix);
    prefix
}

/// Appends an encoded primary key to `prefix`, producing a full composite bound.
pub fn bounded_key(prefix: &[u8], primary_key: &str) -> Vec<u8> {
    let mut key = prefix.to_vec();
    push_text(&mut key, primary_key);
    key
}

/// Returns `prefix ++ 0xFF`, which sorts after every key starting with `prefix`.
pub fn prefix_upper_bound(prefix: &[u8]) -> Vec<u8> {
    let mut bound = prefix.to_vec();
    bound.push(PARTITION_SENTINEL);
    bound
}

/// Parses a composite key produced by [`entry_key`].
pub fn decode_entry_key(bytes: &[u8]) -> IndexResult<IndexEntry> {
    let (index_name, mut offset) = KeyValue::decode_prefix(bytes)?;
    let (index_value, read) = KeyValue::decode_prefix(&bytes[offset..])?;
    offset += read;
    let primary_key = KeyValue::decode(&bytes[offset..])?;

    match (index_name, primary_key) {
        (KeyValue::Text(index_name), KeyValue::Text(primary_key)) => Ok(IndexEntry {
            index_name,
            index_value,
            primary_key,
        }),
        _ => bail!(
            ErrorKind::KeyDecodingFailed,
            "Index entry key has non-text name or primary key"
        ),
    }
}

fn push_text(out: &mut Vec<u8>, text: &str) {
    KeyValue::Text(text.to_string()).encode_into(out);
}
