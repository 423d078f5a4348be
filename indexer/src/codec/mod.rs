//! Order-preserving key encoding.
//!
//! Each [`KeyValue`] encodes as a type tag followed by a normalized payload, so plain byte
//! comparison of encodings matches the order of the values. Index entry keys concatenate
//! the encodings of the index name, the index value and the primary key.

pub mod key;
pub mod value;

pub use key::{
    IndexEntry, PARTITION_SENTINEL, bounded_key, decode_entry_key, entry_key, index_prefix,
    prefix_upper_bound, value_prefix,
};
pub use value::KeyValue;
