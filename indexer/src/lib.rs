//! Secondary indexes over an ordered key-value store.
//!
//! A [`table::Table`] stores JSON records under string keys in a [`store::Namespace`] of a
//! [`store::KvStore`]. An [`indexed::IndexedTable`] derives index entries from every record
//! through user supplied map functions, keeps them current as records are written and
//! resolves index queries back to records.

pub mod codec;
pub mod concurrency;
pub mod error;
pub mod failpoints;
pub mod hooks;
pub mod index;
pub mod indexed;
mod macros;
pub mod store;
pub mod table;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use indexed::IndexedTable;
