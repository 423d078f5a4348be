pub mod base;
pub mod memory;
pub mod namespace;
pub mod scan;

pub use base::{BatchOp, KeyRange, KvEntry, KvStore};
pub use memory::MemoryStore;
pub use namespace::Namespace;
pub use scan::{delete_range, scan};
