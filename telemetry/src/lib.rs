//! Tracing setup shared by the indexer binaries and tests.

pub mod tracing;

pub use tracing::{TracingError, init_test_tracing, init_tracing};
