//! Shared configuration types for the indexing engine.

mod base;
mod indexer;
mod maintenance;

pub use base::ValidationError;
pub use indexer::IndexerConfig;
pub use maintenance::{MaintenanceConfig, MaintenancePolicy, RetryConfig};
