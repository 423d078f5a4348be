//! Configuration types and loading for the indexer workspace.
//!
//! [`shared`] holds the settings consumed by the indexing engine, [`environment`] resolves
//! the runtime environment and [`load_config`] merges file and environment sources.

pub mod environment;
mod load;
pub mod shared;

pub use load::{Config, LoadConfigError, load_config, load_config_from};
