use serde::{Deserialize, Serialize};

use crate::Config;
use crate::shared::{MaintenanceConfig, ValidationError};

/// Settings for one indexed table.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IndexerConfig {
    /// Name of the sub-namespace, under the primary table, that holds index entries.
    #[serde(default = "default_index_namespace")]
    pub index_namespace: String,
    /// Number of entries fetched per store round trip by range scans.
    ///
    /// Also the batch size used when rebuilding an index.
    #[serde(default = "default_scan_page_size")]
    pub scan_page_size: usize,
    /// Capacity of the broadcast channel carrying index drift reports.
    #[serde(default = "default_drift_channel_capacity")]
    pub drift_channel_capacity: usize,
    /// Incremental maintenance behavior.
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

impl IndexerConfig {
    pub const DEFAULT_INDEX_NAMESPACE: &'static str = "_indexes";

    pub const DEFAULT_SCAN_PAGE_SIZE: usize = 256;

    pub const DEFAULT_DRIFT_CHANNEL_CAPACITY: usize = 1_024;

    /// Validates all nested settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.index_namespace.is_empty() {
            return Err(ValidationError::EmptyIndexNamespace);
        }

        if self.scan_page_size == 0 {
            return Err(ValidationError::ScanPageSizeZero);
        }

        if self.drift_channel_capacity == 0 {
            return Err(ValidationError::DriftChannelCapacityZero);
        }

        self.maintenance.retry.validate()
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            index_namespace: default_index_namespace(),
            scan_page_size: default_scan_page_size(),
            drift_channel_capacity: default_drift_channel_capacity(),
            maintenance: MaintenanceConfig::default(),
        }
    }
}

impl Config for IndexerConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

fn default_index_namespace() -> String {
    IndexerConfig::DEFAULT_INDEX_NAMESPACE.to_string()
}

fn default_scan_page_size() -> usize {
    IndexerConfig::DEFAULT_SCAN_PAGE_SIZE
}

fn default_drift_channel_capacity() -> usize {
    IndexerConfig::DEFAULT_DRIFT_CHANNEL_CAPACITY
}
