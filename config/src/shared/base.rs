use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The index namespace name cannot be empty.
    #[error("`index_namespace` cannot be empty")]
    EmptyIndexNamespace,
    /// Scans must fetch at least one entry per page.
    #[error("`scan_page_size` cannot be zero")]
    ScanPageSizeZero,
    /// The drift broadcast channel needs room for at least one event.
    #[error("`drift_channel_capacity` cannot be zero")]
    DriftChannelCapacityZero,
    /// A field holds a value outside its allowed range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
}
