//! Secondary indexes: definitions, maintenance, rebuilds and queries.

pub mod definition;
pub mod drift;
pub mod maintainer;
pub mod query;
pub mod rebuild;
pub mod registry;

pub use definition::{Emitter, IndexDefinition, MapFunction, NoopMap};
pub use drift::{DriftCause, DriftReporter, IndexDrift};
pub use maintainer::IndexMaintainer;
pub use query::{IndexRecord, IndexStream, IndexStreamOptions, build_range};
pub use rebuild::RebuildSummary;
pub use registry::{IndexRegistry, RegisteredIndex};
