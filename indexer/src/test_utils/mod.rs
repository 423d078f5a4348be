//! Helpers shared by the unit and integration tests of the indexer.
//!
//! - [`fixtures`] builds the record sets most query tests run against.
//! - [`faulty_store`] wraps a [`crate::store::KvStore`] to inject failures and count calls.
//! - [`observer`] records table changes and notifies waiters.
//! - [`notify`] bounds every wait with a timeout so a broken test fails instead of hanging.
//! - [`failpoints`] configures fail points for the duration of a test.

pub mod failpoints;
pub mod faulty_store;
pub mod fixtures;
pub mod notify;
pub mod observer;
