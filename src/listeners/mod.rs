//! Remote listeners and the batching of their deliveries.
//!
//! Live deliveries flow from the [`Database`] through the
//! [`SnapshotBatcher`], which forwards the first delivery of an idle period
//! at once and coalesces the rest into one batch per sync interval.

mod batcher;
mod database;
mod manager;

pub use batcher::SnapshotBatcher;
pub use database::{build_query, Database, DatabaseRef, OnceCallback, ValueCallback};
pub use manager::ListenerManager;
