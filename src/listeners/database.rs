//! Interface of the remote database.

use crate::path::{OrderBy, PathSpec};
use crate::types::{DataSnapshot, JsonValue};
use std::sync::Arc;

/// Persistent value listener.
pub type ValueCallback = Arc<dyn Fn(DataSnapshot) + Send + Sync>;

/// One-shot value listener.
pub type OnceCallback = Box<dyn FnOnce(DataSnapshot) + Send>;

/// Entry point of the remote database.
pub trait Database: Send + Sync {
    /// A reference to the location at `path`.
    fn reference(&self, path: &str) -> Box<dyn DatabaseRef>;
}

/// A location or query in the remote database.
///
/// Query builders consume the reference and return the refined query.
pub trait DatabaseRef: Send + Sync {
    fn order_by_key(self: Box<Self>) -> Box<dyn DatabaseRef>;
    fn order_by_child(self: Box<Self>, child: &str) -> Box<dyn DatabaseRef>;
    fn order_by_value(self: Box<Self>) -> Box<dyn DatabaseRef>;

    fn limit_to_first(self: Box<Self>, limit: u32) -> Box<dyn DatabaseRef>;
    fn limit_to_last(self: Box<Self>, limit: u32) -> Box<dyn DatabaseRef>;
    fn start_at(self: Box<Self>, value: &JsonValue) -> Box<dyn DatabaseRef>;
    fn end_at(self: Box<Self>, value: &JsonValue) -> Box<dyn DatabaseRef>;
    fn equal_to(self: Box<Self>, value: &JsonValue) -> Box<dyn DatabaseRef>;

    /// Attach a persistent value listener.
    fn on_value(&self, callback: ValueCallback);

    /// Detach the value listeners of this reference.
    fn off_value(&self);

    /// Read the value once.
    fn once_value(&self, callback: OnceCallback);
}

/// Build the remote query for `spec`: the base reference, at most one
/// ordering, then the filters in key field order.
pub fn build_query(database: &dyn Database, spec: &PathSpec) -> Box<dyn DatabaseRef> {
    let query = match spec {
        PathSpec::Plain(path) => return database.reference(path),
        PathSpec::Query(query) => query,
    };

    let mut reference = database.reference(&query.path);
    reference = match &query.order_by {
        Some(OrderBy::Key) => reference.order_by_key(),
        Some(OrderBy::Child(child)) => reference.order_by_child(child),
        Some(OrderBy::Value) => reference.order_by_value(),
        None => reference,
    };

    let filter = &query.filter;
    if let Some(limit) = filter.limit_to_last {
        reference = reference.limit_to_last(limit);
    }
    if let Some(limit) = filter.limit_to_first {
        reference = reference.limit_to_first(limit);
    }
    if let Some(value) = &filter.end_at {
        reference = reference.end_at(value);
    }
    if let Some(value) = &filter.start_at {
        reference = reference.start_at(value);
    }
    if let Some(value) = &filter.equal_to {
        reference = reference.equal_to(value);
    }
    reference
}
