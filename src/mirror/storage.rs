//! Pluggable storage strategy for the mirror.

use crate::types::JsonValue;
use std::collections::BTreeMap;

/// A hierarchical tree store holding mirrored values.
///
/// Implementations are immutable snapshots: [`set_values`](Self::set_values)
/// returns a new mirror and leaves the receiver untouched, so readers holding
/// an older snapshot never observe a partially applied batch.
pub trait MirrorStorage: Clone + Send + Sync + 'static {
    /// An empty mirror.
    fn empty() -> Self;

    /// Child keys of the node at `path`. Empty when the node is absent or a leaf.
    fn keys_at_path(&self, path: &str) -> Vec<String>;

    /// The value at `path`, materialized as JSON.
    fn value_at_path(&self, path: &str) -> Option<JsonValue>;

    /// Write each value at its normalized path.
    ///
    /// A write replaces whatever was stored at that path and leaves siblings
    /// untouched.
    fn set_values(&self, values: &BTreeMap<String, JsonValue>) -> Self;

    /// The whole mirror as JSON.
    fn to_json(&self) -> JsonValue;

    /// Build a mirror from JSON previously produced by [`to_json`](Self::to_json).
    fn from_json(value: JsonValue) -> Self;
}
