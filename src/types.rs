//! Core types shared across the mirror.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Any JSON-compatible value held by the remote database.
pub type JsonValue = serde_json::Value;

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_millis() as i64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// A value delivered by the remote database for one reference.
#[derive(Clone, Debug, PartialEq)]
pub struct DataSnapshot {
    /// Identifies the reference the value was read from.
    pub reference: String,
    value: JsonValue,
}

impl DataSnapshot {
    pub fn new(reference: impl Into<String>, value: JsonValue) -> Self {
        Self {
            reference: reference.into(),
            value,
        }
    }

    /// The JSON value at the reference (`null` when absent).
    pub fn val(&self) -> &JsonValue {
        &self.value
    }

    pub fn into_value(self) -> JsonValue {
        self.value
    }
}
