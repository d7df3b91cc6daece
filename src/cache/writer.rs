//! Writes received values back into the cache.

use super::storage::CacheStorage;
use crate::actions::ReceivedValues;
use crate::config::PersistConfig;
use std::sync::Arc;
use tracing::{trace, warn};

/// Stores each received value under `prefix + key`.
#[derive(Clone)]
pub struct CacheWriter {
    storage: Arc<dyn CacheStorage>,
    prefix: String,
}

impl CacheWriter {
    pub fn new(storage: Arc<dyn CacheStorage>, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
        }
    }

    pub fn from_config(config: &PersistConfig) -> Self {
        Self::new(Arc::clone(&config.storage), config.prefix())
    }

    /// Persist a batch. Values that fail to encode are skipped.
    pub fn persist(&self, values: &ReceivedValues) {
        for (key, received) in values {
            match serde_json::to_string(&received.value) {
                Ok(text) => {
                    trace!(key = %key, "caching received value");
                    self.storage.set_item(&format!("{}{}", self.prefix, key), text);
                }
                Err(e) => warn!(key = %key, error = %e, "failed to encode value for cache"),
            }
        }
    }
}
