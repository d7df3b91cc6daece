//! Storage backends for the cache.

use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Result of a storage read: available now, or later.
pub enum StorageRead {
    Ready(Option<String>),
    Pending(BoxFuture<'static, Option<String>>),
}

impl From<Option<String>> for StorageRead {
    fn from(value: Option<String>) -> Self {
        StorageRead::Ready(value)
    }
}

/// Key-value string storage used for both cache reads and cache writes.
pub trait CacheStorage: Send + Sync {
    fn get_item(&self, key: &str) -> StorageRead;

    fn set_item(&self, key: &str, value: String);
}

/// Synchronous in-memory storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw stored text under `key`.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.items.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl CacheStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> StorageRead {
        StorageRead::Ready(self.raw(key))
    }

    fn set_item(&self, key: &str, value: String) {
        self.items.write().insert(key.to_string(), value);
    }
}
