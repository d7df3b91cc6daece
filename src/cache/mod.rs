//! Local cache of mirrored values.
//!
//! The loader warms the mirror from storage before live data arrives; the
//! writer stores live values as they are received. Entries are named
//! `prefix + key` and hold the JSON text of the value.

mod loader;
mod storage;
mod writer;

pub use loader::{CacheLoad, CacheLoader};
pub use storage::{CacheStorage, MemoryStorage, StorageRead};
pub use writer::CacheWriter;
