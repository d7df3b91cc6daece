//! Mirror configuration.

use crate::cache::{CacheStorage, CacheWriter};
use crate::listeners::Database;
use crate::mirror::{MirrorStorage, MirrorTree};
use crate::state::{MirrorReducer, MountFn};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Prefix of cache entry names when none is configured.
pub const DEFAULT_STORAGE_PREFIX: &str = "firebase-mirror:";

/// Default length of a coalescing window.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_millis(100);

/// Where and how received values are cached locally.
#[derive(Clone)]
pub struct PersistConfig {
    pub storage: Arc<dyn CacheStorage>,
    pub storage_prefix: Option<String>,
}

impl PersistConfig {
    pub fn new(storage: Arc<dyn CacheStorage>) -> Self {
        Self {
            storage,
            storage_prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.storage_prefix = Some(prefix.into());
        self
    }

    /// The configured prefix, or [`DEFAULT_STORAGE_PREFIX`].
    pub fn prefix(&self) -> &str {
        self.storage_prefix
            .as_deref()
            .unwrap_or(DEFAULT_STORAGE_PREFIX)
    }
}

impl fmt::Debug for PersistConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistConfig")
            .field("storage_prefix", &self.prefix())
            .finish_non_exhaustive()
    }
}

/// Configuration of one mirror instance.
///
/// `S` is the application state type the reducer is mounted into and `M`
/// the mirror storage strategy.
pub struct Config<S, M: MirrorStorage = MirrorTree> {
    /// Locates the mirror slice in the application state.
    pub mount: MountFn<S, M>,

    /// The remote database.
    pub database: Arc<dyn Database>,

    /// Length of the coalescing window for live deliveries and cache reads.
    /// Default: 100ms
    pub sync_interval: Duration,

    /// Local cache (None = no caching).
    pub persist: Option<PersistConfig>,
}

impl<S, M: MirrorStorage> Config<S, M> {
    pub fn new(mount: MountFn<S, M>, database: Arc<dyn Database>) -> Self {
        Self {
            mount,
            database,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            persist: None,
        }
    }

    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    pub fn with_persistence(mut self, persist: PersistConfig) -> Self {
        self.persist = Some(persist);
        self
    }

    /// The reducer to mount at the location `mount` reads from. It writes
    /// live values into the cache when persistence is configured.
    pub fn reducer(&self) -> MirrorReducer<M> {
        let reducer = MirrorReducer::new();
        match &self.persist {
            Some(persist) => reducer.with_cache_writer(CacheWriter::from_config(persist)),
            None => reducer,
        }
    }
}

impl<S, M: MirrorStorage> fmt::Debug for Config<S, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("sync_interval", &self.sync_interval)
            .field("persist", &self.persist)
            .finish_non_exhaustive()
    }
}
