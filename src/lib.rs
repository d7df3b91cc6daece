//! # Firebase Mirror
//!
//! A partial, live, read-through local mirror of a remote hierarchical
//! database, kept inside an immutable state snapshot.
//!
//! ## Core Concepts
//!
//! - **Path specs**: a bare path, or a path plus ordering and filter
//!   parameters, each with a canonical string key
//! - **Registry**: per-key subscription and last-update timestamps, with
//!   ancestor coverage for bare paths
//! - **Mirror**: the local tree of every value received so far
//! - **Listeners**: live remote listeners whose deliveries are coalesced into
//!   at most one state update per sync interval
//! - **Cache**: received values written to local storage and read back to
//!   warm the mirror on subscribe
//! - **Subscriptions**: declarative path sets, fetched until they stop
//!   growing
//!
//! ## Example
//!
//! ```ignore
//! use firebase_mirror::{Config, LocalStore, MirrorClient, MirrorState, PathSpec};
//! use std::sync::Arc;
//!
//! fn mount(state: &MirrorState) -> Option<&MirrorState> {
//!     Some(state)
//! }
//!
//! let config = Config::new(mount, database);
//! let store = Arc::new(LocalStore::mirror(config.reducer()));
//! let client = MirrorClient::new(config, store)?;
//!
//! client.subscribe_to_values(["users/ann", "posts"])?;
//! client
//!     .fetch_values([PathSpec::query("posts").order_by_child("createdOn").limit_to_last(10)])
//!     .await;
//!
//! let title = client.value_at_path("posts/p1/title")?;
//! ```

pub mod actions;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod listeners;
pub mod mirror;
pub mod path;
pub mod state;
pub mod store;
pub mod subscription;
pub mod types;

// Re-exports
pub use actions::{receive_snapshots, rehydrate, Action, ReceivedValue, ReceivedValues};
pub use cache::{CacheLoad, CacheStorage, MemoryStorage, StorageRead};
pub use client::MirrorClient;
pub use config::{Config, PersistConfig, DEFAULT_STORAGE_PREFIX, DEFAULT_SYNC_INTERVAL};
pub use error::{MirrorError, Result};
pub use listeners::{Database, DatabaseRef, OnceCallback, ValueCallback};
pub use mirror::{MirrorStorage, MirrorTree};
pub use path::{normalize, OrderBy, PathSpec, QueryFilter, QuerySpec};
pub use state::{DehydratedState, MirrorReducer, MirrorState, MountFn, Selectors, SubscriptionInfo};
pub use store::{Dispatch, LocalStore, StateStore};
pub use subscription::{Subscription, SubscriptionSet, MAX_FETCH_ROUNDS};
pub use types::{DataSnapshot, JsonValue, Timestamp};
