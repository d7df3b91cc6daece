//! The configured mirror instance.

use crate::actions::{rehydrate, Action};
use crate::cache::{CacheLoad, CacheLoader};
use crate::config::Config;
use crate::error::{MirrorError, Result};
use crate::listeners::{ListenerManager, SnapshotBatcher};
use crate::mirror::{MirrorStorage, MirrorTree};
use crate::path::PathSpec;
use crate::state::{DehydratedState, Selectors};
use crate::store::{Dispatch, StateStore};
use crate::types::JsonValue;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info};

/// Keeps the mirror slice of a [`StateStore`] in sync with the remote
/// database.
///
/// One client owns one coalescing window and one set of live listeners;
/// independently configured clients share nothing.
pub struct MirrorClient<St: StateStore, M: MirrorStorage = MirrorTree> {
    store: Arc<St>,
    selectors: Selectors<St::State, M>,
    listeners: ListenerManager,
    cache: Option<CacheLoader>,
    /// Held from the coverage check until listeners are attached or detached.
    registration: Mutex<()>,
}

impl<St: StateStore, M: MirrorStorage> MirrorClient<St, M> {
    /// Create a client dispatching into `store`.
    ///
    /// Must be called from within a tokio runtime; the sync timers are
    /// scheduled on it.
    pub fn new(config: Config<St::State, M>, store: Arc<St>) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| MirrorError::NoRuntime)?;
        let dispatch: Arc<dyn Dispatch> = store.clone();

        let batcher = SnapshotBatcher::new(
            Arc::clone(&dispatch),
            config.sync_interval,
            runtime.clone(),
        );
        let listeners = ListenerManager::new(
            Arc::clone(&config.database),
            batcher,
            Arc::clone(&dispatch),
        );
        let cache = config.persist.as_ref().map(|persist| {
            CacheLoader::new(
                Arc::clone(&persist.storage),
                persist.prefix(),
                config.sync_interval,
                Arc::clone(&dispatch),
                runtime,
            )
        });

        info!(
            sync_interval_ms = config.sync_interval.as_millis() as u64,
            persist = cache.is_some(),
            "mirror client ready"
        );

        Ok(Self {
            store,
            selectors: Selectors::new(config.mount),
            listeners,
            cache,
            registration: Mutex::new(()),
        })
    }

    pub fn store(&self) -> &Arc<St> {
        &self.store
    }

    pub fn selectors(&self) -> &Selectors<St::State, M> {
        &self.selectors
    }

    /// The store's current snapshot.
    pub fn state(&self) -> Arc<St::State> {
        self.store.state()
    }

    /// Number of live listeners currently attached.
    pub fn live_listener_count(&self) -> usize {
        self.listeners.live_count()
    }

    /// Start mirroring `paths`.
    ///
    /// Paths already covered by a live listener, including through an
    /// ancestor, are skipped; if nothing is left, nothing is dispatched.
    /// Otherwise the cache is read for the new paths, one
    /// `SUBSCRIBE_TO_VALUES` is dispatched for all of them and a listener is
    /// attached per path.
    pub fn subscribe_to_values<I>(&self, paths: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<PathSpec>,
    {
        let _registering = self.registration.lock();
        let state = self.store.state();
        let subscriptions = self.selectors.subscriptions(&state)?;

        let mut seen = HashSet::new();
        let fresh: Vec<PathSpec> = paths
            .into_iter()
            .map(Into::into)
            .filter(|spec: &PathSpec| {
                !subscriptions.is_subscribed(spec) && seen.insert(spec.key())
            })
            .collect();
        drop(state);

        if fresh.is_empty() {
            return Ok(());
        }

        debug!(count = fresh.len(), "subscribing to values");
        // Cache reads complete on their own; their values are dispatched
        // whether or not anyone awaits them.
        drop(self.load_values_from_cache(&fresh));

        self.store.dispatch(Action::SubscribeToValues {
            paths: fresh.clone(),
        });
        for spec in &fresh {
            self.listeners.listen(spec);
        }
        Ok(())
    }

    /// Stop mirroring `paths`.
    ///
    /// Only paths with their own listener are affected; a path covered only
    /// through an ancestor is left alone. Mirrored values are kept.
    pub fn unsubscribe_from_values<I>(&self, paths: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<PathSpec>,
    {
        let _registering = self.registration.lock();
        let state = self.store.state();
        let subscriptions = self.selectors.subscriptions(&state)?;

        let mut seen = HashSet::new();
        let covered: Vec<PathSpec> = paths
            .into_iter()
            .map(Into::into)
            .filter(|spec: &PathSpec| {
                subscriptions.is_subscribed_exactly(spec) && seen.insert(spec.key())
            })
            .collect();
        drop(state);

        if covered.is_empty() {
            return Ok(());
        }

        debug!(count = covered.len(), "unsubscribing from values");
        for spec in &covered {
            self.listeners.detach(spec);
        }
        self.store
            .dispatch(Action::UnsubscribeFromValues { paths: covered });
        Ok(())
    }

    /// Read `paths` once. Each result is dispatched as soon as it arrives;
    /// the returned future resolves when all of them have.
    pub fn fetch_values<I>(&self, paths: I) -> impl Future<Output = ()> + Send + 'static
    where
        I: IntoIterator,
        I::Item: Into<PathSpec>,
    {
        self.listeners
            .fetch(paths.into_iter().map(Into::into).collect(), None)
    }

    /// Like [`fetch_values`](Self::fetch_values), also running `callback`
    /// once every read has reported.
    pub fn fetch_values_then<I, F>(
        &self,
        paths: I,
        callback: F,
    ) -> impl Future<Output = ()> + Send + 'static
    where
        I: IntoIterator,
        I::Item: Into<PathSpec>,
        F: FnOnce() + Send + 'static,
    {
        self.listeners.fetch(
            paths.into_iter().map(Into::into).collect(),
            Some(Box::new(callback)),
        )
    }

    /// Read `paths` from the local cache, dispatching what is found.
    ///
    /// Without persistence every load resolves to `None` and nothing is
    /// dispatched.
    pub fn load_values_from_cache(&self, paths: &[PathSpec]) -> Vec<CacheLoad> {
        match &self.cache {
            Some(cache) => cache.load(paths),
            None => paths.iter().map(|_| CacheLoad::ready(None)).collect(),
        }
    }

    /// Replace the mirror slice with previously dehydrated content.
    pub fn rehydrate(&self, data: DehydratedState) {
        self.store.dispatch(rehydrate(data));
    }

    pub fn is_subscribed(&self, spec: impl Into<PathSpec>) -> Result<bool> {
        self.selectors
            .is_subscribed(&self.store.state(), &spec.into())
    }

    pub fn has_received_value(&self, spec: impl Into<PathSpec>) -> Result<bool> {
        self.selectors
            .has_received_value(&self.store.state(), &spec.into())
    }

    pub fn keys_at_path(&self, path: &str) -> Result<Vec<String>> {
        self.selectors.keys_at_path(&self.store.state(), path)
    }

    pub fn value_at_path(&self, path: &str) -> Result<Option<JsonValue>> {
        self.selectors.value_at_path(&self.store.state(), path)
    }

    pub fn dehydrated_state(&self) -> Result<DehydratedState> {
        self.selectors.dehydrated_state(&self.store.state())
    }
}
