//! Selectors over the application state.

use super::reducer::{DehydratedState, MirrorState};
use super::registry::Subscriptions;
use crate::error::{MirrorError, Result};
use crate::mirror::{MirrorStorage, MirrorTree};
use crate::path::{normalize, PathSpec};
use crate::types::JsonValue;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// Locates the mirror slice inside the application state.
///
/// `None` means the reducer is not mounted where it was configured to be.
pub type MountFn<S, M = MirrorTree> = fn(&S) -> Option<&MirrorState<M>>;

/// Default capacity of the coverage memo.
const DEFAULT_MEMO_CAPACITY: usize = 1024;

#[derive(Clone, Copy, Debug)]
struct Coverage {
    subscribed: bool,
    received: bool,
}

/// Coverage lookups computed against one registry snapshot.
struct RegistryMemo {
    source: Subscriptions,
    lookups: LruCache<String, Coverage>,
}

/// Selectors bound to a mount function.
///
/// Coverage queries walk a plain path's ancestors; results are memoized per
/// registry snapshot and the memo is dropped as soon as a different snapshot
/// is queried.
pub struct Selectors<S, M: MirrorStorage = MirrorTree> {
    mount: MountFn<S, M>,
    memo: Mutex<Option<RegistryMemo>>,
    memo_capacity: NonZeroUsize,
}

impl<S, M: MirrorStorage> Selectors<S, M> {
    pub fn new(mount: MountFn<S, M>) -> Self {
        Self::with_memo_capacity(mount, DEFAULT_MEMO_CAPACITY)
    }

    pub fn with_memo_capacity(mount: MountFn<S, M>, capacity: usize) -> Self {
        Self {
            mount,
            memo: Mutex::new(None),
            memo_capacity: NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN),
        }
    }

    /// The mirror slice, or [`MirrorError::NotMounted`].
    pub fn mirror_state<'a>(&self, state: &'a S) -> Result<&'a MirrorState<M>> {
        (self.mount)(state).ok_or(MirrorError::NotMounted)
    }

    pub fn subscriptions<'a>(&self, state: &'a S) -> Result<&'a Subscriptions> {
        Ok(&self.mirror_state(state)?.subscriptions)
    }

    pub fn mirror<'a>(&self, state: &'a S) -> Result<&'a M> {
        Ok(&self.mirror_state(state)?.mirror)
    }

    /// Whether a live listener covers `spec`.
    pub fn is_subscribed(&self, state: &S, spec: &PathSpec) -> Result<bool> {
        Ok(self.coverage(self.subscriptions(state)?, spec).subscribed)
    }

    /// Whether a value covering `spec` has been received.
    pub fn has_received_value(&self, state: &S, spec: &PathSpec) -> Result<bool> {
        Ok(self.coverage(self.subscriptions(state)?, spec).received)
    }

    pub fn keys_at_path(&self, state: &S, path: &str) -> Result<Vec<String>> {
        if normalize(path).is_empty() {
            return Err(MirrorError::MissingPath("get keys"));
        }
        Ok(self.mirror(state)?.keys_at_path(path))
    }

    pub fn value_at_path(&self, state: &S, path: &str) -> Result<Option<JsonValue>> {
        if normalize(path).is_empty() {
            return Err(MirrorError::MissingPath("get a value"));
        }
        Ok(self.mirror(state)?.value_at_path(path))
    }

    /// Serializable copy of the mirror slice, without subscription times.
    pub fn dehydrated_state(&self, state: &S) -> Result<DehydratedState> {
        let mirror_state = self.mirror_state(state)?;
        Ok(DehydratedState {
            mirror: mirror_state.mirror.to_json(),
            subscriptions: mirror_state.subscriptions.dehydrate(),
        })
    }

    fn coverage(&self, subscriptions: &Subscriptions, spec: &PathSpec) -> Coverage {
        let mut guard = self.memo.lock();
        if guard
            .as_ref()
            .map_or(false, |m| !m.source.same_snapshot(subscriptions))
        {
            *guard = None;
        }
        let lookups = &mut guard
            .get_or_insert_with(|| RegistryMemo {
                source: subscriptions.clone(),
                lookups: LruCache::new(self.memo_capacity),
            })
            .lookups;

        let key = spec.key();
        if let Some(coverage) = lookups.get(&key) {
            return *coverage;
        }
        let coverage = Coverage {
            subscribed: subscriptions.is_subscribed(spec),
            received: subscriptions.has_received_value(spec),
        };
        lookups.put(key, coverage);
        coverage
    }
}
