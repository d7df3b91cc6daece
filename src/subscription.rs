//! Declarative subscriptions: which paths a computation reads, and how to
//! compute it once they are mirrored.

use crate::client::MirrorClient;
use crate::error::{MirrorError, Result};
use crate::mirror::MirrorStorage;
use crate::path::PathSpec;
use crate::store::StateStore;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Maximum number of one-shot fetch rounds [`Subscription::fetch_now`]
/// issues before giving up.
pub const MAX_FETCH_ROUNDS: usize = 32;

type PathsFn<S, P> = Arc<dyn Fn(&S, &P) -> Vec<PathSpec> + Send + Sync>;
type ValueFn<S, P, R> = Arc<dyn Fn(&S, &P) -> R + Send + Sync>;

/// A paths function and a value function over `(state, props)`.
///
/// `paths` may depend on mirrored data, e.g. the members of a list are only
/// known once the list itself has been read.
pub struct Subscription<S, P, R> {
    paths: PathsFn<S, P>,
    value: ValueFn<S, P, R>,
}

impl<S, P, R> Clone for Subscription<S, P, R> {
    fn clone(&self) -> Self {
        Self {
            paths: Arc::clone(&self.paths),
            value: Arc::clone(&self.value),
        }
    }
}

impl<S: 'static, P: 'static, R: 'static> Subscription<S, P, R> {
    pub fn new<FP, FV>(paths: FP, value: FV) -> Self
    where
        FP: Fn(&S, &P) -> Vec<PathSpec> + Send + Sync + 'static,
        FV: Fn(&S, &P) -> R + Send + Sync + 'static,
    {
        Self {
            paths: Arc::new(paths),
            value: Arc::new(value),
        }
    }

    pub fn paths(&self, state: &S, props: &P) -> Vec<PathSpec> {
        (self.paths)(state, props)
    }

    pub fn value(&self, state: &S, props: &P) -> R {
        (self.value)(state, props)
    }

    /// A subscription over different props, converted with `transform`
    /// before either function runs. `self` is left as it is.
    pub fn map_props<Q, F>(&self, transform: F) -> Subscription<S, Q, R>
    where
        Q: 'static,
        F: Fn(&Q) -> P + Send + Sync + 'static,
    {
        let transform = Arc::new(transform);
        let paths = Arc::clone(&self.paths);
        let value = Arc::clone(&self.value);
        let paths_transform = Arc::clone(&transform);
        Subscription {
            paths: Arc::new(move |state: &S, props: &Q| paths(state, &paths_transform(props))),
            value: Arc::new(move |state: &S, props: &Q| value(state, &transform(props))),
        }
    }

    /// Open live listeners for the paths currently required.
    pub fn subscribe<St, M>(&self, client: &MirrorClient<St, M>, props: &P) -> Result<()>
    where
        St: StateStore<State = S>,
        M: MirrorStorage,
    {
        let paths = self.paths(&client.state(), props);
        client.subscribe_to_values(paths)
    }

    /// Fetch everything the value depends on, then compute it.
    ///
    /// Paths are read once; after every round the path set is recomputed and
    /// only paths not read before are fetched. Resolves with the value
    /// computed from the state after the last round, once no new path is
    /// required.
    pub async fn fetch_now<St, M>(&self, client: &MirrorClient<St, M>, props: &P) -> Result<R>
    where
        St: StateStore<State = S>,
        M: MirrorStorage,
    {
        let mut fetched = HashSet::new();
        let mut rounds = 0;
        loop {
            let required = self.paths(&client.state(), props);
            let fresh: Vec<PathSpec> = required
                .into_iter()
                .filter(|spec| fetched.insert(spec.key()))
                .collect();

            if fresh.is_empty() {
                debug!(rounds, paths = fetched.len(), "fetch converged");
                return Ok(self.value(&client.state(), props));
            }
            if rounds == MAX_FETCH_ROUNDS {
                warn!(
                    rounds,
                    pending = fresh.len(),
                    "path set still growing, giving up"
                );
                return Err(MirrorError::FetchDidNotConverge { rounds });
            }

            rounds += 1;
            debug!(round = rounds, count = fresh.len(), "fetching paths");
            client.fetch_values(fresh).await;
        }
    }
}

/// Named subscriptions evaluated together.
///
/// The path set is every member's paths in name order; the value maps each
/// name to its member's value.
pub struct SubscriptionSet<S, P, R> {
    members: BTreeMap<String, Subscription<S, P, R>>,
}

impl<S, P, R> Default for SubscriptionSet<S, P, R> {
    fn default() -> Self {
        Self {
            members: BTreeMap::new(),
        }
    }
}

impl<S: 'static, P: 'static, R: 'static> SubscriptionSet<S, P, R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, subscription: Subscription<S, P, R>) -> Self {
        self.members.insert(name.into(), subscription);
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn paths(&self, state: &S, props: &P) -> Vec<PathSpec> {
        self.members
            .values()
            .flat_map(|member| member.paths(state, props))
            .collect()
    }

    pub fn value(&self, state: &S, props: &P) -> BTreeMap<String, R> {
        self.members
            .iter()
            .map(|(name, member)| (name.clone(), member.value(state, props)))
            .collect()
    }

    /// The whole set as one subscription.
    pub fn into_subscription(self) -> Subscription<S, P, BTreeMap<String, R>> {
        let members = Arc::new(self);
        let for_value = Arc::clone(&members);
        Subscription {
            paths: Arc::new(move |state: &S, props: &P| members.paths(state, props)),
            value: Arc::new(move |state: &S, props: &P| for_value.value(state, props)),
        }
    }
}
