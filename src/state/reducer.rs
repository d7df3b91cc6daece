//! Reducer applying actions to the mirror state.

use super::registry::{SubscriptionInfo, Subscriptions};
use crate::actions::{Action, ReceivedValues};
use crate::cache::CacheWriter;
use crate::error::Result;
use crate::mirror::{MirrorStorage, MirrorTree};
use crate::path::{join, PathSpec};
use crate::types::{JsonValue, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::marker::PhantomData;

/// State slice owned by the mirror: the registry plus the mirrored tree.
#[derive(Clone, Debug, PartialEq)]
pub struct MirrorState<M: MirrorStorage = MirrorTree> {
    pub subscriptions: Subscriptions,
    pub mirror: M,
}

impl<M: MirrorStorage> MirrorState<M> {
    pub fn new() -> Self {
        Self {
            subscriptions: Subscriptions::default(),
            mirror: M::empty(),
        }
    }
}

impl<M: MirrorStorage> Default for MirrorState<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable form of [`MirrorState`] with subscription times removed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DehydratedState {
    pub mirror: JsonValue,
    pub subscriptions: BTreeMap<String, SubscriptionInfo>,
}

impl DehydratedState {
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Mirror paths to write and registry keys to stamp for one batch.
#[derive(Debug, Default, PartialEq)]
pub struct ExpandedValues {
    pub writes: BTreeMap<String, JsonValue>,
    pub updated_keys: Vec<String>,
}

/// Expand a batch into mirror writes.
///
/// Plain specs write their value at their path. Query results are written
/// child by child at `base/child`, so the children become readable as plain
/// paths while results of different queries on the same base merge.
///
/// Each child is stamped in the registry under its own path. Like mirrored
/// values, those entries outlive the query: unsubscribing removes only the
/// query's own key, and `has_received_value` keeps answering for children.
pub fn expand_received(values: &ReceivedValues) -> ExpandedValues {
    let mut expanded = ExpandedValues::default();
    for (key, received) in values {
        expanded.updated_keys.push(key.clone());
        match &received.path_spec {
            PathSpec::Plain(_) => {
                expanded.writes.insert(key.clone(), received.value.clone());
            }
            PathSpec::Query(query) => {
                if let JsonValue::Object(children) = &received.value {
                    for (child, value) in children {
                        let path = join(&query.path, child);
                        expanded.writes.insert(path.clone(), value.clone());
                        expanded.updated_keys.push(path);
                    }
                }
            }
        }
    }
    expanded
}

/// Cached values for specs already covered by a received value are older
/// than what the mirror has; drop them.
fn stale_cache_removed(subscriptions: &Subscriptions, values: &ReceivedValues) -> ReceivedValues {
    values
        .iter()
        .filter(|(_, received)| !subscriptions.has_received_value(&received.path_spec))
        .map(|(key, received)| (key.clone(), received.clone()))
        .collect()
}

/// Applies [`Action`]s to a [`MirrorState`], producing a new state.
pub struct MirrorReducer<M: MirrorStorage = MirrorTree> {
    clock: fn() -> Timestamp,
    cache_writer: Option<CacheWriter>,
    _storage: PhantomData<fn() -> M>,
}

impl<M: MirrorStorage> MirrorReducer<M> {
    pub fn new() -> Self {
        Self {
            clock: Timestamp::now,
            cache_writer: None,
            _storage: PhantomData,
        }
    }

    /// Use `clock` for registry timestamps.
    pub fn with_clock(mut self, clock: fn() -> Timestamp) -> Self {
        self.clock = clock;
        self
    }

    /// Mirror live values into local storage as they arrive.
    pub fn with_cache_writer(mut self, writer: CacheWriter) -> Self {
        self.cache_writer = Some(writer);
        self
    }

    pub fn reduce(&self, state: &MirrorState<M>, action: &Action) -> MirrorState<M> {
        match action {
            Action::SubscribeToValues { paths } => MirrorState {
                subscriptions: state.subscriptions.subscribe(paths, (self.clock)()),
                mirror: state.mirror.clone(),
            },

            Action::UnsubscribeFromValues { paths } => MirrorState {
                subscriptions: state.subscriptions.unsubscribe(paths),
                mirror: state.mirror.clone(),
            },

            Action::ReceiveSnapshots { values, from_cache } => {
                if !from_cache {
                    if let Some(writer) = &self.cache_writer {
                        writer.persist(values);
                    }
                }
                let fresh;
                let values = if *from_cache {
                    fresh = stale_cache_removed(&state.subscriptions, values);
                    &fresh
                } else {
                    values
                };
                if values.is_empty() {
                    return state.clone();
                }
                let expanded = expand_received(values);
                MirrorState {
                    subscriptions: state
                        .subscriptions
                        .record_updates(expanded.updated_keys, (self.clock)()),
                    mirror: state.mirror.set_values(&expanded.writes),
                }
            }

            Action::Rehydrate { data } => MirrorState {
                subscriptions: Subscriptions::from_entries(data.subscriptions.clone()),
                mirror: M::from_json(data.mirror.clone()),
            },
        }
    }
}

impl<M: MirrorStorage> Default for MirrorReducer<M> {
    fn default() -> Self {
        Self::new()
    }
}
