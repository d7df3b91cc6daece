//! Subscription registry: per-key subscription and update timestamps.

use crate::path::{ancestors, PathSpec};
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Bookkeeping for one path spec key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    /// When a live listener was opened. Unset when the key was only received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<Timestamp>,

    /// When a value for the key last arrived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<Timestamp>,
}

/// Immutable snapshot of the registry.
///
/// Every transition returns a new snapshot; a transition that changes
/// nothing returns one sharing the same allocation, so
/// [`same_snapshot`](Self::same_snapshot) tells whether anything moved.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Subscriptions {
    entries: Arc<BTreeMap<String, SubscriptionInfo>>,
}

impl Subscriptions {
    pub fn get(&self, key: &str) -> Option<&SubscriptionInfo> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SubscriptionInfo)> {
        self.entries.iter()
    }

    /// True when both snapshots share the same allocation.
    pub fn same_snapshot(&self, other: &Subscriptions) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }

    /// Stamp `time` on each spec, keeping any previous `last_update_time`.
    pub fn subscribe(&self, paths: &[PathSpec], now: Timestamp) -> Self {
        if paths.is_empty() {
            return self.clone();
        }
        let mut next = self.clone();
        let entries = Arc::make_mut(&mut next.entries);
        for spec in paths {
            entries.entry(spec.key()).or_default().time = Some(now);
        }
        next
    }

    /// Remove the entries of each spec entirely.
    pub fn unsubscribe(&self, paths: &[PathSpec]) -> Self {
        let keys: Vec<String> = paths
            .iter()
            .map(PathSpec::key)
            .filter(|key| self.entries.contains_key(key))
            .collect();
        if keys.is_empty() {
            return self.clone();
        }
        let mut next = self.clone();
        let entries = Arc::make_mut(&mut next.entries);
        for key in keys {
            entries.remove(&key);
        }
        next
    }

    /// Stamp `last_update_time` on each key, creating entries as needed.
    pub fn record_updates<I, K>(&self, keys: I, now: Timestamp) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let mut keys = keys.into_iter().peekable();
        if keys.peek().is_none() {
            return self.clone();
        }
        let mut next = self.clone();
        let entries = Arc::make_mut(&mut next.entries);
        for key in keys {
            entries.entry(key.into()).or_default().last_update_time = Some(now);
        }
        next
    }

    /// Whether a live listener covers `spec`.
    ///
    /// Plain paths are covered by their own entry or any ancestor's;
    /// structured queries only by an exact key match.
    pub fn is_subscribed(&self, spec: &PathSpec) -> bool {
        self.covered_by(spec, |info| info.time.is_some())
    }

    /// Whether a value covering `spec` has arrived.
    pub fn has_received_value(&self, spec: &PathSpec) -> bool {
        self.covered_by(spec, |info| info.last_update_time.is_some())
    }

    /// Whether `spec` itself, not an ancestor, has a live listener.
    pub fn is_subscribed_exactly(&self, spec: &PathSpec) -> bool {
        self.entries
            .get(&spec.key())
            .map_or(false, |info| info.time.is_some())
    }

    fn covered_by<F>(&self, spec: &PathSpec, pred: F) -> bool
    where
        F: Fn(&SubscriptionInfo) -> bool,
    {
        match spec {
            PathSpec::Plain(path) => ancestors(path)
                .any(|prefix| self.entries.get(prefix).map_or(false, &pred)),
            PathSpec::Query(query) => self.entries.get(&query.key()).map_or(false, &pred),
        }
    }

    /// The registry without subscription times, suitable for persisting.
    pub fn dehydrate(&self) -> BTreeMap<String, SubscriptionInfo> {
        self.entries
            .iter()
            .map(|(key, info)| {
                (
                    key.clone(),
                    SubscriptionInfo {
                        time: None,
                        last_update_time: info.last_update_time,
                    },
                )
            })
            .collect()
    }

    pub fn from_entries(entries: BTreeMap<String, SubscriptionInfo>) -> Self {
        Self {
            entries: Arc::new(entries),
        }
    }
}
