//! Actions understood by the mirror reducer.

use crate::path::PathSpec;
use crate::state::DehydratedState;
use crate::types::JsonValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value received for one path spec.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedValue {
    pub path_spec: PathSpec,
    pub value: JsonValue,
}

/// Received values keyed by path spec key.
pub type ReceivedValues = BTreeMap<String, ReceivedValue>;

/// Actions dispatched to the state store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    /// Live listeners were opened for these specs.
    #[serde(rename = "FIREBASE/SUBSCRIBE_TO_VALUES")]
    SubscribeToValues { paths: Vec<PathSpec> },

    /// Live listeners were closed for these specs.
    #[serde(rename = "FIREBASE/UNSUBSCRIBE_FROM_VALUES")]
    UnsubscribeFromValues { paths: Vec<PathSpec> },

    /// A batch of values arrived, live or from the local cache.
    #[serde(rename = "FIREBASE/RECEIVE_SNAPSHOTS", rename_all = "camelCase")]
    ReceiveSnapshots {
        values: ReceivedValues,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        from_cache: bool,
    },

    /// Replace the mirror and registry with previously dehydrated content.
    #[serde(rename = "FIREBASE/REHYDRATE")]
    Rehydrate { data: DehydratedState },
}

impl Action {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::SubscribeToValues { .. } => "subscribe_to_values",
            Action::UnsubscribeFromValues { .. } => "unsubscribe_from_values",
            Action::ReceiveSnapshots { .. } => "receive_snapshots",
            Action::Rehydrate { .. } => "rehydrate",
        }
    }
}

/// Build one `RECEIVE_SNAPSHOTS` action from deliveries in receipt order.
///
/// Later deliveries for the same key replace earlier ones.
pub fn receive_snapshots<I>(deliveries: I) -> Action
where
    I: IntoIterator<Item = (PathSpec, JsonValue)>,
{
    let values = deliveries
        .into_iter()
        .map(|(path_spec, value)| (path_spec.key(), ReceivedValue { path_spec, value }))
        .collect();
    Action::ReceiveSnapshots {
        values,
        from_cache: false,
    }
}

/// Build a `REHYDRATE` action. Rehydrating never opens listeners.
pub fn rehydrate(data: DehydratedState) -> Action {
    Action::Rehydrate { data }
}
