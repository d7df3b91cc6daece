//! Mirror state: the subscription registry, the reducer and selectors.
//!
//! The state is never mutated in place. Each action yields a new
//! [`MirrorState`] that shares unchanged parts with the previous one.

mod reducer;
mod registry;
mod selectors;

pub use reducer::{expand_received, DehydratedState, ExpandedValues, MirrorReducer, MirrorState};
pub use registry::{SubscriptionInfo, Subscriptions};
pub use selectors::{MountFn, Selectors};
