//! The state store the mirror dispatches into.
//!
//! The mirror only needs two things from a store: somewhere to send
//! actions, and the current immutable state snapshot. [`LocalStore`] is a
//! small reference implementation.

use crate::actions::Action;
use crate::mirror::MirrorStorage;
use crate::state::{MirrorReducer, MirrorState};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

/// Receives actions.
pub trait Dispatch: Send + Sync {
    fn dispatch(&self, action: Action);
}

/// A store holding immutable state snapshots.
pub trait StateStore: Dispatch + 'static {
    type State: Send + Sync + 'static;

    /// The current snapshot.
    fn state(&self) -> Arc<Self::State>;
}

/// Default buffer size of an action tap.
const DEFAULT_TAP_BUFFER: usize = 1024;

type Reducer<S> = Box<dyn Fn(&S, &Action) -> S + Send + Sync>;

struct Inner<S> {
    state: Arc<S>,
    taps: Vec<Sender<Action>>,
}

/// In-process store applying a reducer on every dispatch.
///
/// Published snapshots are never mutated; each dispatch swaps in a new one.
pub struct LocalStore<S> {
    inner: Mutex<Inner<S>>,
    reducer: Reducer<S>,
    tap_buffer: usize,
}

impl<S: Send + Sync + 'static> LocalStore<S> {
    pub fn new<F>(initial: S, reducer: F) -> Self
    where
        F: Fn(&S, &Action) -> S + Send + Sync + 'static,
    {
        Self {
            inner: Mutex::new(Inner {
                state: Arc::new(initial),
                taps: Vec::new(),
            }),
            reducer: Box::new(reducer),
            tap_buffer: DEFAULT_TAP_BUFFER,
        }
    }

    /// Receive every action dispatched from now on.
    ///
    /// A tap whose buffer fills up, or whose receiver is dropped, is removed.
    pub fn watch(&self) -> Receiver<Action> {
        let (sender, receiver) = bounded(self.tap_buffer);
        self.inner.lock().taps.push(sender);
        receiver
    }

    pub fn tap_count(&self) -> usize {
        self.inner.lock().taps.len()
    }
}

impl<M: MirrorStorage> LocalStore<MirrorState<M>> {
    /// A store whose whole state is the mirror slice.
    pub fn mirror(reducer: MirrorReducer<M>) -> Self {
        Self::new(MirrorState::new(), move |state, action| {
            reducer.reduce(state, action)
        })
    }
}

impl<S: Send + Sync + 'static> Dispatch for LocalStore<S> {
    fn dispatch(&self, action: Action) {
        let mut inner = self.inner.lock();
        let next = (self.reducer)(&inner.state, &action);
        inner.state = Arc::new(next);

        trace!(action = action.kind(), "dispatched");
        inner.taps.retain(|tap| match tap.try_send(action.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        });
    }
}

impl<S: Send + Sync + 'static> StateStore for LocalStore<S> {
    type State = S;

    fn state(&self) -> Arc<S> {
        Arc::clone(&self.inner.lock().state)
    }
}
