//! Live and one-shot listeners on the remote database.

use super::batcher::SnapshotBatcher;
use super::database::{build_query, Database, DatabaseRef};
use crate::actions::receive_snapshots;
use crate::path::PathSpec;
use crate::store::Dispatch;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, trace};

type DoneCallback = Box<dyn FnOnce() + Send>;

/// Counts outstanding one-shot reads and fires once all have reported.
struct FetchCompletion {
    remaining: AtomicUsize,
    done: Mutex<Option<(Option<DoneCallback>, oneshot::Sender<()>)>>,
}

impl FetchCompletion {
    fn complete_one(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        if let Some((callback, sender)) = self.done.lock().take() {
            if let Some(callback) = callback {
                callback();
            }
            let _ = sender.send(());
        }
    }
}

/// Owns the live listeners opened on the remote database.
pub struct ListenerManager {
    database: Arc<dyn Database>,
    batcher: SnapshotBatcher,
    dispatch: Arc<dyn Dispatch>,
    /// Attached references by path spec key.
    live: Mutex<HashMap<String, Box<dyn DatabaseRef>>>,
}

impl ListenerManager {
    pub fn new(
        database: Arc<dyn Database>,
        batcher: SnapshotBatcher,
        dispatch: Arc<dyn Dispatch>,
    ) -> Self {
        Self {
            database,
            batcher,
            dispatch,
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Attach a persistent listener for `spec` feeding the batcher.
    ///
    /// Returns false, attaching nothing, when a listener for the same key is
    /// already attached.
    pub fn listen(&self, spec: &PathSpec) -> bool {
        let key = spec.key();
        let mut live = self.live.lock();
        if live.contains_key(&key) {
            trace!(key = %key, "listener already attached");
            return false;
        }

        let reference = build_query(self.database.as_ref(), spec);
        let batcher = self.batcher.clone();
        let delivered = spec.clone();
        reference.on_value(Arc::new(move |snapshot| {
            batcher.deliver(delivered.clone(), snapshot.into_value());
        }));
        trace!(key = %key, "listener attached");
        live.insert(key, reference);
        true
    }

    /// Detach the persistent listener for `spec`.
    pub fn detach(&self, spec: &PathSpec) {
        let attached = self.live.lock().remove(&spec.key());
        match attached {
            Some(reference) => reference.off_value(),
            // Not opened by this manager; detach at the location instead.
            None => build_query(self.database.as_ref(), spec).off_value(),
        }
        trace!(key = %spec, "listener detached");
    }

    /// Number of attached persistent listeners.
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    /// Read each spec once. Every read is dispatched as its own
    /// `RECEIVE_SNAPSHOTS` action as soon as it arrives, bypassing the
    /// batcher. `callback` runs and the returned future resolves once every
    /// read has reported.
    pub fn fetch(
        &self,
        specs: Vec<PathSpec>,
        callback: Option<DoneCallback>,
    ) -> impl Future<Output = ()> + Send + 'static {
        let (sender, receiver) = oneshot::channel();
        let completion = Arc::new(FetchCompletion {
            remaining: AtomicUsize::new(specs.len()),
            done: Mutex::new(Some((callback, sender))),
        });

        if specs.is_empty() {
            completion.remaining.store(1, Ordering::Release);
            completion.complete_one();
        }

        debug!(count = specs.len(), "fetching values once");
        for spec in specs {
            let reference = build_query(self.database.as_ref(), &spec);
            let dispatch = Arc::clone(&self.dispatch);
            let completion = Arc::clone(&completion);
            reference.once_value(Box::new(move |snapshot| {
                dispatch.dispatch(receive_snapshots([(spec, snapshot.into_value())]));
                completion.complete_one();
            }));
        }

        async move {
            let _ = receiver.await;
        }
    }
}
