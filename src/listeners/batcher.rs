//! Coalescing of live snapshot deliveries.

use crate::actions::receive_snapshots;
use crate::path::PathSpec;
use crate::store::Dispatch;
use crate::types::JsonValue;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, trace};

/// Deliveries waiting for the current window to close.
#[derive(Default)]
struct BatchState {
    queue: Vec<(PathSpec, JsonValue)>,
    flush_scheduled: bool,
}

struct BatcherInner {
    dispatch: Arc<dyn Dispatch>,
    interval: Duration,
    runtime: Handle,
    state: Mutex<BatchState>,
}

/// Turns live deliveries into `RECEIVE_SNAPSHOTS` actions at a bounded rate.
///
/// The first delivery of an idle period is dispatched at once and opens a
/// window of one sync interval. Deliveries inside the window are queued and
/// dispatched together when it closes. At most one flush is scheduled at a
/// time.
#[derive(Clone)]
pub struct SnapshotBatcher {
    inner: Arc<BatcherInner>,
}

impl SnapshotBatcher {
    pub fn new(dispatch: Arc<dyn Dispatch>, interval: Duration, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(BatcherInner {
                dispatch,
                interval,
                runtime,
                state: Mutex::new(BatchState::default()),
            }),
        }
    }

    /// Accept one delivery for `spec`.
    pub fn deliver(&self, spec: PathSpec, value: JsonValue) {
        {
            let mut state = self.inner.state.lock();
            if state.flush_scheduled {
                trace!(key = %spec, queued = state.queue.len() + 1, "queueing delivery");
                state.queue.push((spec, value));
                return;
            }
            state.flush_scheduled = true;
        }

        trace!(key = %spec, "dispatching delivery immediately");
        self.inner.dispatch.dispatch(receive_snapshots([(spec, value)]));

        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            tokio::time::sleep(inner.interval).await;
            inner.flush();
        });
    }

    /// Number of deliveries waiting for the current window to close.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().queue.len()
    }
}

impl BatcherInner {
    fn flush(&self) {
        let queue = {
            let mut state = self.state.lock();
            state.flush_scheduled = false;
            std::mem::take(&mut state.queue)
        };
        if queue.is_empty() {
            return;
        }
        debug!(count = queue.len(), "flushing batched deliveries");
        self.dispatch.dispatch(receive_snapshots(queue));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Action;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        actions: Mutex<Vec<Action>>,
    }

    impl Dispatch for Recorder {
        fn dispatch(&self, action: Action) {
            self.actions.lock().push(action);
        }
    }

    impl Recorder {
        fn batch_sizes(&self) -> Vec<usize> {
            self.actions
                .lock()
                .iter()
                .map(|action| match action {
                    Action::ReceiveSnapshots { values, .. } => values.len(),
                    other => panic!("Expected ReceiveSnapshots, got {:?}", other),
                })
                .collect()
        }
    }

    const INTERVAL: Duration = Duration::from_millis(100);

    fn batcher(recorder: &Arc<Recorder>) -> SnapshotBatcher {
        SnapshotBatcher::new(recorder.clone(), INTERVAL, Handle::current())
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_coalesced() {
        let recorder = Arc::new(Recorder::default());
        let batcher = batcher(&recorder);

        batcher.deliver(PathSpec::from("a"), json!(1));
        batcher.deliver(PathSpec::from("b"), json!(2));
        batcher.deliver(PathSpec::from("c"), json!(3));

        assert_eq!(recorder.batch_sizes(), vec![1]);
        assert_eq!(batcher.pending(), 2);

        tokio::time::sleep(INTERVAL + Duration::from_millis(1)).await;
        tokio::task::yield_now().await;

        assert_eq!(recorder.batch_sizes(), vec![1, 2]);
        assert_eq!(batcher.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_key_keeps_last_value() {
        let recorder = Arc::new(Recorder::default());
        let batcher = batcher(&recorder);

        batcher.deliver(PathSpec::from("a"), json!(1));
        batcher.deliver(PathSpec::from("a"), json!(2));
        batcher.deliver(PathSpec::from("a"), json!(3));

        tokio::time::sleep(INTERVAL * 2).await;
        tokio::task::yield_now().await;

        let actions = recorder.actions.lock();
        assert_eq!(actions.len(), 2);
        match &actions[1] {
            Action::ReceiveSnapshots { values, .. } => {
                assert_eq!(values.len(), 1);
                assert_eq!(values["a"].value, json!(3));
            }
            other => panic!("Expected ReceiveSnapshots, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_window_closes_without_dispatch() {
        let recorder = Arc::new(Recorder::default());
        let batcher = batcher(&recorder);

        batcher.deliver(PathSpec::from("a"), json!(1));
        tokio::time::sleep(INTERVAL * 2).await;
        tokio::task::yield_now().await;
        assert_eq!(recorder.batch_sizes(), vec![1]);

        // The next delivery starts a fresh window and goes out immediately.
        batcher.deliver(PathSpec::from("b"), json!(2));
        assert_eq!(recorder.batch_sizes(), vec![1, 1]);
    }
}
