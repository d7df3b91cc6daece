//! Warms the mirror from the local cache.

use super::storage::{CacheStorage, StorageRead};
use crate::actions::{Action, ReceivedValue, ReceivedValues};
use crate::path::PathSpec;
use crate::store::Dispatch;
use crate::types::JsonValue;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// The cached value of one path spec, once its read has completed.
///
/// Misses and unparsable entries resolve to `None`.
pub struct CacheLoad {
    inner: LoadInner,
}

enum LoadInner {
    Ready(Option<JsonValue>),
    Pending(JoinHandle<Option<JsonValue>>),
}

impl CacheLoad {
    pub fn ready(value: Option<JsonValue>) -> Self {
        Self {
            inner: LoadInner::Ready(value),
        }
    }

    fn pending(handle: JoinHandle<Option<JsonValue>>) -> Self {
        Self {
            inner: LoadInner::Pending(handle),
        }
    }
}

impl Future for CacheLoad {
    type Output = Option<JsonValue>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.inner {
            LoadInner::Ready(value) => Poll::Ready(value.take()),
            LoadInner::Pending(handle) => Pin::new(handle)
                .poll(cx)
                .map(|joined| joined.ok().flatten()),
        }
    }
}

/// Values of one load call, staged until they are dispatched.
struct LoadBatch {
    staged: ReceivedValues,
    received: usize,
    total: usize,
    flush_timer: Option<JoinHandle<()>>,
}

struct BatchShared {
    batch: Mutex<LoadBatch>,
    dispatch: Arc<dyn Dispatch>,
    interval: Duration,
    runtime: Handle,
}

impl BatchShared {
    /// Record one completed read. Returns the parsed value.
    fn stage(&self, key: String, spec: PathSpec, raw: Option<String>) -> Option<JsonValue> {
        let parsed = raw.and_then(|text| match serde_json::from_str::<JsonValue>(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                trace!(key = %key, error = %e, "skipping unparsable cache entry");
                None
            }
        });

        let mut batch = self.batch.lock();
        batch.received += 1;
        if let Some(value) = &parsed {
            batch.staged.insert(
                key,
                ReceivedValue {
                    path_spec: spec,
                    value: value.clone(),
                },
            );
        }
        parsed
    }

    /// Dispatch now if every read has completed, otherwise make sure staged
    /// values go out within one sync interval.
    fn settle(self: &Arc<Self>) {
        let values = {
            let mut batch = self.batch.lock();
            if batch.received < batch.total {
                if !batch.staged.is_empty() && batch.flush_timer.is_none() {
                    let shared = Arc::clone(self);
                    batch.flush_timer = Some(self.runtime.spawn(async move {
                        tokio::time::sleep(shared.interval).await;
                        shared.flush_staged();
                    }));
                }
                return;
            }
            if let Some(timer) = batch.flush_timer.take() {
                timer.abort();
            }
            std::mem::take(&mut batch.staged)
        };
        self.dispatch_values(values);
    }

    fn flush_staged(&self) {
        let values = {
            let mut batch = self.batch.lock();
            batch.flush_timer = None;
            std::mem::take(&mut batch.staged)
        };
        self.dispatch_values(values);
    }

    fn dispatch_values(&self, values: ReceivedValues) {
        if values.is_empty() {
            return;
        }
        debug!(count = values.len(), "dispatching cached values");
        self.dispatch.dispatch(Action::ReceiveSnapshots {
            values,
            from_cache: true,
        });
    }
}

/// Reads cached values for path specs and dispatches them as
/// `RECEIVE_SNAPSHOTS` actions marked `from_cache`.
pub struct CacheLoader {
    storage: Arc<dyn CacheStorage>,
    prefix: String,
    interval: Duration,
    dispatch: Arc<dyn Dispatch>,
    runtime: Handle,
}

impl CacheLoader {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        prefix: impl Into<String>,
        interval: Duration,
        dispatch: Arc<dyn Dispatch>,
        runtime: Handle,
    ) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
            interval,
            dispatch,
            runtime,
        }
    }

    /// Load every spec from the cache, one [`CacheLoad`] per spec.
    ///
    /// When every read is synchronous, the values are dispatched as a single
    /// action before this returns. Asynchronous reads are dispatched in
    /// batches: all at once when the last read completes, or whatever has
    /// arrived after one sync interval.
    pub fn load(&self, specs: &[PathSpec]) -> Vec<CacheLoad> {
        let shared = Arc::new(BatchShared {
            batch: Mutex::new(LoadBatch {
                staged: ReceivedValues::new(),
                received: 0,
                total: specs.len(),
                flush_timer: None,
            }),
            dispatch: Arc::clone(&self.dispatch),
            interval: self.interval,
            runtime: self.runtime.clone(),
        });

        let reads: Vec<(String, StorageRead)> = specs
            .iter()
            .map(|spec| {
                let key = spec.key();
                let read = self.storage.get_item(&format!("{}{}", self.prefix, key));
                (key, read)
            })
            .collect();

        let mut loads = Vec::with_capacity(reads.len());
        let mut pending = Vec::new();
        for ((key, read), spec) in reads.into_iter().zip(specs) {
            match read {
                StorageRead::Ready(raw) => {
                    loads.push(Some(CacheLoad::ready(shared.stage(key, spec.clone(), raw))));
                }
                StorageRead::Pending(future) => {
                    loads.push(None);
                    pending.push((loads.len() - 1, key, spec.clone(), future));
                }
            }
        }
        shared.settle();

        for (index, key, spec, future) in pending {
            let shared = Arc::clone(&shared);
            let handle = self.runtime.spawn(async move {
                let raw = future.await;
                let value = shared.stage(key, spec, raw);
                shared.settle();
                value
            });
            loads[index] = Some(CacheLoad::pending(handle));
        }

        loads.into_iter().flatten().collect()
    }
}
