//! Shared fixtures: an in-process fake of the remote database.

#![allow(dead_code)]

use firebase_mirror::{
    normalize, Action, Config, DataSnapshot, Database, DatabaseRef, JsonValue, LocalStore,
    MirrorClient, MirrorState, OnceCallback, ValueCallback,
};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct FakeInner {
    calls: Mutex<Vec<String>>,
    listeners: Mutex<HashMap<String, Vec<ValueCallback>>>,
    data: Mutex<JsonValue>,
    deferred_reads: AtomicBool,
}

/// Records every call made on it. Live listeners fire on [`emit`](Self::emit);
/// one-shot reads answer from [`set_data`](Self::set_data).
#[derive(Clone, Default)]
pub struct FakeDatabase {
    inner: Arc<FakeInner>,
}

impl FakeDatabase {
    pub fn new() -> Self {
        let db = Self::default();
        *db.inner.data.lock() = json!({});
        db
    }

    /// Answer one-shot reads from a spawned task rather than inline.
    pub fn with_deferred_reads(self) -> Self {
        self.inner.deferred_reads.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_data(&self, data: JsonValue) {
        *self.inner.data.lock() = data;
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.inner.calls.lock().clear();
    }

    pub fn listener_count(&self, path: &str) -> usize {
        self.inner
            .listeners
            .lock()
            .get(normalize(path))
            .map_or(0, Vec::len)
    }

    /// Deliver `value` to every live listener at `path`.
    pub fn emit(&self, path: &str, value: JsonValue) {
        let path = normalize(path).to_string();
        let callbacks = self
            .inner
            .listeners
            .lock()
            .get(&path)
            .cloned()
            .unwrap_or_default();
        for callback in callbacks {
            callback(DataSnapshot::new(path.clone(), value.clone()));
        }
    }
}

impl Database for FakeDatabase {
    fn reference(&self, path: &str) -> Box<dyn DatabaseRef> {
        self.inner.calls.lock().push(format!("ref({})", path));
        Box::new(FakeRef {
            inner: Arc::clone(&self.inner),
            path: normalize(path).to_string(),
        })
    }
}

struct FakeRef {
    inner: Arc<FakeInner>,
    path: String,
}

impl FakeRef {
    fn record(self: Box<Self>, call: String) -> Box<dyn DatabaseRef> {
        self.inner.calls.lock().push(call);
        self
    }
}

impl DatabaseRef for FakeRef {
    fn order_by_key(self: Box<Self>) -> Box<dyn DatabaseRef> {
        self.record("orderByKey()".to_string())
    }

    fn order_by_child(self: Box<Self>, child: &str) -> Box<dyn DatabaseRef> {
        self.record(format!("orderByChild({})", child))
    }

    fn order_by_value(self: Box<Self>) -> Box<dyn DatabaseRef> {
        self.record("orderByValue()".to_string())
    }

    fn limit_to_first(self: Box<Self>, limit: u32) -> Box<dyn DatabaseRef> {
        self.record(format!("limitToFirst({})", limit))
    }

    fn limit_to_last(self: Box<Self>, limit: u32) -> Box<dyn DatabaseRef> {
        self.record(format!("limitToLast({})", limit))
    }

    fn start_at(self: Box<Self>, value: &JsonValue) -> Box<dyn DatabaseRef> {
        self.record(format!("startAt({})", value))
    }

    fn end_at(self: Box<Self>, value: &JsonValue) -> Box<dyn DatabaseRef> {
        self.record(format!("endAt({})", value))
    }

    fn equal_to(self: Box<Self>, value: &JsonValue) -> Box<dyn DatabaseRef> {
        self.record(format!("equalTo({})", value))
    }

    fn on_value(&self, callback: ValueCallback) {
        self.inner.calls.lock().push(format!("on({})", self.path));
        self.inner
            .listeners
            .lock()
            .entry(self.path.clone())
            .or_default()
            .push(callback);
    }

    fn off_value(&self) {
        self.inner.calls.lock().push(format!("off({})", self.path));
        self.inner.listeners.lock().remove(&self.path);
    }

    fn once_value(&self, callback: OnceCallback) {
        self.inner.calls.lock().push(format!("once({})", self.path));
        let value = self
            .inner
            .data
            .lock()
            .pointer(&format!("/{}", self.path))
            .cloned()
            .unwrap_or(JsonValue::Null);
        let snapshot = DataSnapshot::new(self.path.clone(), value);

        if self.inner.deferred_reads.load(Ordering::SeqCst) {
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                callback(snapshot);
            });
        } else {
            callback(snapshot);
        }
    }
}

pub type TestStore = LocalStore<MirrorState>;
pub type TestClient = MirrorClient<TestStore>;

pub fn mount(state: &MirrorState) -> Option<&MirrorState> {
    Some(state)
}

/// Route the crate's logs to the test harness output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// A store whose whole state is the mirror slice, and a client on it.
pub fn setup(config: Config<MirrorState>) -> (Arc<TestStore>, TestClient) {
    init_tracing();
    let store = Arc::new(LocalStore::mirror(config.reducer()));
    let client = MirrorClient::new(config, Arc::clone(&store)).unwrap();
    (store, client)
}

pub fn config(db: &FakeDatabase) -> Config<MirrorState> {
    Config::new(mount, Arc::new(db.clone()))
}

/// Kinds of all actions received so far on a store tap.
pub fn drain_kinds(tap: &crossbeam_channel::Receiver<Action>) -> Vec<&'static str> {
    tap.try_iter().map(|action| action.kind()).collect()
}
