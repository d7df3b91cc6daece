//! One-shot reads and convergence fetches.

mod common;

use common::{config, drain_kinds, setup, FakeDatabase};
use firebase_mirror::{
    MirrorError, MirrorState, MirrorStorage, PathSpec, Subscription, SubscriptionSet,
    MAX_FETCH_ROUNDS,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn once_calls(db: &FakeDatabase) -> Vec<String> {
    db.calls()
        .into_iter()
        .filter(|call| call.starts_with("once("))
        .collect()
}

#[tokio::test]
async fn test_fetch_dispatches_each_read() {
    let db = FakeDatabase::new();
    db.set_data(json!({"a": 1, "b": {"c": 2}}));
    let (store, client) = setup(config(&db));
    let tap = store.watch();

    client.fetch_values(["a", "b"]).await;

    assert_eq!(drain_kinds(&tap), vec!["receive_snapshots", "receive_snapshots"]);
    assert_eq!(client.value_at_path("b/c").unwrap(), Some(json!(2)));
    assert!(client.has_received_value("a").unwrap());
    // One-shot reads leave no listener behind.
    assert!(!client.is_subscribed("a").unwrap());
    assert_eq!(client.live_listener_count(), 0);
}

#[tokio::test]
async fn test_fetch_waits_for_deferred_reads() {
    let db = FakeDatabase::new().with_deferred_reads();
    db.set_data(json!({"a": "x", "b": "y"}));
    let (_store, client) = setup(config(&db));
    let called = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&called);
    let done = client.fetch_values_then(["a", "b"], move || flag.store(true, Ordering::SeqCst));
    assert_eq!(client.value_at_path("a").unwrap(), None);

    done.await;

    assert!(called.load(Ordering::SeqCst));
    assert_eq!(client.value_at_path("a").unwrap(), Some(json!("x")));
    assert_eq!(client.value_at_path("b").unwrap(), Some(json!("y")));
}

#[tokio::test]
async fn test_empty_fetch_completes_immediately() {
    let db = FakeDatabase::new();
    let (store, client) = setup(config(&db));
    let tap = store.watch();
    let called = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&called);
    client
        .fetch_values_then(Vec::<PathSpec>::new(), move || flag.store(true, Ordering::SeqCst))
        .await;

    assert!(called.load(Ordering::SeqCst));
    assert!(drain_kinds(&tap).is_empty());
    assert!(db.calls().is_empty());
}

/// Names of the items in a list; the items are only known once the list is.
fn list_items() -> Subscription<MirrorState, String, Vec<String>> {
    Subscription::new(
        |state: &MirrorState, list: &String| {
            let list_path = format!("lists/{}", list);
            let mut paths = vec![PathSpec::from(list_path.clone())];
            for item in state.mirror.keys_at_path(&list_path) {
                paths.push(PathSpec::from(format!("items/{}", item)));
            }
            paths
        },
        |state: &MirrorState, list: &String| {
            state
                .mirror
                .keys_at_path(&format!("lists/{}", list))
                .iter()
                .filter_map(|item| state.mirror.value_at_path(&format!("items/{}/name", item)))
                .filter_map(|name| name.as_str().map(String::from))
                .collect()
        },
    )
}

#[tokio::test]
async fn test_fetch_now_follows_revealed_paths() {
    let db = FakeDatabase::new();
    db.set_data(json!({
        "lists": {"l1": {"a": true, "b": true}},
        "items": {"a": {"name": "Apple"}, "b": {"name": "Banana"}, "c": {"name": "Cherry"}},
    }));
    let (_store, client) = setup(config(&db));

    let names = list_items()
        .fetch_now(&client, &"l1".to_string())
        .await
        .unwrap();

    assert_eq!(names, vec!["Apple".to_string(), "Banana".to_string()]);
    assert_eq!(
        once_calls(&db),
        vec!["once(lists/l1)", "once(items/a)", "once(items/b)"]
    );
}

#[tokio::test]
async fn test_fetch_now_with_deferred_reads() {
    let db = FakeDatabase::new().with_deferred_reads();
    db.set_data(json!({
        "lists": {"l1": {"b": true}},
        "items": {"b": {"name": "Banana"}},
    }));
    let (_store, client) = setup(config(&db));

    let names = list_items()
        .fetch_now(&client, &"l1".to_string())
        .await
        .unwrap();

    assert_eq!(names, vec!["Banana".to_string()]);
}

#[tokio::test]
async fn test_fetch_now_mapped_props() {
    let db = FakeDatabase::new();
    db.set_data(json!({
        "lists": {"l7": {"a": true}},
        "items": {"a": {"name": "Apple"}},
    }));
    let (_store, client) = setup(config(&db));
    let by_number = list_items().map_props(|n: &u32| format!("l{}", n));

    let names = by_number.fetch_now(&client, &7).await.unwrap();

    assert_eq!(names, vec!["Apple".to_string()]);
}

#[tokio::test]
async fn test_fetch_now_gives_up_on_endless_growth() {
    let db = FakeDatabase::new();
    let counter: serde_json::Map<String, serde_json::Value> =
        (0..100).map(|i| (i.to_string(), json!(true))).collect();
    db.set_data(json!({ "counter": counter }));
    let (_store, client) = setup(config(&db));

    // Every value read reveals one more path.
    let endless = Subscription::new(
        |state: &MirrorState, _: &()| {
            let seen = state.mirror.keys_at_path("counter").len();
            (0..=seen)
                .map(|i| PathSpec::from(format!("counter/{}", i)))
                .collect()
        },
        |_: &MirrorState, _: &()| (),
    );

    let result = endless.fetch_now(&client, &()).await;

    assert!(matches!(
        result,
        Err(MirrorError::FetchDidNotConverge { rounds }) if rounds == MAX_FETCH_ROUNDS
    ));
    assert_eq!(once_calls(&db).len(), MAX_FETCH_ROUNDS);
}

#[tokio::test]
async fn test_subscription_set_fetches_every_member() {
    let db = FakeDatabase::new();
    db.set_data(json!({
        "lists": {"l1": {"a": true}},
        "items": {"a": {"name": "Apple"}},
    }));
    let (_store, client) = setup(config(&db));

    let title = Subscription::new(
        |_: &MirrorState, list: &String| vec![PathSpec::from(format!("lists/{}", list))],
        |state: &MirrorState, list: &String| {
            state.mirror.keys_at_path(&format!("lists/{}", list))
        },
    );
    let set = SubscriptionSet::new()
        .with("keys", title)
        .with("names", list_items())
        .into_subscription();

    let value = set.fetch_now(&client, &"l1".to_string()).await.unwrap();

    assert_eq!(value["keys"], vec!["a".to_string()]);
    assert_eq!(value["names"], vec!["Apple".to_string()]);
}

#[tokio::test]
async fn test_subscribe_opens_listeners_for_current_paths() {
    let db = FakeDatabase::new();
    let (_store, client) = setup(config(&db));

    list_items().subscribe(&client, &"l1".to_string()).unwrap();

    assert!(client.is_subscribed("lists/l1").unwrap());
    assert_eq!(db.listener_count("lists/l1"), 1);
}
