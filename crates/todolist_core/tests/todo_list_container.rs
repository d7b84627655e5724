use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use todolist_core::{
    HydrationOutcome, InMemoryKeyValueStore, KeyValueStore, LifecycleState, StoreError,
    StoreResult, TodoListConfig, TodoListContainer, TodoListError,
};

const WAIT: Duration = Duration::from_secs(5);
const KEY: &str = "todoList";

fn hydrated(store: InMemoryKeyValueStore) -> TodoListContainer {
    let container = TodoListContainer::new(store, &TodoListConfig::default()).unwrap();
    container.hydrate().unwrap();
    assert!(container.wait_until_ready(WAIT), "hydration did not finish");
    container
}

fn seeded(items: &[&str]) -> InMemoryKeyValueStore {
    let blob = serde_json::to_string(items).unwrap();
    InMemoryKeyValueStore::with_value(KEY, blob)
}

fn stored_items(store: &InMemoryKeyValueStore) -> Option<Vec<String>> {
    store
        .get(KEY)
        .unwrap()
        .map(|blob| serde_json::from_str(&blob).unwrap())
}

/// Reads succeed; every write fails.
struct ReadOnlyStore(InMemoryKeyValueStore);

impl KeyValueStore for ReadOnlyStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.0.get(key)
    }

    fn set(&self, _key: &str, _value: &str) -> StoreResult<()> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }
}

/// Holds every `get` until the test releases it.
struct GatedStore {
    inner: InMemoryKeyValueStore,
    release: Mutex<Receiver<()>>,
}

impl KeyValueStore for GatedStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let _ = self.release.lock().unwrap().recv_timeout(WAIT);
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.inner.set(key, value)
    }
}

struct UnreadableStore;

impl KeyValueStore for UnreadableStore {
    fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        Err(StoreError::Unavailable("permission denied".to_string()))
    }

    fn set(&self, _key: &str, _value: &str) -> StoreResult<()> {
        Ok(())
    }
}

#[test]
fn append_to_empty_list() {
    let store = InMemoryKeyValueStore::new();
    let container = hydrated(store.clone());

    let snapshot = container.append("buy milk").unwrap();

    assert_eq!(snapshot, ["buy milk"]);
    assert_eq!(container.snapshot(), ["buy milk"]);
    assert!(container.flush());
    assert_eq!(stored_items(&store), Some(vec!["buy milk".to_string()]));
}

#[test]
fn remove_middle_item() {
    let container = hydrated(seeded(&["a", "b", "c"]));

    let snapshot = container.remove_at(1).unwrap();

    assert_eq!(snapshot, ["a", "c"]);
    assert_eq!(container.snapshot(), ["a", "c"]);
}

#[test]
fn hydration_restores_previously_persisted_list() {
    let container = hydrated(seeded(&["x", "y"]));

    assert_eq!(container.snapshot(), ["x", "y"]);
    assert_eq!(
        container.hydration_outcome(),
        Some(HydrationOutcome::Restored { items: 2 })
    );
}

#[test]
fn out_of_bounds_remove_is_rejected_and_list_unchanged() {
    let store = seeded(&["a"]);
    let container = hydrated(store.clone());

    let err = container.remove_at(5).unwrap_err();

    assert!(matches!(
        err,
        TodoListError::InvalidPosition {
            position: 5,
            len: 1
        }
    ));
    assert_eq!(container.snapshot(), ["a"]);
    assert!(container.flush());
    assert_eq!(container.persistence_stats().writes_completed, 0);
    assert_eq!(stored_items(&store), Some(vec!["a".to_string()]));
}

#[test]
fn back_to_back_appends_keep_call_order_in_memory_and_storage() {
    let store = InMemoryKeyValueStore::new();
    let container = hydrated(store.clone());

    container.append("a").unwrap();
    container.append("b").unwrap();

    assert_eq!(container.snapshot(), ["a", "b"]);
    assert!(container.flush());
    assert_eq!(
        stored_items(&store),
        Some(vec!["a".to_string(), "b".to_string()])
    );
    assert_eq!(container.persistence_stats().writes_completed, 2);
}

#[test]
fn hydration_on_empty_store_yields_empty_list() {
    let container = hydrated(InMemoryKeyValueStore::new());

    assert!(container.snapshot().is_empty());
    assert_eq!(container.state(), LifecycleState::Ready);
    assert_eq!(container.hydration_outcome(), Some(HydrationOutcome::Empty));
}

#[test]
fn corrupt_blob_degrades_to_empty_list() {
    let store = InMemoryKeyValueStore::with_value(KEY, "{not json");
    let container = hydrated(store);

    assert!(container.snapshot().is_empty());
    assert!(matches!(
        container.hydration_outcome(),
        Some(HydrationOutcome::Recovered { .. })
    ));
    assert_eq!(container.persistence_stats().reads_failed, 1);

    container.append("fresh start").unwrap();
    assert_eq!(container.snapshot(), ["fresh start"]);
}

#[test]
fn unreadable_store_degrades_to_empty_list() {
    let container = TodoListContainer::new(UnreadableStore, &TodoListConfig::default()).unwrap();
    container.hydrate().unwrap();
    assert!(container.wait_until_ready(WAIT));

    match container.hydration_outcome() {
        Some(HydrationOutcome::Recovered { reason }) => {
            assert!(reason.contains("permission denied"), "reason: {reason}");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(container.snapshot().is_empty());
}

#[test]
fn failing_write_keeps_in_memory_update() {
    let container = TodoListContainer::new(
        ReadOnlyStore(seeded(&["a"])),
        &TodoListConfig::default(),
    )
    .unwrap();
    container.hydrate().unwrap();
    assert!(container.wait_until_ready(WAIT));

    let snapshot = container.append("b").unwrap();
    assert!(container.flush());

    assert_eq!(snapshot, ["a", "b"]);
    assert_eq!(container.snapshot(), ["a", "b"]);
    let stats = container.persistence_stats();
    assert_eq!(stats.writes_failed, 1);
    assert_eq!(stats.writes_completed, 0);

    container.remove_at(0).unwrap();
    assert_eq!(container.snapshot(), ["b"]);
}

#[test]
fn mutations_during_hydration_are_rejected() {
    let (release, gate) = channel();
    let store = GatedStore {
        inner: seeded(&["x"]),
        release: Mutex::new(gate),
    };
    let container = TodoListContainer::new(store, &TodoListConfig::default()).unwrap();
    container.hydrate().unwrap();

    assert_eq!(container.state(), LifecycleState::Hydrating);
    assert!(matches!(
        container.append("too early").unwrap_err(),
        TodoListError::NotReady(LifecycleState::Hydrating)
    ));
    assert!(matches!(
        container.remove_at(0).unwrap_err(),
        TodoListError::NotReady(LifecycleState::Hydrating)
    ));
    assert!(!container.wait_until_ready(Duration::from_millis(20)));

    release.send(()).unwrap();
    assert!(container.wait_until_ready(WAIT));
    assert_eq!(container.snapshot(), ["x"]);
}

#[test]
fn subscribers_are_told_about_hydration() {
    let (tx, rx) = channel();
    let container = TodoListContainer::new(seeded(&["x", "y"]), &TodoListConfig::default()).unwrap();
    container.subscribe(move |snapshot| {
        let _ = tx.send(snapshot.to_vec());
    });

    container.hydrate().unwrap();

    assert_eq!(
        rx.recv_timeout(WAIT).unwrap(),
        vec!["x".to_string(), "y".to_string()]
    );
}

#[test]
fn subscribers_end_on_latest_snapshot_when_hydration_delivery_is_slow() {
    let container = TodoListContainer::new(seeded(&["x", "y"]), &TodoListConfig::default()).unwrap();
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&delivered);
    container.subscribe(move |snapshot| {
        if *snapshot == ["x", "y"] {
            thread::sleep(Duration::from_millis(200));
        }
        sink.lock()
            .unwrap()
            .push((snapshot.revision(), snapshot.to_vec()));
    });

    container.hydrate().unwrap();
    assert!(container.wait_until_ready(WAIT));
    container.append("new").unwrap();
    assert!(container.flush());

    let delivered = delivered.lock().unwrap();
    let (_, last) = delivered.last().unwrap();
    assert_eq!(last, &["x", "y", "new"]);
    assert!(delivered
        .windows(2)
        .all(|pair| pair[0].0 < pair[1].0));
}

#[test]
fn hydration_is_delivered_on_the_persistence_thread() {
    let (tx, rx) = channel();
    let container = TodoListContainer::new(seeded(&["x"]), &TodoListConfig::default()).unwrap();
    container.subscribe(move |_| {
        let _ = tx.send(thread::current().name().map(str::to_string));
    });

    container.hydrate().unwrap();

    assert_eq!(
        rx.recv_timeout(WAIT).unwrap().as_deref(),
        Some("todolist-persistence")
    );
}

#[test]
fn custom_storage_key_is_used_for_reads_and_writes() {
    let store = InMemoryKeyValueStore::with_value("work", r#"["ship it"]"#);
    let config = TodoListConfig::default().with_storage_key("work");
    let container = TodoListContainer::new(store.clone(), &config).unwrap();
    container.hydrate().unwrap();
    assert!(container.wait_until_ready(WAIT));

    container.append("review").unwrap();
    assert!(container.flush());

    assert_eq!(store.get(KEY).unwrap(), None);
    assert_eq!(
        store.get("work").unwrap().as_deref(),
        Some(r#"["ship it","review"]"#)
    );
}
