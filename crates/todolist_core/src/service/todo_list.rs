//! List State Container.
//!
//! # Responsibility
//! - Hold the canonical todo list and expose read-only snapshots.
//! - Apply append/remove-at synchronously, then write the full list through
//!   to the store without waiting for the outcome.
//! - Hydrate from the store exactly once per container lifetime.
//!
//! # Invariants
//! - Lifecycle only moves forward: `Uninitialized -> Hydrating -> Ready`.
//! - Mutations are rejected until `Ready`; out-of-range removals are rejected.
//! - Write requests are queued in the same order snapshots are installed.
//! - A failed write never rolls back or alters the in-memory list.

use crate::config::TodoListConfig;
use crate::model::snapshot::TodoSnapshot;
use crate::persistence::{PersistenceError, PersistenceStats, PersistenceWorker};
use crate::store::kv_store::{KeyValueStore, StoreError};
use crate::store::sqlite_kv::SqliteKeyValueStore;
use log::{debug, info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub type TodoListResult<T> = Result<T, TodoListError>;

/// Container lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Empty list, hydration not started.
    Uninitialized,
    /// Load request in flight.
    Hydrating,
    /// Terminal steady state.
    Ready,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Hydrating => "hydrating",
            Self::Ready => "ready",
        }
    }
}

impl Display for LifecycleState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the one-time hydration ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HydrationOutcome {
    /// A stored list was found and installed.
    Restored { items: usize },
    /// Nothing stored yet (first run).
    Empty,
    /// Read or decode failed; the container continues with an empty list.
    Recovered { reason: String },
}

/// Errors surfaced to callers of the container.
#[derive(Debug)]
pub enum TodoListError {
    /// Mutation attempted before hydration finished.
    NotReady(LifecycleState),
    /// `hydrate` called a second time.
    AlreadyHydrated(LifecycleState),
    InvalidPosition { position: usize, len: usize },
    /// The persistence thread could not be started.
    WorkerSpawn(std::io::Error),
    Store(StoreError),
}

impl Display for TodoListError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotReady(state) => write!(f, "todo list is not ready (state: {state})"),
            Self::AlreadyHydrated(state) => {
                write!(f, "todo list hydration already started (state: {state})")
            }
            Self::InvalidPosition { position, len } => write!(
                f,
                "position {position} is out of range for a list of {len} item(s)"
            ),
            Self::WorkerSpawn(err) => write!(f, "failed to start persistence worker: {err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TodoListError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::WorkerSpawn(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for TodoListError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Handle returned by [`TodoListContainer::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&TodoSnapshot) + Send + Sync>;

struct ContainerState {
    lifecycle: LifecycleState,
    snapshot: TodoSnapshot,
    hydration: Option<HydrationOutcome>,
}

impl ContainerState {
    fn ensure_ready(&self) -> TodoListResult<()> {
        match self.lifecycle {
            LifecycleState::Ready => Ok(()),
            other => Err(TodoListError::NotReady(other)),
        }
    }
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(SubscriptionId, Listener)>,
}

/// Listener delivery bookkeeping; at most one thread delivers at a time.
#[derive(Default)]
struct Delivery {
    in_progress: bool,
    last_revision: Option<u64>,
}

/// Clears `in_progress` even if a listener panics.
struct DeliveryGuard<'a>(&'a Shared);

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        self.0.lock_delivery().in_progress = false;
    }
}

/// State reachable from the persistence thread (hydration completion).
struct Shared {
    state: Mutex<ContainerState>,
    ready: Condvar,
    listeners: Mutex<Listeners>,
    delivery: Mutex<Delivery>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, ContainerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_delivery(&self) -> MutexGuard<'_, Delivery> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish_hydration(&self, result: Result<Option<Vec<String>>, PersistenceError>) {
        let (outcome, snapshot) = {
            let mut state = self.lock_state();
            let outcome = match result {
                Ok(Some(items)) => {
                    let count = items.len();
                    state.snapshot = state.snapshot.replaced_with(items);
                    HydrationOutcome::Restored { items: count }
                }
                Ok(None) => HydrationOutcome::Empty,
                Err(err) => HydrationOutcome::Recovered {
                    reason: err.to_string(),
                },
            };
            state.lifecycle = LifecycleState::Ready;
            state.hydration = Some(outcome.clone());
            (outcome, state.snapshot.clone())
        };
        self.ready.notify_all();

        match &outcome {
            HydrationOutcome::Recovered { reason } => warn!(
                "event=todo_hydrate module=service status=recovered items=0 reason={}",
                reason
            ),
            _ => info!(
                "event=todo_hydrate module=service status=ok items={} revision={}",
                snapshot.len(),
                snapshot.revision()
            ),
        }
        self.notify();
    }

    /// Delivers the current snapshot to every listener.
    ///
    /// If another thread is already delivering, this returns at once and that
    /// thread picks up the newer revision before it finishes. Listeners thus
    /// receive revisions in increasing order and always end on the latest one;
    /// intermediate revisions may be skipped.
    fn notify(&self) {
        loop {
            let snapshot = {
                let mut delivery = self.lock_delivery();
                if delivery.in_progress {
                    return;
                }
                let snapshot = self.lock_state().snapshot.clone();
                if delivery
                    .last_revision
                    .is_some_and(|last| snapshot.revision() <= last)
                {
                    return;
                }
                delivery.in_progress = true;
                delivery.last_revision = Some(snapshot.revision());
                snapshot
            };

            let _guard = DeliveryGuard(self);
            // Cloned out so listeners may (un)subscribe from inside the callback.
            let listeners: Vec<Listener> = self
                .lock_listeners()
                .entries
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect();
            for listener in listeners {
                listener(&snapshot);
            }
        }
    }
}

/// Owner of the canonical todo list.
///
/// Construct one per composition root and pass it by reference to the
/// presentation layer; nothing here is process-global.
pub struct TodoListContainer {
    shared: Arc<Shared>,
    worker: PersistenceWorker,
    storage_key: String,
    flush_timeout: Duration,
}

impl TodoListContainer {
    /// Creates an `Uninitialized` container persisting through `store`.
    ///
    /// # Errors
    /// - [`TodoListError::WorkerSpawn`] when the persistence thread cannot start.
    pub fn new<S>(store: S, config: &TodoListConfig) -> TodoListResult<Self>
    where
        S: KeyValueStore + Send + 'static,
    {
        let worker = PersistenceWorker::spawn(store).map_err(TodoListError::WorkerSpawn)?;
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ContainerState {
                    lifecycle: LifecycleState::Uninitialized,
                    snapshot: TodoSnapshot::empty(),
                    hydration: None,
                }),
                ready: Condvar::new(),
                listeners: Mutex::new(Listeners::default()),
                delivery: Mutex::new(Delivery::default()),
            }),
            worker,
            storage_key: config.storage_key.clone(),
            flush_timeout: config.flush_timeout,
        })
    }

    /// Opens the SQLite store at `config.db_path` and builds a container on it.
    pub fn open(config: &TodoListConfig) -> TodoListResult<Self> {
        let store = SqliteKeyValueStore::open(&config.db_path)?;
        Self::new(store, config)
    }

    /// Starts the one-time load of the persisted list and returns immediately.
    ///
    /// Completion moves the container to `Ready` whatever the load result;
    /// see [`HydrationOutcome`].
    ///
    /// # Errors
    /// - [`TodoListError::AlreadyHydrated`] on every call after the first.
    pub fn hydrate(&self) -> TodoListResult<()> {
        {
            let mut state = self.shared.lock_state();
            if state.lifecycle != LifecycleState::Uninitialized {
                return Err(TodoListError::AlreadyHydrated(state.lifecycle));
            }
            state.lifecycle = LifecycleState::Hydrating;
        }
        info!(
            "event=todo_hydrate module=service status=start key={}",
            self.storage_key
        );

        let shared = Arc::clone(&self.shared);
        let submitted = self.worker.load(
            self.storage_key.as_str(),
            Box::new(move |result| shared.finish_hydration(result)),
        );
        if !submitted {
            self.shared.finish_hydration(Err(PersistenceError::Store(
                StoreError::Unavailable("persistence worker stopped".to_string()),
            )));
        }
        Ok(())
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.lock_state().lifecycle
    }

    /// `None` until hydration has completed.
    pub fn hydration_outcome(&self) -> Option<HydrationOutcome> {
        self.shared.lock_state().hydration.clone()
    }

    /// Blocks until `Ready` or until `timeout` elapses; returns whether ready.
    pub fn wait_until_ready(&self, timeout: Duration) -> bool {
        let state = self.shared.lock_state();
        let (state, _) = self
            .shared
            .ready
            .wait_timeout_while(state, timeout, |state| {
                state.lifecycle != LifecycleState::Ready
            })
            .unwrap_or_else(PoisonError::into_inner);
        state.lifecycle == LifecycleState::Ready
    }

    /// The list as of the last completed mutation (or hydration).
    pub fn snapshot(&self) -> TodoSnapshot {
        self.shared.lock_state().snapshot.clone()
    }

    /// Adds `item` at the end of the list.
    ///
    /// The new snapshot is installed before this returns; the write-through
    /// is queued and its outcome only shows up in [`Self::persistence_stats`].
    ///
    /// # Errors
    /// - [`TodoListError::NotReady`] before hydration completes.
    pub fn append(&self, item: impl Into<String>) -> TodoListResult<TodoSnapshot> {
        let item = item.into();
        self.mutate("append", |snapshot| Ok(snapshot.appended(item)))
    }

    /// Removes the item at zero-based `position`.
    ///
    /// # Errors
    /// - [`TodoListError::NotReady`] before hydration completes.
    /// - [`TodoListError::InvalidPosition`] when `position >= len`; the list
    ///   is left unchanged and nothing is written.
    pub fn remove_at(&self, position: usize) -> TodoListResult<TodoSnapshot> {
        self.mutate("remove_at", |snapshot| {
            snapshot
                .removed_at(position)
                .ok_or(TodoListError::InvalidPosition {
                    position,
                    len: snapshot.len(),
                })
        })
    }

    /// Registers `listener` to be told about newly installed snapshots.
    ///
    /// Deliveries arrive in increasing revision order and always end on the
    /// latest snapshot, but revisions installed while a delivery is running
    /// are coalesced into one call. A listener may run on the thread that
    /// mutated the list or on the persistence worker thread (the hydration
    /// delivery always does). Calling [`Self::flush`] from inside a listener
    /// therefore waits on itself and returns `false` after the timeout.
    pub fn subscribe(
        &self,
        listener: impl Fn(&TodoSnapshot) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut listeners = self.shared.lock_listeners();
        listeners.next_id += 1;
        let id = SubscriptionId(listeners.next_id);
        listeners.entries.push((id, Arc::new(listener)));
        id
    }

    /// Returns `false` when `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.shared.lock_listeners();
        let before = listeners.entries.len();
        listeners.entries.retain(|(entry_id, _)| *entry_id != id);
        listeners.entries.len() != before
    }

    /// Waits (up to the configured flush timeout) for queued writes to finish.
    pub fn flush(&self) -> bool {
        self.flush_within(self.flush_timeout)
    }

    /// Like [`Self::flush`] with an explicit `timeout`.
    pub fn flush_within(&self, timeout: Duration) -> bool {
        self.worker.flush(timeout)
    }

    pub fn persistence_stats(&self) -> PersistenceStats {
        self.worker.stats()
    }

    fn mutate(
        &self,
        operation: &'static str,
        transition: impl FnOnce(&TodoSnapshot) -> TodoListResult<TodoSnapshot>,
    ) -> TodoListResult<TodoSnapshot> {
        let next = {
            let mut state = self.shared.lock_state();
            state.ensure_ready()?;
            let next = match transition(&state.snapshot) {
                Ok(next) => next,
                Err(err) => {
                    warn!(
                        "event=todo_mutate module=service status=rejected op={} error={}",
                        operation, err
                    );
                    return Err(err);
                }
            };
            state.snapshot = next.clone();
            // Queued under the state lock so write order matches snapshot order.
            self.worker.save(self.storage_key.as_str(), next.clone());
            next
        };

        debug!(
            "event=todo_mutate module=service status=ok op={} items={} revision={}",
            operation,
            next.len(),
            next.revision()
        );
        self.shared.notify();
        Ok(next)
    }
}
