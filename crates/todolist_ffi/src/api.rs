//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Act as composition root: build the one todo list container per process.
//! - Expose snapshot reads and the two mutations to Dart via FRB.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Mutation responses always carry the list as the UI should now render it.

use log::warn;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Duration;
use todolist_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    TodoListConfig, TodoListContainer, TodoSnapshot,
};

static CONTAINER: OnceLock<TodoListContainer> = OnceLock::new();
static INIT_GUARD: Mutex<()> = Mutex::new(());

/// Minimal health-check API for FRB smoke integration.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Read model for list rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoListView {
    pub items: Vec<String>,
    /// Drives the empty-state placeholder.
    pub is_empty: bool,
    pub revision: u64,
    /// `false` until the stored list has been loaded.
    pub ready: bool,
}

/// Result envelope for append/remove calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoActionResponse {
    pub ok: bool,
    pub message: String,
    /// List after the call; unchanged on failure.
    pub items: Vec<String>,
}

impl TodoActionResponse {
    fn success(message: impl Into<String>, snapshot: &TodoSnapshot) -> Self {
        Self {
            ok: true,
            message: message.into(),
            items: snapshot.to_vec(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            items: CONTAINER
                .get()
                .map(|container| container.snapshot().to_vec())
                .unwrap_or_default(),
        }
    }
}

/// Opens the todo store and starts loading the saved list.
///
/// Storage location comes from `TODOLIST_DB_PATH` / `TODOLIST_STORAGE_KEY`.
///
/// # FFI contract
/// - Idempotent; later calls return success without side effects.
/// - Returns before the saved list is loaded; see [`todo_list_wait_ready`].
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn todo_list_init() -> String {
    let _guard = INIT_GUARD.lock().unwrap_or_else(PoisonError::into_inner);
    if CONTAINER.get().is_some() {
        return String::new();
    }

    let config = TodoListConfig::from_env();
    let container = match TodoListContainer::open(&config) {
        Ok(container) => container,
        Err(err) => return format!("todo_list_init failed: {err}"),
    };
    if let Err(err) = container.hydrate() {
        return format!("todo_list_init failed: {err}");
    }
    if CONTAINER.set(container).is_err() {
        warn!("event=ffi_init module=ffi status=skipped reason=already_initialized");
    }
    String::new()
}

/// Blocks up to `timeout_ms` for the saved list to load.
#[flutter_rust_bridge::frb(sync)]
pub fn todo_list_wait_ready(timeout_ms: u32) -> bool {
    CONTAINER.get().is_some_and(|container| {
        container.wait_until_ready(Duration::from_millis(u64::from(timeout_ms)))
    })
}

/// Current list for rendering; empty and not ready before init.
#[flutter_rust_bridge::frb(sync)]
pub fn todo_list_snapshot() -> TodoListView {
    match CONTAINER.get() {
        Some(container) => {
            let ready = container.state() == todolist_core::LifecycleState::Ready;
            to_view(&container.snapshot(), ready)
        }
        None => to_view(&TodoSnapshot::empty(), false),
    }
}

/// Adds `text` to the end of the list.
#[flutter_rust_bridge::frb(sync)]
pub fn todo_list_append(text: String) -> TodoActionResponse {
    let Some(container) = CONTAINER.get() else {
        return TodoActionResponse::failure("todo_list_append failed: todo list not initialized");
    };
    match container.append(text) {
        Ok(snapshot) => TodoActionResponse::success("Todo added.", &snapshot),
        Err(err) => TodoActionResponse::failure(format!("todo_list_append failed: {err}")),
    }
}

/// Removes the item displayed at `position`.
#[flutter_rust_bridge::frb(sync)]
pub fn todo_list_remove_at(position: u32) -> TodoActionResponse {
    let Some(container) = CONTAINER.get() else {
        return TodoActionResponse::failure(
            "todo_list_remove_at failed: todo list not initialized",
        );
    };
    let position = usize::try_from(position).unwrap_or(usize::MAX);
    match container.remove_at(position) {
        Ok(snapshot) => TodoActionResponse::success("Todo removed.", &snapshot),
        Err(err) => TodoActionResponse::failure(format!("todo_list_remove_at failed: {err}")),
    }
}

/// Waits up to `timeout_ms` for queued writes to reach storage, e.g. before
/// the app is paused.
#[flutter_rust_bridge::frb(sync)]
pub fn todo_list_flush(timeout_ms: u32) -> bool {
    let timeout = Duration::from_millis(u64::from(timeout_ms));
    CONTAINER
        .get()
        .is_some_and(|container| container.flush_within(timeout))
}

fn to_view(snapshot: &TodoSnapshot, ready: bool) -> TodoListView {
    TodoListView {
        items: snapshot.to_vec(),
        is_empty: snapshot.is_empty(),
        revision: snapshot.revision(),
        ready,
    }
}
