//! Core of the todo list app.
//! This crate owns the canonical list and keeps it in step with durable storage.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod persistence;
pub mod service;
pub mod store;

pub use config::TodoListConfig;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::snapshot::TodoSnapshot;
pub use persistence::{CodecError, PersistenceError, PersistenceStats, PersistenceWorker};
pub use service::todo_list::{
    HydrationOutcome, LifecycleState, SubscriptionId, TodoListContainer, TodoListError,
    TodoListResult,
};
pub use store::kv_store::{KeyValueStore, StoreError, StoreResult};
pub use store::memory_kv::InMemoryKeyValueStore;
pub use store::sqlite_kv::SqliteKeyValueStore;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
