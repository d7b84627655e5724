//! Persistent Store Adapter: named text blobs behind a get/set contract.
//!
//! # Responsibility
//! - Define the key-value contract the list container persists through.
//! - Provide SQLite-backed and in-memory implementations.
//!
//! # Invariants
//! - `set` overwrites any prior value stored under the same key.
//! - `get` of a key that was never set returns `Ok(None)`, not an error.

pub mod kv_store;
pub mod memory_kv;
pub mod sqlite_kv;
