//! Write-through persistence for the todo list.
//!
//! # Responsibility
//! - Encode/decode the persisted blob.
//! - Run store I/O on a background worker so mutations never wait on it.
//!
//! # Invariants
//! - Requests are served strictly in submission order (one FIFO queue, one thread).
//! - Write outcomes are logged and counted, never reported back to the mutator.

pub mod codec;
pub mod worker;

pub use codec::{decode_items, encode_items, CodecError};
pub use worker::{LoadCallback, PersistenceError, PersistenceStats, PersistenceWorker};
