//! Todo list domain model.
//!
//! # Responsibility
//! - Define the immutable snapshot handed to readers.
//! - Implement the pure append/remove transitions between snapshots.
//!
//! # Invariants
//! - Insertion order is display order; duplicates are allowed.
//! - A snapshot is never mutated after construction; transitions build a new one.

pub mod snapshot;
