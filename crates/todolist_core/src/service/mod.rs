//! Use-case layer consumed by the presentation side.
//!
//! # Responsibility
//! - Own the canonical todo list and mediate every mutation.
//! - Keep UI/FFI callers decoupled from storage details.

pub mod todo_list;
