//! Flutter-facing bindings for the todo list core.

pub mod api;
