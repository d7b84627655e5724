//! SQLite bootstrap backing the durable key-value store.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Bring the `kv_store` schema up to date before any blob is read or written.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - A store written by a newer build is refused, never downgraded.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failures while opening or migrating the key-value database.
#[derive(Debug)]
pub enum DbError {
    /// Connection, pragma or query failure outside a migration step.
    Sqlite(rusqlite::Error),
    /// The migration that would produce schema `version` failed; nothing from
    /// this run was committed.
    Migration {
        version: u32,
        source: rusqlite::Error,
    },
    /// The file carries a schema this build cannot read.
    SchemaTooNew { found: u32, supported: u32 },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "kv store database error: {err}"),
            Self::Migration { version, source } => {
                write!(f, "kv store migration to v{version} failed: {source}")
            }
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "kv store schema v{found} was written by a newer build (this build reads up to v{supported})"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::Migration { source: err, .. } => Some(err),
            Self::SchemaTooNew { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
