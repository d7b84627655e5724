//! Container configuration.
//!
//! Values come from defaults, optionally overridden by environment variables
//! read once by the composition root.

use std::path::PathBuf;
use std::time::Duration;

/// Storage key the list blob lives under.
pub const DEFAULT_STORAGE_KEY: &str = "todoList";
pub const DEFAULT_DB_FILE_NAME: &str = "todolist.sqlite3";
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

pub const DB_PATH_ENV: &str = "TODOLIST_DB_PATH";
pub const STORAGE_KEY_ENV: &str = "TODOLIST_STORAGE_KEY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoListConfig {
    /// Key of the single persisted blob.
    pub storage_key: String,
    /// SQLite file used by [`crate::TodoListContainer::open`].
    pub db_path: PathBuf,
    /// Upper bound for [`crate::TodoListContainer::flush`].
    pub flush_timeout: Duration,
}

impl Default for TodoListConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
        }
    }
}

impl TodoListConfig {
    /// Defaults overridden by `TODOLIST_DB_PATH` / `TODOLIST_STORAGE_KEY`.
    ///
    /// Blank variables are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn with_storage_key(mut self, storage_key: impl Into<String>) -> Self {
        self.storage_key = storage_key.into();
        self
    }

    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.db_path = db_path.into();
        self
    }

    pub fn with_flush_timeout(mut self, flush_timeout: Duration) -> Self {
        self.flush_timeout = flush_timeout;
        self
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(path) = non_blank(DB_PATH_ENV) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(key) = non_blank(STORAGE_KEY_ENV) {
            config.storage_key = key;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::{TodoListConfig, DB_PATH_ENV, DEFAULT_STORAGE_KEY, STORAGE_KEY_ENV};
    use std::path::PathBuf;

    #[test]
    fn defaults_use_todo_list_storage_key() {
        let config = TodoListConfig::default();
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
        assert!(config.db_path.ends_with("todolist.sqlite3"));
    }

    #[test]
    fn lookup_overrides_non_blank_values_only() {
        let config = TodoListConfig::from_lookup(|name| match name {
            DB_PATH_ENV => Some(" /data/todo.db ".to_string()),
            STORAGE_KEY_ENV => Some("   ".to_string()),
            _ => None,
        });

        assert_eq!(config.db_path, PathBuf::from("/data/todo.db"));
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
    }
}
