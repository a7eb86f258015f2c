//! Engine configuration
//!
//! `EngineConfig` is built once at startup, either from defaults or from
//! `MENUTREE_*` environment variables, and handed to `MenuService` and the
//! store constructors. It is not persisted.

use crate::db::{DatabaseService, MenuStore, TursoStore, DEFAULT_BUSY_TIMEOUT_MS};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Environment variable for the database file path (unset = in-memory)
pub const ENV_DB_PATH: &str = "MENUTREE_DB_PATH";
/// Environment variable for the SQLite busy timeout in milliseconds
pub const ENV_BUSY_TIMEOUT_MS: &str = "MENUTREE_BUSY_TIMEOUT_MS";
/// Environment variable for the ancestor walk bound
pub const ENV_MAX_DEPTH: &str = "MENUTREE_MAX_DEPTH";
/// Environment variable for the event channel capacity
pub const ENV_EVENT_CAPACITY: &str = "MENUTREE_EVENT_CAPACITY";

/// Default bound on ancestor chain length
pub const DEFAULT_MAX_TREE_DEPTH: usize = 1000;

/// Default broadcast channel capacity for `MenuEvent`s
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Database file; `None` keeps everything in memory
    pub database_path: Option<PathBuf>,

    /// How long a connection waits on a locked database
    pub busy_timeout_ms: u64,

    /// Longest ancestor chain a walk follows before declaring the data corrupt
    pub max_tree_depth: usize,

    /// Buffered events per subscriber before lagging receivers drop events
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            max_tree_depth: DEFAULT_MAX_TREE_DEPTH,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Read configuration from `MENUTREE_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup (environment, test fixtures)
    ///
    /// Missing keys keep their defaults. Unparseable or zero values are logged
    /// and replaced by the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_path = lookup(ENV_DB_PATH)
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        if let Some(path) = &database_path {
            tracing::info!("Using database path from {}: {}", ENV_DB_PATH, path.display());
        }

        Self {
            database_path,
            busy_timeout_ms: parse_or_default(&lookup, ENV_BUSY_TIMEOUT_MS, defaults.busy_timeout_ms),
            max_tree_depth: parse_or_default(&lookup, ENV_MAX_DEPTH, defaults.max_tree_depth),
            event_channel_capacity: parse_or_default(
                &lookup,
                ENV_EVENT_CAPACITY,
                defaults.event_channel_capacity,
            ),
        }
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn in_memory(mut self) -> Self {
        self.database_path = None;
        self
    }

    /// Open the libsql-backed store this configuration describes
    pub async fn open_store(&self) -> anyhow::Result<Arc<dyn MenuStore>> {
        let db = match &self.database_path {
            Some(path) => DatabaseService::new_with_timeout(path.clone(), self.busy_timeout_ms).await?,
            None => DatabaseService::new_in_memory().await?,
        };
        Ok(Arc::new(TursoStore::new(Arc::new(db))))
    }
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialEq + Default + Copy,
{
    let Some(raw) = lookup(key) else {
        return default;
    };

    match raw.trim().parse::<T>() {
        Ok(value) if value != T::default() => value,
        _ => {
            tracing::warn!("Ignoring invalid {}={:?}, using default", key, raw);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = EngineConfig::from_lookup(|_| None);
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_tree_depth, 1000);
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_values_are_read() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            (ENV_DB_PATH, "/tmp/menus.db"),
            (ENV_BUSY_TIMEOUT_MS, "250"),
            (ENV_MAX_DEPTH, "64"),
            (ENV_EVENT_CAPACITY, "16"),
        ]));

        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/menus.db")));
        assert_eq!(config.busy_timeout_ms, 250);
        assert_eq!(config.max_tree_depth, 64);
        assert_eq!(config.event_channel_capacity, 16);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            (ENV_DB_PATH, "   "),
            (ENV_MAX_DEPTH, "deep"),
            (ENV_EVENT_CAPACITY, "0"),
        ]));

        assert!(config.database_path.is_none());
        assert_eq!(config.max_tree_depth, DEFAULT_MAX_TREE_DEPTH);
        assert_eq!(config.event_channel_capacity, DEFAULT_EVENT_CHANNEL_CAPACITY);
    }

    #[tokio::test]
    async fn test_open_in_memory_store() {
        let store = EngineConfig::default().open_store().await.unwrap();
        assert!(store.find_all().await.unwrap().is_empty());
    }
}
