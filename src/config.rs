//! Storage and runtime configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{QueueError, QueueResult};

/// Path value that selects an in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Top-level configuration for the core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Database settings.
    pub storage: StorageConfig,
    /// Async runtime settings.
    pub runtime: RuntimeConfig,
}

/// SQLite settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file, or [`IN_MEMORY_PATH`].
    pub path: PathBuf,
    /// How long a connection waits on a locked database file.
    pub busy_timeout_ms: u64,
    /// Use write-ahead logging for file databases.
    pub wal: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("queuemate.db"),
            busy_timeout_ms: 5_000,
            wal: true,
        }
    }
}

impl StorageConfig {
    /// Config for a throwaway in-memory database.
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from(IN_MEMORY_PATH),
            ..Self::default()
        }
    }

    /// True when [`Self::path`] selects an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == IN_MEMORY_PATH
    }
}

/// Async handle settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Bound of the command channel.
    pub command_buffer: usize,
    /// Capacity of the event broadcast channel.
    pub event_buffer: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_buffer: 256,
            event_buffer: 1024,
        }
    }
}

impl CoreConfig {
    /// Reads a JSON config file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> QueueResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path)
            .map_err(|e| QueueError::Config(format!("read {}: {e}", path.display())))?;
        serde_json::from_slice(&raw)
            .map_err(|e| QueueError::Config(format!("parse {}: {e}", path.display())))
    }

    /// Defaults overridden by `QUEUEMATE_DB_PATH`, `QUEUEMATE_BUSY_TIMEOUT_MS`
    /// and `QUEUEMATE_WAL`.
    pub fn from_env() -> QueueResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> QueueResult<Self> {
        let mut cfg = Self::default();
        if let Some(path) = lookup("QUEUEMATE_DB_PATH") {
            cfg.storage.path = PathBuf::from(path);
        }
        if let Some(ms) = lookup("QUEUEMATE_BUSY_TIMEOUT_MS") {
            cfg.storage.busy_timeout_ms = ms
                .trim()
                .parse()
                .map_err(|e| QueueError::Config(format!("QUEUEMATE_BUSY_TIMEOUT_MS: {e}")))?;
        }
        if let Some(wal) = lookup("QUEUEMATE_WAL") {
            cfg.storage.wal = match wal.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(QueueError::Config(format!("QUEUEMATE_WAL: bad value {other:?}")));
                }
            };
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_defaults() {
        let cfg = CoreConfig::from_lookup(|key| match key {
            "QUEUEMATE_DB_PATH" => Some("/tmp/q.db".to_string()),
            "QUEUEMATE_WAL" => Some("off".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.storage.path, PathBuf::from("/tmp/q.db"));
        assert!(!cfg.storage.wal);
        assert_eq!(cfg.storage.busy_timeout_ms, 5_000);
        assert_eq!(cfg.runtime, RuntimeConfig::default());
    }

    #[test]
    fn bad_env_value_is_config_error() {
        let err = CoreConfig::from_lookup(|key| {
            (key == "QUEUEMATE_BUSY_TIMEOUT_MS").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, QueueError::Config(_)));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: CoreConfig =
            serde_json::from_str(r#"{"storage":{"path":":memory:"}}"#).unwrap();
        assert!(cfg.storage.is_in_memory());
        assert!(cfg.storage.wal);
        assert_eq!(cfg.runtime.command_buffer, 256);
    }
}
