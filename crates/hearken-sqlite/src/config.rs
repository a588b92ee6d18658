//! Connection settings

use hearken_config::StorageConfig;
use std::path::{Path, PathBuf};

/// Path used to request an in-memory database
pub const MEMORY_PATH: &str = ":memory:";

/// SQLite connection settings
#[derive(Debug, Clone, PartialEq)]
pub struct SqliteConfig {
    /// Database file, or `:memory:`
    pub path: PathBuf,
    /// Enable write-ahead logging
    pub wal_mode: bool,
    /// How long a locked database is retried before failing
    pub busy_timeout_ms: u64,
}

impl SqliteConfig {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            wal_mode: true,
            busy_timeout_ms: 5000,
        }
    }

    /// In-memory database, gone when the pool is dropped
    pub fn memory() -> Self {
        Self {
            wal_mode: false,
            ..Self::new(MEMORY_PATH)
        }
    }

    pub fn is_memory(&self) -> bool {
        self.path.to_str() == Some(MEMORY_PATH)
    }
}

impl From<&StorageConfig> for SqliteConfig {
    fn from(config: &StorageConfig) -> Self {
        Self {
            path: config.path.clone(),
            wal_mode: config.wal_mode,
            busy_timeout_ms: config.busy_timeout_ms,
        }
    }
}
