//! Storage component configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where and how listener definitions are persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path (`:memory:` for an ephemeral store)
    pub path: PathBuf,

    /// Enable SQLite write-ahead logging
    pub wal_mode: bool,

    /// How long a writer waits on a locked database
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            wal_mode: true,
            busy_timeout_ms: 5000,
        }
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("hearken").join("listeners.db"))
        .unwrap_or_else(|| PathBuf::from("./hearken.db"))
}
