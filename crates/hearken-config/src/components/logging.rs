//! Logging configuration

use serde::{Deserialize, Serialize};

/// Log output settings consumed by the binary when it installs a subscriber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (e.g. `info`, `hearken_core=debug`)
    pub level: String,

    /// Emit ANSI colors
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            ansi: true,
        }
    }
}
