//! Registry configuration

use serde::{Deserialize, Serialize};

/// Limits for the live listener index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Maximum active listeners bound to one selector (0 = unlimited)
    pub max_listeners_per_selector: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_listeners_per_selector: 64,
        }
    }
}
