//! Configuration sections, one per engine component.

pub mod logging;
pub mod registry;
pub mod runner;
pub mod storage;

pub use logging::*;
pub use registry::*;
pub use runner::*;
pub use storage::*;

use serde::{Deserialize, Serialize};

/// Root configuration for the listener engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HearkenConfig {
    /// Durable listener storage
    pub storage: StorageConfig,

    /// Event dispatch and script execution
    pub runner: RunnerConfig,

    /// Live listener index
    pub registry: RegistryConfig,

    /// Log output
    pub logging: LoggingConfig,
}
