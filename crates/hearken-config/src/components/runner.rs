//! Execution runner configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Limits applied while listeners execute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Time budget for a single listener invocation
    pub timeout_ms: u64,

    /// Extra time granted to the blocking task after the budget runs out,
    /// before the runner stops waiting for it
    pub grace_ms: u64,

    /// VM instructions executed between two budget checks
    pub instruction_check_interval: u32,

    /// Number of recent invocation outcomes kept for inspection
    pub history_capacity: usize,
}

impl RunnerConfig {
    /// Per-invocation time budget
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Grace period after the budget expires
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            grace_ms: 250,
            instruction_check_interval: 10_000,
            history_capacity: 256,
        }
    }
}
