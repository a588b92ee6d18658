//! Per-invocation outcome recording

use crate::types::ListenerId;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// How one listener invocation ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvocationStatus {
    Succeeded,
    Failed { error: String },
    TimedOut,
}

impl InvocationStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Record of a single listener invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationOutcome {
    pub listener_id: ListenerId,
    pub listener_name: String,
    pub event_type: String,
    pub status: InvocationStatus,
    pub duration: Duration,
    pub finished_at: DateTime<Utc>,
}

/// Aggregated counters for one listener
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListenerStats {
    pub invocations: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub total_duration: Duration,
    pub last_error: Option<String>,
    pub last_run: Option<DateTime<Utc>>,
}

impl ListenerStats {
    /// Mean wall-clock time per invocation
    pub fn average_duration(&self) -> Duration {
        if self.invocations == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.invocations as u32
        }
    }
}

#[derive(Debug, Default)]
struct State {
    recent: VecDeque<InvocationOutcome>,
    stats: HashMap<ListenerId, ListenerStats>,
}

/// Bounded log of recent outcomes plus lifetime counters per listener.
#[derive(Debug)]
pub struct ExecutionHistory {
    capacity: usize,
    state: Mutex<State>,
}

impl ExecutionHistory {
    /// Keep at most `capacity` recent outcomes (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(State::default()),
        }
    }

    pub fn record(&self, outcome: InvocationOutcome) {
        let mut state = self.state.lock();

        let stats = state.stats.entry(outcome.listener_id).or_default();
        stats.invocations += 1;
        stats.total_duration += outcome.duration;
        stats.last_run = Some(outcome.finished_at);
        match &outcome.status {
            InvocationStatus::Succeeded => {}
            InvocationStatus::Failed { error } => {
                stats.failures += 1;
                stats.last_error = Some(error.clone());
            }
            InvocationStatus::TimedOut => {
                stats.timeouts += 1;
                stats.last_error = Some("timed out".to_string());
            }
        }

        if state.recent.len() == self.capacity {
            state.recent.pop_front();
        }
        state.recent.push_back(outcome);
    }

    /// Recent outcomes, oldest first
    pub fn recent(&self) -> Vec<InvocationOutcome> {
        self.state.lock().recent.iter().cloned().collect()
    }

    /// Recent outcomes for one listener, oldest first
    pub fn recent_for(&self, id: ListenerId) -> Vec<InvocationOutcome> {
        self.state
            .lock()
            .recent
            .iter()
            .filter(|o| o.listener_id == id)
            .cloned()
            .collect()
    }

    pub fn stats(&self, id: ListenerId) -> Option<ListenerStats> {
        self.state.lock().stats.get(&id).cloned()
    }

    /// Drop counters for a deleted listener
    pub fn forget(&self, id: ListenerId) {
        self.state.lock().stats.remove(&id);
    }
}
