//! Event dispatch to compiled listeners
//!
//! The runner is the engine's only runtime surface. For each inbound event it
//! takes one registry snapshot, then invokes every matching listener in
//! registration order. Each invocation runs on the blocking pool under its
//! own time budget; errors, panics and timeouts are logged, recorded in the
//! [`ExecutionHistory`] and never reach the event source.

use crate::history::{ExecutionHistory, InvocationOutcome, InvocationStatus};
use crate::registry::{CompiledListener, ListenerRegistry};
use crate::script::ExecutionError;
use crate::types::ListenerEvent;
use async_trait::async_trait;
use chrono::Utc;
use hearken_config::RunnerConfig;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Inbound notification interface implemented by the engine.
///
/// The host event bus calls this for every event; nothing is returned.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn notify(&self, event: ListenerEvent);
}

/// Whether the runner is currently working through an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Dispatching,
}

/// Invokes matching listeners for each event.
pub struct ExecutionRunner {
    registry: Arc<ListenerRegistry>,
    history: Arc<ExecutionHistory>,
    budget: Duration,
    grace: Duration,
    in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ExecutionRunner {
    pub fn new(registry: Arc<ListenerRegistry>, config: &RunnerConfig) -> Self {
        Self {
            registry,
            history: Arc::new(ExecutionHistory::new(config.history_capacity)),
            budget: config.timeout(),
            grace: config.grace(),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Override the per-invocation budget
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn history(&self) -> &Arc<ExecutionHistory> {
        &self.history
    }

    pub fn state(&self) -> RunnerState {
        if self.in_flight.load(Ordering::SeqCst) == 0 {
            RunnerState::Idle
        } else {
            RunnerState::Dispatching
        }
    }

    /// Run every listener bound to the event's type and report each outcome.
    pub async fn dispatch(&self, event: ListenerEvent) -> Vec<InvocationOutcome> {
        let listeners = self.registry.lookup(&event.event_type);
        if listeners.is_empty() {
            trace!(event_type = %event.event_type, "No listeners for event");
            return Vec::new();
        }

        let _in_flight = InFlight::enter(&self.in_flight);
        debug!(
            event_type = %event.event_type,
            listeners = listeners.len(),
            "Dispatching event"
        );

        let event = Arc::new(event);
        let mut outcomes = Vec::with_capacity(listeners.len());
        for listener in listeners {
            let outcome = self.invoke(&listener, &event).await;
            self.history.record(outcome.clone());
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn invoke(&self, listener: &CompiledListener, event: &Arc<ListenerEvent>) -> InvocationOutcome {
        let started = Instant::now();
        let unit = listener.unit.clone();
        let task_event = event.clone();
        let budget = self.budget;

        let task = tokio::task::spawn_blocking(move || unit.invoke(&task_event, budget));

        let status = match tokio::time::timeout(budget.saturating_add(self.grace), task).await {
            Ok(Ok(Ok(value))) => {
                trace!(listener_id = %listener.id, result = %value, "Listener returned");
                InvocationStatus::Succeeded
            }
            Ok(Ok(Err(ExecutionError::TimedOut { .. }))) => InvocationStatus::TimedOut,
            Ok(Ok(Err(err))) => InvocationStatus::Failed {
                error: err.to_string(),
            },
            Ok(Err(join_err)) if join_err.is_panic() => InvocationStatus::Failed {
                error: "listener panicked".to_string(),
            },
            Ok(Err(join_err)) => InvocationStatus::Failed {
                error: join_err.to_string(),
            },
            // The blocking task is abandoned; the unit stops itself once its budget is spent.
            Err(_) => InvocationStatus::TimedOut,
        };
        let duration = started.elapsed();

        match &status {
            InvocationStatus::Succeeded => debug!(
                listener_id = %listener.id,
                listener = %listener.name,
                event_type = %event.event_type,
                duration_ms = duration.as_millis() as u64,
                "Listener succeeded"
            ),
            InvocationStatus::Failed { error } => warn!(
                listener_id = %listener.id,
                listener = %listener.name,
                event_type = %event.event_type,
                duration_ms = duration.as_millis() as u64,
                error = %error,
                "Listener failed"
            ),
            InvocationStatus::TimedOut => warn!(
                listener_id = %listener.id,
                listener = %listener.name,
                event_type = %event.event_type,
                budget_ms = budget.as_millis() as u64,
                "Listener timed out"
            ),
        }

        InvocationOutcome {
            listener_id: listener.id,
            listener_name: listener.name.to_string(),
            event_type: event.event_type.clone(),
            status,
            duration,
            finished_at: Utc::now(),
        }
    }
}

#[async_trait]
impl EventSink for ExecutionRunner {
    async fn notify(&self, event: ListenerEvent) {
        self.dispatch(event).await;
    }
}

impl std::fmt::Debug for ExecutionRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionRunner")
            .field("budget", &self.budget)
            .field("grace", &self.grace)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CallLog, MockCompiler};
    use crate::script::ScriptCompiler;
    use crate::types::ListenerId;
    use serde_json::json;

    fn runner_with(registry: Arc<ListenerRegistry>, budget_ms: u64) -> ExecutionRunner {
        let config = RunnerConfig {
            timeout_ms: budget_ms,
            grace_ms: 50,
            ..RunnerConfig::default()
        };
        ExecutionRunner::new(registry, &config)
    }

    fn activate(registry: &ListenerRegistry, compiler: &MockCompiler, id: i64, body: &str) {
        let unit = compiler.compile(&format!("l{}", id), body).unwrap();
        registry
            .activate(
                CompiledListener::new(ListenerId(id), format!("l{}", id), unit),
                &["E".to_string()],
            )
            .unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_without_listeners_is_noop() {
        let runner = runner_with(Arc::new(ListenerRegistry::new()), 100);
        let outcomes = runner.dispatch(ListenerEvent::new("E", json!({}))).await;
        assert!(outcomes.is_empty());
        assert_eq!(runner.state(), RunnerState::Idle);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_listeners() {
        let log = CallLog::default();
        let compiler = MockCompiler::new(log.clone());
        let registry = Arc::new(ListenerRegistry::new());
        activate(&registry, &compiler, 1, "fail boom");
        activate(&registry, &compiler, 2, "ok");

        let runner = runner_with(registry, 200);
        let outcomes = runner.dispatch(ListenerEvent::new("E", json!({"n": 1}))).await;

        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0].status, InvocationStatus::Failed { ref error } if error.contains("boom")));
        assert!(outcomes[1].status.is_success());
        assert_eq!(log.names(), vec!["l1", "l2"]);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let compiler = MockCompiler::new(CallLog::default());
        let registry = Arc::new(ListenerRegistry::new());
        activate(&registry, &compiler, 1, "panic");
        activate(&registry, &compiler, 2, "ok");

        let runner = runner_with(registry, 200);
        let outcomes = runner.dispatch(ListenerEvent::new("E", json!(null))).await;

        assert_eq!(
            outcomes[0].status,
            InvocationStatus::Failed {
                error: "listener panicked".into()
            }
        );
        assert!(outcomes[1].status.is_success());
    }

    #[tokio::test]
    async fn test_slow_listener_times_out_and_next_still_runs() {
        let log = CallLog::default();
        let compiler = MockCompiler::new(log.clone());
        let registry = Arc::new(ListenerRegistry::new());
        activate(&registry, &compiler, 1, "spin");
        activate(&registry, &compiler, 2, "ok");

        let runner = runner_with(registry, 50);
        let outcomes = runner.dispatch(ListenerEvent::new("E", json!({}))).await;

        assert_eq!(outcomes[0].status, InvocationStatus::TimedOut);
        assert!(outcomes[1].status.is_success());

        let history = runner.history();
        assert_eq!(history.stats(ListenerId(1)).unwrap().timeouts, 1);
        assert_eq!(history.stats(ListenerId(2)).unwrap().invocations, 1);
    }

    #[tokio::test]
    async fn test_notify_records_outcomes() {
        let compiler = MockCompiler::new(CallLog::default());
        let registry = Arc::new(ListenerRegistry::new());
        activate(&registry, &compiler, 1, "ok");

        let runner = runner_with(registry, 100);
        runner.notify(ListenerEvent::new("E", json!({}))).await;
        runner.notify(ListenerEvent::new("other", json!({}))).await;

        assert_eq!(runner.history().recent().len(), 1);
    }

    #[tokio::test]
    async fn test_unbounded_budget_does_not_overflow() {
        let compiler = MockCompiler::new(CallLog::default());
        let registry = Arc::new(ListenerRegistry::new());
        activate(&registry, &compiler, 1, "ok");

        let runner = runner_with(registry, 100).with_budget(Duration::MAX);
        let outcomes = runner.dispatch(ListenerEvent::new("E", json!({}))).await;
        assert!(outcomes[0].status.is_success());
    }
}
