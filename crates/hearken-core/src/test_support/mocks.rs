//! Mock script compiler
//!
//! [`MockCompiler`] accepts a tiny directive language so tests can script
//! listener behavior without a real interpreter. The body is inspected
//! line by line:
//!
//! - a line containing `!!` fails compilation at that line
//! - `fail <message>` makes invocation return a runtime error
//! - `panic` panics inside the invocation
//! - `spin` busy-waits until the budget is spent, then reports a timeout
//! - `sleep <ms>` blocks for `ms` milliseconds ignoring the budget
//!
//! Anything else succeeds and echoes the event payload back.

use crate::script::{CompilationResult, ExecutionError, ScriptCompiler, ScriptDiagnostic, ScriptUnit};
use crate::types::ListenerEvent;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared, ordered record of `(listener name, event type)` invocations
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl CallLog {
    pub fn push(&self, name: &str, event_type: &str) {
        self.calls.lock().push((name.to_string(), event_type.to_string()));
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }

    /// Listener names in invocation order
    pub fn names(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Directive {
    Echo,
    Fail(String),
    Panic,
    Spin,
    Sleep(Duration),
}

/// Compiled form of a mock body
#[derive(Debug)]
pub struct MockUnit {
    name: String,
    directive: Directive,
    log: CallLog,
}

impl ScriptUnit for MockUnit {
    fn invoke(&self, event: &ListenerEvent, budget: Duration) -> Result<JsonValue, ExecutionError> {
        self.log.push(&self.name, &event.event_type);
        match &self.directive {
            Directive::Echo => Ok(event.payload.clone()),
            Directive::Fail(message) => Err(ExecutionError::Runtime(message.clone())),
            Directive::Panic => panic!("mock listener '{}' panicked", self.name),
            Directive::Spin => {
                let deadline = Instant::now() + budget;
                while Instant::now() < deadline {
                    std::hint::spin_loop();
                }
                Err(ExecutionError::TimedOut {
                    budget_ms: budget.as_millis() as u64,
                })
            }
            Directive::Sleep(pause) => {
                std::thread::sleep(*pause);
                Ok(JsonValue::Null)
            }
        }
    }
}

/// Compiler for the directive language described in the module docs
#[derive(Debug, Default, Clone)]
pub struct MockCompiler {
    log: CallLog,
    compiles: Arc<AtomicUsize>,
}

impl MockCompiler {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            compiles: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    /// Number of `compile` calls so far, successful or not
    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }
}

impl ScriptCompiler for MockCompiler {
    fn compile(&self, name: &str, source: &str) -> CompilationResult {
        self.compiles.fetch_add(1, Ordering::SeqCst);

        let mut directive = Directive::Echo;
        for (idx, line) in source.lines().enumerate() {
            let line_no = idx as u32 + 1;
            if let Some(col) = line.find("!!") {
                return Err(ScriptDiagnostic::new("unexpected symbol near '!!'")
                    .at_line(line_no)
                    .at_column(col as u32 + 1));
            }
            let line = line.trim();
            if line == "panic" {
                directive = Directive::Panic;
            } else if line == "spin" {
                directive = Directive::Spin;
            } else if let Some(rest) = line.strip_prefix("fail") {
                directive = Directive::Fail(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("sleep") {
                let ms = rest.trim().parse::<u64>().map_err(|_| {
                    ScriptDiagnostic::new("sleep expects milliseconds").at_line(line_no)
                })?;
                directive = Directive::Sleep(Duration::from_millis(ms));
            }
        }

        Ok(Arc::new(MockUnit {
            name: name.to_string(),
            directive,
            log: self.log.clone(),
        }))
    }
}
