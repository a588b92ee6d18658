//! Script compilation and invocation seams
//!
//! The engine is agnostic of the scripting language. A [`ScriptCompiler`]
//! turns source text into a [`ScriptUnit`] without running it; the unit is
//! later invoked once per matching event under a time budget.

use crate::types::ListenerEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Form field that script diagnostics are attached to
pub const SCRIPT_BODY_FIELD: &str = "scriptBody";

/// Structured compile failure, tagged with the input field it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptDiagnostic {
    pub field: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl ScriptDiagnostic {
    /// Diagnostic for the script body without location
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            field: SCRIPT_BODY_FIELD.to_string(),
            message: message.into(),
            line: None,
            column: None,
        }
    }

    /// Attach a 1-based line number
    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Attach a 1-based column
    pub fn at_column(mut self, column: u32) -> Self {
        self.column = Some(column);
        self
    }
}

impl fmt::Display for ScriptDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(col)) => write!(f, "{}:{}:{}: {}", self.field, line, col, self.message),
            (Some(line), None) => write!(f, "{}:{}: {}", self.field, line, self.message),
            _ => write!(f, "{}: {}", self.field, self.message),
        }
    }
}

/// Failure of a single listener invocation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    /// The script raised an error
    #[error("runtime error: {0}")]
    Runtime(String),

    /// The script ran past its budget and was aborted
    #[error("execution exceeded budget of {budget_ms}ms")]
    TimedOut { budget_ms: u64 },

    /// The event could not be handed to the script
    #[error("payload conversion failed: {0}")]
    Payload(String),
}

/// An executable unit produced by a [`ScriptCompiler`].
///
/// `invoke` is blocking; the runner calls it from the blocking thread pool.
/// Implementations must stop on their own once `budget` has elapsed.
pub trait ScriptUnit: Send + Sync + fmt::Debug {
    /// Run once against `event`
    fn invoke(&self, event: &ListenerEvent, budget: Duration) -> Result<JsonValue, ExecutionError>;
}

/// Outcome of compiling a script body
pub type CompilationResult = Result<Arc<dyn ScriptUnit>, ScriptDiagnostic>;

/// Validates and builds script units.
///
/// Must not execute the script and must be callable concurrently.
pub trait ScriptCompiler: Send + Sync {
    /// Compile `source`; `name` labels the unit in diagnostics and logs
    fn compile(&self, name: &str, source: &str) -> CompilationResult;
}

impl<C: ScriptCompiler + ?Sized> ScriptCompiler for Arc<C> {
    fn compile(&self, name: &str, source: &str) -> CompilationResult {
        (**self).compile(name, source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_defaults_to_script_body_field() {
        let diag = ScriptDiagnostic::new("unexpected symbol").at_line(3);
        assert_eq!(diag.field, SCRIPT_BODY_FIELD);
        assert_eq!(diag.to_string(), "scriptBody:3: unexpected symbol");
    }

    #[test]
    fn test_diagnostic_display_with_column() {
        let diag = ScriptDiagnostic::new("bad").at_line(1).at_column(9);
        assert_eq!(diag.to_string(), "scriptBody:1:9: bad");
    }

    #[test]
    fn test_execution_error_messages() {
        let err = ExecutionError::TimedOut { budget_ms: 50 };
        assert_eq!(err.to_string(), "execution exceeded budget of 50ms");
    }
}
