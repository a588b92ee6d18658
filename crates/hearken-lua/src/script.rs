//! Invocable Lua listener bodies

use crate::error::LuaError;
use crate::sandbox;
use crate::CHUNK_NAME;
use hearken_core::{ExecutionError, ListenerEvent, ScriptUnit};
use mlua::{HookTriggers, Value, VmState};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A syntax-checked listener body.
///
/// `mlua::Lua` is not `Send`, so the unit keeps the validated source and
/// loads it into a fresh sandboxed state on every invocation.
pub struct LuaScript {
    name: String,
    source: Arc<str>,
    instruction_interval: u32,
}

impl LuaScript {
    pub(crate) fn new(name: &str, source: &str, instruction_interval: u32) -> Self {
        Self {
            name: name.to_string(),
            source: Arc::from(source),
            instruction_interval,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn run(&self, event: &ListenerEvent, budget: Duration, timed_out: &Arc<AtomicBool>) -> Result<JsonValue, LuaError> {
        let lua = sandbox::new_state()?;
        sandbox::install_host_api(&lua, &self.name)?;
        sandbox::install_event(&lua, event)?;

        sandbox::guard_protected_calls(&lua, timed_out.clone())?;

        // a budget too large for Instant never expires
        let deadline = Instant::now().checked_add(budget);
        let flag = timed_out.clone();
        lua.set_hook(
            HookTriggers::new().every_nth_instruction(self.instruction_interval),
            move |_lua, _debug| {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    flag.store(true, Ordering::SeqCst);
                    Err(mlua::Error::RuntimeError(sandbox::BUDGET_EXCEEDED.to_string()))
                } else {
                    Ok(VmState::Continue)
                }
            },
        );

        let result = lua.load(&*self.source).set_name(CHUNK_NAME).eval::<Value>();
        lua.remove_hook();

        let value = result?;
        Ok(serde_json::to_value(&value)?)
    }
}

impl ScriptUnit for LuaScript {
    fn invoke(&self, event: &ListenerEvent, budget: Duration) -> Result<JsonValue, ExecutionError> {
        let timed_out = Arc::new(AtomicBool::new(false));
        match self.run(event, budget, &timed_out) {
            Ok(value) => Ok(value),
            Err(_) if timed_out.load(Ordering::SeqCst) => Err(ExecutionError::TimedOut {
                budget_ms: budget.as_millis() as u64,
            }),
            Err(err) => Err(err.into()),
        }
    }
}

impl fmt::Debug for LuaScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LuaScript")
            .field("name", &self.name)
            .field("source_len", &self.source.len())
            .field("instruction_interval", &self.instruction_interval)
            .finish()
    }
}
