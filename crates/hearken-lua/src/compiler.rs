//! ScriptCompiler backed by the Lua 5.4 parser

use crate::diagnostics::syntax_diagnostic;
use crate::sandbox;
use crate::script::LuaScript;
use crate::CHUNK_NAME;
use hearken_config::RunnerConfig;
use hearken_core::{CompilationResult, ScriptCompiler, ScriptDiagnostic};
use std::sync::Arc;
use tracing::debug;

const DEFAULT_INSTRUCTION_INTERVAL: u32 = 10_000;

/// Parses listener bodies into [`LuaScript`]s.
///
/// Compilation only loads the chunk into a throwaway state; nothing is
/// executed. The compiler holds no Lua state, so one instance can serve
/// concurrent requests.
#[derive(Debug, Clone)]
pub struct LuaCompiler {
    instruction_interval: u32,
}

impl Default for LuaCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl LuaCompiler {
    pub fn new() -> Self {
        Self {
            instruction_interval: DEFAULT_INSTRUCTION_INTERVAL,
        }
    }

    /// Use the runner's budget-check granularity
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self {
            instruction_interval: config.instruction_check_interval.max(1),
        }
    }

    pub fn instruction_interval(&self) -> u32 {
        self.instruction_interval
    }
}

impl ScriptCompiler for LuaCompiler {
    fn compile(&self, name: &str, source: &str) -> CompilationResult {
        if source.trim().is_empty() {
            return Err(ScriptDiagnostic::new("script body is empty"));
        }

        let lua = sandbox::new_state()
            .map_err(|e| ScriptDiagnostic::new(format!("could not create Lua state: {}", e)))?;

        if let Err(err) = lua.load(source).set_name(CHUNK_NAME).into_function() {
            let diag = syntax_diagnostic(&err);
            debug!(listener = %name, diagnostic = %diag, "Listener body rejected");
            return Err(diag);
        }

        Ok(Arc::new(LuaScript::new(
            name,
            source,
            self.instruction_interval,
        )))
    }
}
