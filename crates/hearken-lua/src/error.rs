use hearken_core::ExecutionError;
use thiserror::Error;

/// Failures while preparing or running a Lua state
#[derive(Error, Debug)]
pub enum LuaError {
    #[error("Lua error: {0}")]
    Lua(#[from] mlua::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Sandbox setup failed: {0}")]
    Sandbox(String),
}

impl From<LuaError> for ExecutionError {
    fn from(err: LuaError) -> Self {
        match err {
            LuaError::Lua(e) => ExecutionError::Runtime(crate::diagnostics::runtime_message(&e)),
            LuaError::Json(e) => ExecutionError::Payload(e.to_string()),
            LuaError::Sandbox(msg) => ExecutionError::Runtime(msg),
        }
    }
}
