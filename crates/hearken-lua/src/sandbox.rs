//! Fresh, restricted Lua states

use crate::error::LuaError;
use hearken_core::ListenerEvent;
use mlua::{Function, Lua, LuaOptions, LuaSerdeExt, MultiValue, StdLib, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Error raised once a listener has spent its budget
pub(crate) const BUDGET_EXCEEDED: &str = "execution budget exceeded";

/// Base-library functions that reach outside the sandbox
const BLOCKED_GLOBALS: &[&str] = &["dofile", "loadfile", "load", "require", "collectgarbage"];

/// New Lua state with the restricted standard library and no host globals
pub(crate) fn new_state() -> Result<Lua, LuaError> {
    let libs = StdLib::STRING | StdLib::TABLE | StdLib::MATH | StdLib::UTF8;
    let lua = Lua::new_with(libs, LuaOptions::default())?;

    let globals = lua.globals();
    for name in BLOCKED_GLOBALS {
        globals.set(*name, Value::Nil)?;
    }
    Ok(lua)
}

/// Install `hearken.*` helpers and `print`, tagged with the listener name
pub(crate) fn install_host_api(lua: &Lua, listener: &str) -> Result<(), LuaError> {
    let globals = lua.globals();
    let hearken = lua.create_table()?;

    let name = listener.to_string();
    let log_fn = lua.create_function(move |_, (level, msg): (String, String)| {
        match level.as_str() {
            "trace" => tracing::trace!(listener = %name, "{}", msg),
            "debug" => tracing::debug!(listener = %name, "{}", msg),
            "warn" => tracing::warn!(listener = %name, "{}", msg),
            "error" => tracing::error!(listener = %name, "{}", msg),
            _ => tracing::info!(listener = %name, "{}", msg),
        }
        Ok(())
    })?;
    hearken.set("log", log_fn)?;

    let json_encode = lua.create_function(|_, value: Value| {
        serde_json::to_string(&value).map_err(mlua::Error::external)
    })?;
    hearken.set("json_encode", json_encode)?;

    let json_decode = lua.create_function(|lua, text: String| {
        let json: serde_json::Value = serde_json::from_str(&text).map_err(mlua::Error::external)?;
        lua.to_value(&json)
    })?;
    hearken.set("json_decode", json_decode)?;

    globals.set("hearken", hearken)?;

    let name = listener.to_string();
    let print_fn = lua.create_function(move |_, args: MultiValue| {
        let line = args
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join("\t");
        tracing::info!(listener = %name, "{}", line);
        Ok(())
    })?;
    globals.set("print", print_fn)?;

    Ok(())
}

/// Wrap `pcall` and `xpcall` so they re-raise once `expired` is set.
///
/// The budget hook raises an ordinary Lua error, which a protected call would
/// otherwise swallow and let the script keep looping.
pub(crate) fn guard_protected_calls(lua: &Lua, expired: Arc<AtomicBool>) -> Result<(), LuaError> {
    let globals = lua.globals();
    for name in ["pcall", "xpcall"] {
        let original: Function = globals.get(name)?;
        let expired = expired.clone();
        let guarded = lua.create_function(move |_, args: MultiValue| {
            if expired.load(Ordering::SeqCst) {
                return Err(mlua::Error::RuntimeError(BUDGET_EXCEEDED.to_string()));
            }
            let results = original.call::<MultiValue>(args)?;
            if expired.load(Ordering::SeqCst) {
                return Err(mlua::Error::RuntimeError(BUDGET_EXCEEDED.to_string()));
            }
            Ok(results)
        })?;
        globals.set(name, guarded)?;
    }
    Ok(())
}

/// Bind the triggering event to the global `event`
pub(crate) fn install_event(lua: &Lua, event: &ListenerEvent) -> Result<(), LuaError> {
    let table = lua.create_table()?;
    table.set("type", event.event_type.as_str())?;
    table.set("payload", lua.to_value(&event.payload)?)?;
    table.set("occurred_at", event.occurred_at.to_rfc3339())?;
    lua.globals().set("event", table)?;
    Ok(())
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.to_string_lossy().to_string(),
        other => other.type_name().to_string(),
    }
}
