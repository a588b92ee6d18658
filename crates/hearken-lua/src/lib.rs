//! Lua scripting backend for Hearken listeners
//!
//! Listener bodies are plain Lua 5.4 chunks. [`LuaCompiler`] checks a body
//! for syntax errors without running it and produces a [`LuaScript`]; each
//! invocation of that script runs in a fresh, sandboxed Lua state with the
//! triggering event bound to the global `event`:
//!
//! ```lua
//! if event.payload.priority == "high" then
//!     hearken.log("warn", "urgent issue " .. event.payload.key)
//! end
//! return { handled = true }
//! ```
//!
//! ## Sandbox
//!
//! Only the `string`, `table`, `math` and `utf8` libraries are loaded; `io`,
//! `os`, `debug` and `package` are unavailable and the base functions that
//! read files or load code (`dofile`, `loadfile`, `load`, `require`) are
//! removed. Scripts get:
//!
//! - `event.type`, `event.payload`, `event.occurred_at`
//! - `hearken.log(level, message)` forwarding to `tracing`
//! - `hearken.json_encode(value)` / `hearken.json_decode(text)`
//! - `print(...)`, logged at info level
//!
//! ## Time budget
//!
//! An instruction-count hook checks the deadline every
//! `instruction_check_interval` VM instructions and aborts the script once
//! the budget is spent.

mod compiler;
mod diagnostics;
mod error;
mod sandbox;
mod script;

pub use compiler::LuaCompiler;
pub use diagnostics::syntax_diagnostic;
pub use error::LuaError;
pub use script::LuaScript;

/// Chunk name used for every listener body, so error messages read
/// `listener:<line>: <message>`
pub const CHUNK_NAME: &str = "=listener";
