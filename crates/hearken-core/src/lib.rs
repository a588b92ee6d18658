//! Hearken core: event-listener registry and script-execution engine
//!
//! Administrators register listeners (a name, one or more event-type
//! selectors and a script body) through [`ListenerRepository`]. Bodies are
//! compiled by a pluggable [`ScriptCompiler`] before they are accepted, stored
//! through a [`ListenerStore`], and activated in the in-memory
//! [`ListenerRegistry`]. The [`ExecutionRunner`] receives events from the host
//! and runs every listener bound to the event's type under a time budget.
//!
//! ```text
//!  admin ──► ListenerRepository ──► ScriptCompiler
//!                 │        │
//!                 ▼        ▼
//!          ListenerStore  ListenerRegistry ◄── ExecutionRunner ◄── events
//! ```
//!
//! The scripting language and the storage backend live in sibling crates
//! (`hearken-lua`, `hearken-sqlite`); this crate only defines their seams.

pub mod auth;
pub mod error;
pub mod history;
pub mod locks;
pub mod registry;
pub mod repository;
pub mod runner;
pub mod script;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use auth::{AdminGate, Capabilities, PermissionGate, Requestor};
pub use error::{
    ListenerError, ListenerResult, StatusClass, StorageError, StorageResult,
};
pub use history::{ExecutionHistory, InvocationOutcome, InvocationStatus, ListenerStats};
pub use locks::KeyedLocks;
pub use registry::{CompiledListener, ListenerRegistry, RegistryError, RegistrySnapshot};
pub use repository::{BootstrapReport, ListenerRepository};
pub use runner::{EventSink, ExecutionRunner, RunnerState};
pub use script::{
    CompilationResult, ExecutionError, ScriptCompiler, ScriptDiagnostic, ScriptUnit,
    SCRIPT_BODY_FIELD,
};
pub use store::{ListenerStore, MemoryListenerStore};
pub use types::{
    ChangeKind, ListenerChange, ListenerDefinition, ListenerEvent, ListenerForm, ListenerId,
    NewListener,
};
pub use validation::{validate_form, ValidForm};
