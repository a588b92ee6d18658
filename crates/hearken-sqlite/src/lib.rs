//! SQLite storage backend for Hearken
//!
//! Implements [`ListenerStore`](hearken_core::ListenerStore) on a single
//! SQLite file.
//!
//! ## Features
//!
//! - **WAL mode** with `synchronous = FULL`: a write is on disk before the
//!   call returns
//! - **Soft delete**: deleted listeners disappear from `get`/`list` but their
//!   change log stays queryable
//! - **Versioned schema** applied on open
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hearken_sqlite::{SqliteConfig, SqliteListenerStore};
//!
//! let store = SqliteListenerStore::open(SqliteConfig::new("./listeners.db"))?;
//! let listeners = store.list(true).await?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod listener_store;
pub mod schema;

pub use config::SqliteConfig;
pub use connection::SqlitePool;
pub use error::{SqliteError, SqliteResult};
pub use listener_store::SqliteListenerStore;
