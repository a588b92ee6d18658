//! ListenerStore storage abstraction
//!
//! Pure persistence of listener definitions and their change history. A store
//! never compiles or validates; that is the repository's job. Every write
//! must be durable before the returned future resolves.
//!
//! # Example
//!
//! ```ignore
//! use hearken_core::store::{ListenerStore, MemoryListenerStore};
//!
//! let store = MemoryListenerStore::new();
//! let def = store.create(new_listener).await?;
//! assert_eq!(store.get(def.id).await?, Some(def));
//! ```

mod memory;

pub use memory::MemoryListenerStore;

use crate::error::StorageResult;
use crate::types::{ListenerChange, ListenerDefinition, ListenerId, NewListener};
use async_trait::async_trait;

/// Durable mapping from listener id to definition.
#[async_trait]
pub trait ListenerStore: Send + Sync {
    /// Persist a new definition and return it with its assigned id
    async fn create(&self, listener: NewListener) -> StorageResult<ListenerDefinition>;

    /// Fetch one definition; `None` if absent or deleted
    async fn get(&self, id: ListenerId) -> StorageResult<Option<ListenerDefinition>>;

    /// All definitions ordered by id, optionally including disabled ones
    async fn list(&self, include_disabled: bool) -> StorageResult<Vec<ListenerDefinition>>;

    /// Replace the stored definition with the same id.
    ///
    /// Returns `false` if no such listener exists.
    async fn update(&self, listener: ListenerDefinition) -> StorageResult<bool>;

    /// Remove a definition. Returns `false` if no such listener exists.
    async fn delete(&self, id: ListenerId) -> StorageResult<bool>;

    /// Append an entry to a listener's change log
    async fn record_change(&self, change: ListenerChange) -> StorageResult<()>;

    /// Change log for a listener, oldest first
    async fn changes(&self, id: ListenerId) -> StorageResult<Vec<ListenerChange>>;
}
