//! In-memory ListenerStore

use super::ListenerStore;
use crate::error::{StorageError, StorageResult};
use crate::types::{ListenerChange, ListenerDefinition, ListenerId, NewListener};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-local store backed by a `BTreeMap`, so listing is ordered by id.
///
/// Useful for tests and for hosts that persist definitions elsewhere.
/// [`fail_writes`](Self::fail_writes) simulates an unavailable backend.
#[derive(Debug, Default)]
pub struct MemoryListenerStore {
    inner: RwLock<Inner>,
    fail_writes: AtomicBool,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    listeners: BTreeMap<ListenerId, ListenerDefinition>,
    changes: Vec<ListenerChange>,
}

impl MemoryListenerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a backend error
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored (non-deleted) listeners
    pub fn len(&self) -> usize {
        self.inner.read().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StorageError::Backend("store is unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ListenerStore for MemoryListenerStore {
    async fn create(&self, listener: NewListener) -> StorageResult<ListenerDefinition> {
        self.check_writable()?;
        let mut inner = self.inner.write();
        inner.next_id += 1;
        let id = ListenerId(inner.next_id);
        let def = listener.into_definition(id);
        inner.listeners.insert(id, def.clone());
        Ok(def)
    }

    async fn get(&self, id: ListenerId) -> StorageResult<Option<ListenerDefinition>> {
        Ok(self.inner.read().listeners.get(&id).cloned())
    }

    async fn list(&self, include_disabled: bool) -> StorageResult<Vec<ListenerDefinition>> {
        Ok(self
            .inner
            .read()
            .listeners
            .values()
            .filter(|def| include_disabled || def.enabled)
            .cloned()
            .collect())
    }

    async fn update(&self, listener: ListenerDefinition) -> StorageResult<bool> {
        self.check_writable()?;
        let mut inner = self.inner.write();
        match inner.listeners.get_mut(&listener.id) {
            Some(slot) => {
                *slot = listener;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: ListenerId) -> StorageResult<bool> {
        self.check_writable()?;
        Ok(self.inner.write().listeners.remove(&id).is_some())
    }

    async fn record_change(&self, change: ListenerChange) -> StorageResult<()> {
        self.check_writable()?;
        self.inner.write().changes.push(change);
        Ok(())
    }

    async fn changes(&self, id: ListenerId) -> StorageResult<Vec<ListenerChange>> {
        Ok(self
            .inner
            .read()
            .changes
            .iter()
            .filter(|c| c.listener_id == id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChangeKind;
    use chrono::Utc;

    fn new_listener(name: &str, enabled: bool) -> NewListener {
        NewListener {
            name: name.to_string(),
            description: None,
            selectors: vec!["IssueCreated".into()],
            script_body: "return".into(),
            enabled,
            created_by: "admin".into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_ids() {
        let store = MemoryListenerStore::new();
        let a = store.create(new_listener("a", true)).await.unwrap();
        let b = store.create(new_listener("b", true)).await.unwrap();
        assert!(b.id > a.id);
        assert_eq!(store.get(a.id).await.unwrap().unwrap().name, "a");
    }

    #[tokio::test]
    async fn test_list_filters_disabled() {
        let store = MemoryListenerStore::new();
        store.create(new_listener("on", true)).await.unwrap();
        store.create(new_listener("off", false)).await.unwrap();

        assert_eq!(store.list(true).await.unwrap().len(), 2);
        let enabled = store.list(false).await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, "on");
    }

    #[tokio::test]
    async fn test_update_and_delete_report_missing() {
        let store = MemoryListenerStore::new();
        let def = store.create(new_listener("a", true)).await.unwrap();

        let mut ghost = def.clone();
        ghost.id = ListenerId(99);
        assert!(!store.update(ghost).await.unwrap());
        assert!(!store.delete(ListenerId(99)).await.unwrap());

        assert!(store.delete(def.id).await.unwrap());
        assert!(store.get(def.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_changes_survive_delete() {
        let store = MemoryListenerStore::new();
        let def = store.create(new_listener("a", true)).await.unwrap();
        store
            .record_change(ListenerChange {
                listener_id: def.id,
                author: "admin".into(),
                kind: ChangeKind::Created,
                comment: None,
                script_body: def.script_body.clone(),
                recorded_at: Utc::now(),
            })
            .await
            .unwrap();
        store.delete(def.id).await.unwrap();

        assert_eq!(store.changes(def.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fail_writes_surfaces_backend_error() {
        let store = MemoryListenerStore::new();
        store.fail_writes(true);
        let err = store.create(new_listener("a", true)).await.unwrap_err();
        assert!(matches!(err, StorageError::Backend(_)));
        assert!(store.is_empty());
    }
}
