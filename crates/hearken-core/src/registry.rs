//! Live index of active compiled listeners
//!
//! The registry maps event-type selectors to the compiled listeners bound to
//! them. It is copy-on-write: every mutation builds a new
//! [`RegistrySnapshot`] and swaps it in with a single pointer store, so a
//! reader either sees a listener fully at its old selectors or fully at its
//! new ones, never a mix.
//!
//! ```text
//!  activate / deactivate            lookup
//!        │                             │
//!   writer mutex                  read lock (Arc clone)
//!        │                             │
//!   clone snapshot ──► mutate ──► swap Arc ◄── readers keep old Arc
//! ```
//!
//! Writers are serialized by a mutex that only covers cloning and editing the
//! index; compilation and storage I/O never happen under it.

use crate::script::ScriptUnit;
use crate::types::ListenerId;
use hearken_config::RegistryConfig;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// A compiled unit bound to the definition it was built from.
///
/// Never persisted; rebuilt whenever the definition changes.
#[derive(Clone)]
pub struct CompiledListener {
    pub id: ListenerId,
    pub name: Arc<str>,
    pub unit: Arc<dyn ScriptUnit>,
}

impl CompiledListener {
    pub fn new(id: ListenerId, name: impl Into<Arc<str>>, unit: Arc<dyn ScriptUnit>) -> Self {
        Self {
            id,
            name: name.into(),
            unit,
        }
    }
}

impl fmt::Debug for CompiledListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledListener")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Activation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("listener {0} has no selectors")]
    EmptySelectors(ListenerId),

    #[error("selector '{selector}' already has {limit} active listeners")]
    SelectorFull { selector: String, limit: usize },
}

#[derive(Clone)]
struct ActiveEntry {
    seq: u64,
    selectors: Vec<String>,
    listener: CompiledListener,
}

/// Immutable view of the registry at one point in time.
#[derive(Clone, Default)]
pub struct RegistrySnapshot {
    version: u64,
    by_selector: HashMap<String, BTreeMap<u64, CompiledListener>>,
    entries: HashMap<ListenerId, ActiveEntry>,
}

impl RegistrySnapshot {
    /// Listeners bound to `event_type`, in registration order
    pub fn lookup(&self, event_type: &str) -> Vec<CompiledListener> {
        self.by_selector
            .get(event_type)
            .map(|bucket| bucket.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Ids bound to `event_type`, in registration order
    pub fn lookup_ids(&self, event_type: &str) -> Vec<ListenerId> {
        self.by_selector
            .get(event_type)
            .map(|bucket| bucket.values().map(|l| l.id).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Selectors `id` is currently active under
    pub fn selectors_of(&self, id: ListenerId) -> Option<&[String]> {
        self.entries.get(&id).map(|e| e.selectors.as_slice())
    }

    /// Compiled unit for `id`
    pub fn get(&self, id: ListenerId) -> Option<&CompiledListener> {
        self.entries.get(&id).map(|e| &e.listener)
    }

    /// Number of active listeners
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Monotonic counter bumped by every successful mutation
    pub fn version(&self) -> u64 {
        self.version
    }

    fn remove_entry(&mut self, id: ListenerId) -> Option<ActiveEntry> {
        let entry = self.entries.remove(&id)?;
        for selector in &entry.selectors {
            if let Some(bucket) = self.by_selector.get_mut(selector) {
                bucket.remove(&entry.seq);
                if bucket.is_empty() {
                    self.by_selector.remove(selector);
                }
            }
        }
        Some(entry)
    }
}

impl fmt::Debug for RegistrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrySnapshot")
            .field("version", &self.version)
            .field("listeners", &self.entries.len())
            .field("selectors", &self.by_selector.len())
            .finish()
    }
}

/// Owned, swap-atomic index of active listeners.
pub struct ListenerRegistry {
    current: RwLock<Arc<RegistrySnapshot>>,
    /// Serializes writers; holds the next registration sequence number
    writer: Mutex<u64>,
    max_per_selector: usize,
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerRegistry {
    /// Registry without a per-selector limit
    pub fn new() -> Self {
        Self::with_limit(0)
    }

    /// Registry configured from [`RegistryConfig`]
    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::with_limit(config.max_listeners_per_selector)
    }

    /// Registry allowing at most `max_per_selector` listeners per selector (0 = unlimited)
    pub fn with_limit(max_per_selector: usize) -> Self {
        Self {
            current: RwLock::new(Arc::new(RegistrySnapshot::default())),
            writer: Mutex::new(0),
            max_per_selector,
        }
    }

    /// Current snapshot; stays valid and unchanged while held
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.read().clone()
    }

    /// Listeners bound to `event_type`, in registration order
    pub fn lookup(&self, event_type: &str) -> Vec<CompiledListener> {
        self.snapshot().lookup(event_type)
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.snapshot().contains(id)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bind `listener` to `selectors`, replacing any prior entry for its id.
    ///
    /// A re-activated listener keeps its original registration position. On
    /// error the registry is left untouched.
    pub fn activate(
        &self,
        listener: CompiledListener,
        selectors: &[String],
    ) -> Result<(), RegistryError> {
        let id = listener.id;
        if selectors.is_empty() {
            return Err(RegistryError::EmptySelectors(id));
        }

        let mut next_seq = self.writer.lock();
        let mut next = (*self.snapshot()).clone();

        let seq = match next.remove_entry(id) {
            Some(previous) => previous.seq,
            None => {
                *next_seq += 1;
                *next_seq
            }
        };

        let mut bound: Vec<String> = Vec::with_capacity(selectors.len());
        for selector in selectors {
            if bound.contains(selector) {
                continue;
            }
            let bucket = next.by_selector.entry(selector.clone()).or_default();
            if self.max_per_selector > 0 && bucket.len() >= self.max_per_selector {
                return Err(RegistryError::SelectorFull {
                    selector: selector.clone(),
                    limit: self.max_per_selector,
                });
            }
            bucket.insert(seq, listener.clone());
            bound.push(selector.clone());
        }

        next.entries.insert(
            id,
            ActiveEntry {
                seq,
                selectors: bound,
                listener,
            },
        );
        next.version += 1;

        debug!(listener_id = %id, seq, version = next.version, "Activated listener");
        *self.current.write() = Arc::new(next);
        Ok(())
    }

    /// Remove `id` from every selector. Returns whether it was active.
    pub fn deactivate(&self, id: ListenerId) -> bool {
        let _guard = self.writer.lock();
        let mut next = (*self.snapshot()).clone();
        if next.remove_entry(id).is_none() {
            return false;
        }
        next.version += 1;

        debug!(listener_id = %id, version = next.version, "Deactivated listener");
        *self.current.write() = Arc::new(next);
        true
    }

    /// Drop every entry
    pub fn clear(&self) {
        let _guard = self.writer.lock();
        let version = self.snapshot().version + 1;
        *self.current.write() = Arc::new(RegistrySnapshot {
            version,
            ..RegistrySnapshot::default()
        });
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("snapshot", &*self.snapshot())
            .field("max_per_selector", &self.max_per_selector)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ExecutionError;
    use crate::types::ListenerEvent;
    use serde_json::Value as JsonValue;
    use std::time::Duration;

    #[derive(Debug)]
    struct NoopUnit;

    impl ScriptUnit for NoopUnit {
        fn invoke(&self, _: &ListenerEvent, _: Duration) -> Result<JsonValue, ExecutionError> {
            Ok(JsonValue::Null)
        }
    }

    fn compiled(id: i64) -> CompiledListener {
        CompiledListener::new(ListenerId(id), format!("l{}", id), Arc::new(NoopUnit))
    }

    fn sel(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_lookup_preserves_registration_order() {
        let registry = ListenerRegistry::new();
        registry.activate(compiled(2), &sel(&["A"])).unwrap();
        registry.activate(compiled(1), &sel(&["A"])).unwrap();
        registry.activate(compiled(3), &sel(&["A", "B"])).unwrap();

        let snap = registry.snapshot();
        assert_eq!(snap.lookup_ids("A"), vec![ListenerId(2), ListenerId(1), ListenerId(3)]);
        assert_eq!(snap.lookup_ids("B"), vec![ListenerId(3)]);
        assert!(snap.lookup("C").is_empty());
    }

    #[test]
    fn test_reactivation_moves_selectors_and_keeps_position() {
        let registry = ListenerRegistry::new();
        registry.activate(compiled(1), &sel(&["A"])).unwrap();
        registry.activate(compiled(2), &sel(&["A", "B"])).unwrap();

        registry.activate(compiled(1), &sel(&["A", "B"])).unwrap();
        let snap = registry.snapshot();
        assert_eq!(snap.lookup_ids("B"), vec![ListenerId(1), ListenerId(2)]);

        registry.activate(compiled(1), &sel(&["C"])).unwrap();
        let snap = registry.snapshot();
        assert_eq!(snap.lookup_ids("A"), vec![ListenerId(2)]);
        assert_eq!(snap.lookup_ids("C"), vec![ListenerId(1)]);
        assert_eq!(snap.selectors_of(ListenerId(1)), Some(&sel(&["C"])[..]));
    }

    #[test]
    fn test_deactivate_removes_everywhere() {
        let registry = ListenerRegistry::new();
        registry.activate(compiled(1), &sel(&["A", "B"])).unwrap();

        assert!(registry.deactivate(ListenerId(1)));
        assert!(!registry.deactivate(ListenerId(1)));
        assert!(registry.lookup("A").is_empty());
        assert!(registry.lookup("B").is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_old_snapshot_is_unaffected_by_later_writes() {
        let registry = ListenerRegistry::new();
        registry.activate(compiled(1), &sel(&["A"])).unwrap();
        let before = registry.snapshot();

        registry.activate(compiled(1), &sel(&["B"])).unwrap();

        assert_eq!(before.lookup_ids("A"), vec![ListenerId(1)]);
        assert!(before.lookup("B").is_empty());
        assert!(registry.snapshot().version() > before.version());
    }

    #[test]
    fn test_selector_limit_leaves_registry_untouched() {
        let registry = ListenerRegistry::with_limit(1);
        registry.activate(compiled(1), &sel(&["A"])).unwrap();
        registry.activate(compiled(2), &sel(&["B"])).unwrap();
        let version = registry.snapshot().version();

        let err = registry.activate(compiled(2), &sel(&["B", "A"])).unwrap_err();
        assert_eq!(
            err,
            RegistryError::SelectorFull {
                selector: "A".into(),
                limit: 1
            }
        );

        let snap = registry.snapshot();
        assert_eq!(snap.version(), version);
        assert_eq!(snap.lookup_ids("B"), vec![ListenerId(2)]);
    }

    #[test]
    fn test_updating_in_place_does_not_count_against_limit() {
        let registry = ListenerRegistry::with_limit(1);
        registry.activate(compiled(1), &sel(&["A"])).unwrap();
        registry.activate(compiled(1), &sel(&["A"])).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_empty_selectors_rejected() {
        let registry = ListenerRegistry::new();
        let err = registry.activate(compiled(1), &[]).unwrap_err();
        assert_eq!(err, RegistryError::EmptySelectors(ListenerId(1)));
    }

    #[test]
    fn test_clear_bumps_version() {
        let registry = ListenerRegistry::new();
        registry.activate(compiled(1), &sel(&["A"])).unwrap();
        let v = registry.snapshot().version();
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.snapshot().version() > v);
    }
}
