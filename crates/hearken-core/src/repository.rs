//! Administrative orchestration of listener definitions
//!
//! [`ListenerRepository`] is the only component that mutates both the
//! [`ListenerStore`] and the [`ListenerRegistry`]. Every operation checks the
//! [`PermissionGate`] first; create and update validate the form and compile
//! the body before any lock is taken, then apply store and registry changes
//! while holding the per-id lock.
//!
//! ```text
//!  form ─► gate ─► validate ─► compile ─► lock(id) ─► store ─► registry
//!                                 │                      │         │
//!                          Compilation error        rollback on activation failure
//! ```
//!
//! Ordering rules:
//!
//! - **create**: store first, then activate. The id is only known once the
//!   row exists, so the row is re-read under the lock and activation is
//!   skipped if a concurrent update or delete got there first. If activation
//!   fails the stored row is deleted again, or disabled when even the delete
//!   fails.
//! - **update**: store first, then swap the compiled unit in the registry. If
//!   the swap fails the previous definition is written back; the registry
//!   never stopped serving the old unit.
//! - **delete**: deactivate first, then delete from the store. A failing store
//!   leaves the listener inert and reports the storage error.

use crate::auth::{AdminGate, PermissionGate, Requestor};
use crate::error::{ListenerError, ListenerResult, StorageError};
use crate::history::ExecutionHistory;
use crate::locks::KeyedLocks;
use crate::registry::{CompiledListener, ListenerRegistry, RegistryError};
use crate::script::{ScriptCompiler, ScriptDiagnostic, ScriptUnit};
use crate::store::ListenerStore;
use crate::types::{
    ChangeKind, ListenerChange, ListenerDefinition, ListenerForm, ListenerId, NewListener,
};
use crate::validation::validate_form;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, warn};

/// Result of rebuilding the registry from the store
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BootstrapReport {
    /// Listeners now active, in store order
    pub activated: Vec<ListenerId>,
    /// Enabled definitions whose body no longer compiles
    pub skipped: Vec<(ListenerId, ScriptDiagnostic)>,
    /// Definitions that compiled but could not be activated
    pub rejected: Vec<(ListenerId, RegistryError)>,
}

impl BootstrapReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.rejected.is_empty()
    }
}

/// Permission-gated CRUD over listeners that keeps store and registry in step.
pub struct ListenerRepository {
    store: Arc<dyn ListenerStore>,
    compiler: Arc<dyn ScriptCompiler>,
    registry: Arc<ListenerRegistry>,
    gate: Arc<dyn PermissionGate>,
    locks: KeyedLocks,
    history: Option<Arc<ExecutionHistory>>,
}

impl ListenerRepository {
    /// Repository guarded by [`AdminGate`]
    pub fn new(
        store: Arc<dyn ListenerStore>,
        compiler: Arc<dyn ScriptCompiler>,
        registry: Arc<ListenerRegistry>,
    ) -> Self {
        Self {
            store,
            compiler,
            registry,
            gate: Arc::new(AdminGate),
            locks: KeyedLocks::new(),
            history: None,
        }
    }

    /// Replace the permission gate
    pub fn with_gate(mut self, gate: Arc<dyn PermissionGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Clear a listener's execution stats when it is deleted
    pub fn with_history(mut self, history: Arc<ExecutionHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn registry(&self) -> &Arc<ListenerRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn ListenerStore> {
        &self.store
    }

    /// All definitions ordered by id
    pub async fn list_listeners(
        &self,
        requestor: &Requestor,
        include_disabled: bool,
    ) -> ListenerResult<Vec<ListenerDefinition>> {
        self.gate.check_admin(requestor)?;
        self.store
            .list(include_disabled)
            .await
            .map_err(|e| storage_failure("list", None, e))
    }

    pub async fn get_listener(
        &self,
        requestor: &Requestor,
        id: ListenerId,
    ) -> ListenerResult<ListenerDefinition> {
        self.gate.check_admin(requestor)?;
        self.load(id, "get").await
    }

    /// Validate, compile, persist and activate a new listener.
    ///
    /// A compilation or validation failure leaves store and registry untouched.
    pub async fn create_listener(
        &self,
        requestor: &Requestor,
        form: ListenerForm,
    ) -> ListenerResult<ListenerDefinition> {
        self.gate.check_admin(requestor)?;
        let valid = validate_form(&form)?;
        let unit = self.compile(&valid.name, &valid.script_body).await?;

        let def = self
            .store
            .create(NewListener {
                name: valid.name,
                description: valid.description,
                selectors: valid.selectors,
                script_body: valid.script_body,
                enabled: valid.enabled,
                created_by: requestor.username.clone(),
                created_at: Utc::now(),
            })
            .await
            .map_err(|e| storage_failure("create", None, e))?;

        let guard = self.locks.lock(def.id).await;

        // another request may have reached the new id before this lock
        let current = self
            .store
            .get(def.id)
            .await
            .map_err(|e| storage_failure("create", Some(def.id), e))?;
        match current {
            None => {
                warn!(listener_id = %def.id, "Listener deleted before activation");
                self.release(guard, def.id);
                return Err(ListenerError::NotFound(def.id));
            }
            Some(current) if current != def => {
                warn!(
                    listener_id = %def.id,
                    "Listener updated before activation, keeping newer definition"
                );
                self.record_change(&def, requestor, ChangeKind::Created, valid.comment)
                    .await;
                return Ok(current);
            }
            Some(_) => {}
        }

        if def.enabled {
            let compiled = CompiledListener::new(def.id, def.name.as_str(), unit);
            if let Err(cause) = self.registry.activate(compiled, &def.selectors) {
                return Err(self.roll_back_create(&def, cause).await);
            }
        }

        self.record_change(&def, requestor, ChangeKind::Created, valid.comment)
            .await;
        info!(
            listener_id = %def.id,
            listener = %def.name,
            user = %requestor.username,
            enabled = def.enabled,
            "Created listener"
        );
        Ok(def)
    }

    /// Replace a listener's definition and compiled unit as a whole.
    pub async fn update_listener(
        &self,
        requestor: &Requestor,
        id: ListenerId,
        form: ListenerForm,
    ) -> ListenerResult<ListenerDefinition> {
        self.gate.check_admin(requestor)?;
        let valid = validate_form(&form)?;
        let unit = self.compile(&valid.name, &valid.script_body).await?;

        let guard = self.locks.lock(id).await;
        let previous = match self.load(id, "update").await {
            Ok(previous) => previous,
            Err(err) => {
                self.release(guard, id);
                return Err(err);
            }
        };

        let updated = ListenerDefinition {
            id,
            name: valid.name,
            description: valid.description,
            selectors: valid.selectors,
            script_body: valid.script_body,
            enabled: valid.enabled,
            created_by: previous.created_by.clone(),
            created_at: previous.created_at,
            updated_by: requestor.username.clone(),
            updated_at: Utc::now(),
        };

        let found = self
            .store
            .update(updated.clone())
            .await
            .map_err(|e| storage_failure("update", Some(id), e))?;
        if !found {
            self.release(guard, id);
            return Err(ListenerError::NotFound(id));
        }

        if updated.enabled {
            let compiled = CompiledListener::new(id, updated.name.as_str(), unit);
            if let Err(cause) = self.registry.activate(compiled, &updated.selectors) {
                return Err(self.roll_back_update(previous, cause).await);
            }
        } else if self.registry.deactivate(id) {
            debug!(listener_id = %id, "Listener disabled");
        }

        self.record_change(&updated, requestor, ChangeKind::Updated, valid.comment)
            .await;
        info!(
            listener_id = %id,
            listener = %updated.name,
            user = %requestor.username,
            enabled = updated.enabled,
            "Updated listener"
        );
        Ok(updated)
    }

    /// Deactivate a listener and delete its definition.
    pub async fn delete_listener(&self, requestor: &Requestor, id: ListenerId) -> ListenerResult<()> {
        self.gate.check_admin(requestor)?;

        let guard = self.locks.lock(id).await;
        let existing = match self.load(id, "delete").await {
            Ok(existing) => existing,
            Err(err) => {
                self.release(guard, id);
                return Err(err);
            }
        };

        let was_active = self.registry.deactivate(id);
        match self.store.delete(id).await {
            Ok(true) => {}
            Ok(false) => {
                self.release(guard, id);
                return Err(ListenerError::NotFound(id));
            }
            Err(e) => {
                error!(
                    listener_id = %id,
                    operation = "delete",
                    was_active,
                    error = %e,
                    "Listener deactivated but store delete failed"
                );
                return Err(ListenerError::Storage(e));
            }
        }

        self.record_change(&existing, requestor, ChangeKind::Deleted, None)
            .await;
        if let Some(history) = &self.history {
            history.forget(id);
        }
        self.release(guard, id);

        info!(
            listener_id = %id,
            listener = %existing.name,
            user = %requestor.username,
            "Deleted listener"
        );
        Ok(())
    }

    /// Change log for a listener, including deleted ones
    pub async fn listener_changes(
        &self,
        requestor: &Requestor,
        id: ListenerId,
    ) -> ListenerResult<Vec<ListenerChange>> {
        self.gate.check_admin(requestor)?;
        let changes = self
            .store
            .changes(id)
            .await
            .map_err(|e| storage_failure("changes", Some(id), e))?;
        if changes.is_empty() {
            // distinguish "never existed" from "exists, no history"
            self.load(id, "changes").await?;
        }
        Ok(changes)
    }

    /// Rebuild the registry from every enabled stored definition.
    ///
    /// Bodies that no longer compile are skipped and logged; startup goes on.
    pub async fn bootstrap(&self) -> ListenerResult<BootstrapReport> {
        let definitions = self
            .store
            .list(false)
            .await
            .map_err(|e| storage_failure("bootstrap", None, e))?;

        self.registry.clear();
        let mut report = BootstrapReport::default();

        for def in definitions {
            let unit = match self.compile(&def.name, &def.script_body).await {
                Ok(unit) => unit,
                Err(ListenerError::Compilation(diag)) => {
                    warn!(
                        listener_id = %def.id,
                        listener = %def.name,
                        diagnostic = %diag,
                        "Skipping listener that no longer compiles"
                    );
                    report.skipped.push((def.id, diag));
                    continue;
                }
                Err(other) => return Err(other),
            };

            let compiled = CompiledListener::new(def.id, def.name.as_str(), unit);
            match self.registry.activate(compiled, &def.selectors) {
                Ok(()) => report.activated.push(def.id),
                Err(cause) => {
                    error!(
                        listener_id = %def.id,
                        listener = %def.name,
                        operation = "bootstrap",
                        error = %cause,
                        "Could not activate stored listener"
                    );
                    report.rejected.push((def.id, cause));
                }
            }
        }

        info!(
            activated = report.activated.len(),
            skipped = report.skipped.len(),
            rejected = report.rejected.len(),
            "Listener registry loaded"
        );
        Ok(report)
    }

    /// Unlock and drop the lock entry of an id that no longer exists
    fn release(&self, guard: OwnedMutexGuard<()>, id: ListenerId) {
        drop(guard);
        self.locks.forget(id);
    }

    async fn load(&self, id: ListenerId, operation: &'static str) -> ListenerResult<ListenerDefinition> {
        self.store
            .get(id)
            .await
            .map_err(|e| storage_failure(operation, Some(id), e))?
            .ok_or(ListenerError::NotFound(id))
    }

    /// Compile on the blocking pool; the compiler may be CPU-heavy.
    async fn compile(&self, name: &str, source: &str) -> ListenerResult<Arc<dyn ScriptUnit>> {
        let compiler = self.compiler.clone();
        let name = name.to_string();
        let source = source.to_string();

        tokio::task::spawn_blocking(move || compiler.compile(&name, &source))
            .await
            .map_err(|e| {
                error!(operation = "compile", error = %e, "Compiler task failed");
                ListenerError::Internal(format!("compiler task failed: {}", e))
            })?
            .map_err(ListenerError::Compilation)
    }

    async fn roll_back_create(&self, def: &ListenerDefinition, cause: RegistryError) -> ListenerError {
        error!(
            listener_id = %def.id,
            listener = %def.name,
            operation = "create",
            error = %cause,
            "Activation failed after store write, rolling back"
        );

        if let Err(delete_err) = self.store.delete(def.id).await {
            error!(
                listener_id = %def.id,
                operation = "create",
                error = %delete_err,
                "Rollback delete failed, disabling stored definition"
            );
            let mut disabled = def.clone();
            disabled.enabled = false;
            if let Err(update_err) = self.store.update(disabled).await {
                error!(
                    listener_id = %def.id,
                    operation = "create",
                    error = %update_err,
                    "Could not disable stored definition; it is stored but inactive"
                );
            }
        }

        ListenerError::RegistryInconsistency {
            id: def.id,
            operation: "create",
            detail: cause.to_string(),
        }
    }

    async fn roll_back_update(&self, previous: ListenerDefinition, cause: RegistryError) -> ListenerError {
        let id = previous.id;
        error!(
            listener_id = %id,
            operation = "update",
            error = %cause,
            "Activation failed after store write, restoring previous definition"
        );

        if let Err(restore_err) = self.store.update(previous).await {
            error!(
                listener_id = %id,
                operation = "update",
                error = %restore_err,
                "Could not restore previous definition; store is ahead of registry"
            );
        }

        ListenerError::RegistryInconsistency {
            id,
            operation: "update",
            detail: cause.to_string(),
        }
    }

    async fn record_change(
        &self,
        def: &ListenerDefinition,
        requestor: &Requestor,
        kind: ChangeKind,
        comment: Option<String>,
    ) {
        let change = ListenerChange {
            listener_id: def.id,
            author: requestor.username.clone(),
            kind,
            comment,
            script_body: def.script_body.clone(),
            recorded_at: Utc::now(),
        };
        if let Err(e) = self.store.record_change(change).await {
            warn!(
                listener_id = %def.id,
                kind = kind.as_str(),
                error = %e,
                "Failed to record listener change"
            );
        }
    }
}

fn storage_failure(operation: &'static str, id: Option<ListenerId>, err: StorageError) -> ListenerError {
    match id {
        Some(id) => error!(listener_id = %id, operation, error = %err, "Listener store failed"),
        None => error!(operation, error = %err, "Listener store failed"),
    }
    ListenerError::Storage(err)
}

impl std::fmt::Debug for ListenerRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRepository")
            .field("registry", &self.registry)
            .field("locks", &self.locks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryListenerStore;
    use crate::test_support::MockCompiler;

    struct Fixture {
        store: Arc<MemoryListenerStore>,
        compiler: MockCompiler,
        repo: ListenerRepository,
    }

    fn fixture_with_registry(registry: ListenerRegistry) -> Fixture {
        let store = Arc::new(MemoryListenerStore::new());
        let compiler = MockCompiler::default();
        let repo = ListenerRepository::new(
            store.clone(),
            Arc::new(compiler.clone()),
            Arc::new(registry),
        );
        Fixture {
            store,
            compiler,
            repo,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_registry(ListenerRegistry::new())
    }

    fn admin() -> Requestor {
        Requestor::admin("admin")
    }

    /// Store whose `create` returns only some time after the row is written
    struct SlowCreate {
        inner: MemoryListenerStore,
        delay: std::time::Duration,
    }

    #[async_trait::async_trait]
    impl ListenerStore for SlowCreate {
        async fn create(&self, l: NewListener) -> crate::error::StorageResult<ListenerDefinition> {
            let def = self.inner.create(l).await?;
            tokio::time::sleep(self.delay).await;
            Ok(def)
        }
        async fn get(&self, id: ListenerId) -> crate::error::StorageResult<Option<ListenerDefinition>> {
            self.inner.get(id).await
        }
        async fn list(&self, all: bool) -> crate::error::StorageResult<Vec<ListenerDefinition>> {
            self.inner.list(all).await
        }
        async fn update(&self, l: ListenerDefinition) -> crate::error::StorageResult<bool> {
            self.inner.update(l).await
        }
        async fn delete(&self, id: ListenerId) -> crate::error::StorageResult<bool> {
            self.inner.delete(id).await
        }
        async fn record_change(&self, c: ListenerChange) -> crate::error::StorageResult<()> {
            self.inner.record_change(c).await
        }
        async fn changes(&self, id: ListenerId) -> crate::error::StorageResult<Vec<ListenerChange>> {
            self.inner.changes(id).await
        }
    }

    fn slow_repo() -> Arc<ListenerRepository> {
        Arc::new(ListenerRepository::new(
            Arc::new(SlowCreate {
                inner: MemoryListenerStore::new(),
                delay: std::time::Duration::from_millis(200),
            }),
            Arc::new(MockCompiler::default()),
            Arc::new(ListenerRegistry::new()),
        ))
    }

    #[tokio::test]
    async fn test_create_activates_and_records_change() {
        let fx = fixture();
        let def = fx
            .repo
            .create_listener(&admin(), ListenerForm::new("n", "E", "ok").with_comment("first"))
            .await
            .unwrap();

        assert!(fx.repo.registry().contains(def.id));
        assert_eq!(def.created_by, "admin");

        let changes = fx.repo.listener_changes(&admin(), def.id).await.unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Created);
        assert_eq!(changes[0].comment.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_disabled_listener_is_stored_but_inactive() {
        let fx = fixture();
        let def = fx
            .repo
            .create_listener(&admin(), ListenerForm::new("n", "E", "ok").with_enabled(false))
            .await
            .unwrap();

        assert!(!fx.repo.registry().contains(def.id));
        assert_eq!(fx.store.len(), 1);
    }

    #[tokio::test]
    async fn test_permission_denied_skips_compiler() {
        let fx = fixture();
        let err = fx
            .repo
            .create_listener(&Requestor::user("bob"), ListenerForm::new("n", "E", "ok"))
            .await
            .unwrap_err();

        assert!(matches!(err, ListenerError::PermissionDenied { .. }));
        assert_eq!(fx.compiler.compile_count(), 0);
        assert!(fx.store.is_empty());
    }

    #[tokio::test]
    async fn test_validation_runs_before_compile() {
        let fx = fixture();
        let err = fx
            .repo
            .create_listener(&admin(), ListenerForm::new("  ", "E", "ok"))
            .await
            .unwrap_err();

        assert_eq!(err.field(), Some("name"));
        assert_eq!(fx.compiler.compile_count(), 0);
    }

    #[tokio::test]
    async fn test_create_rolls_back_when_activation_fails() {
        let fx = fixture_with_registry(ListenerRegistry::with_limit(1));
        fx.repo
            .create_listener(&admin(), ListenerForm::new("a", "E", "ok"))
            .await
            .unwrap();

        let err = fx
            .repo
            .create_listener(&admin(), ListenerForm::new("b", "E", "ok"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ListenerError::RegistryInconsistency {
                operation: "create",
                ..
            }
        ));
        assert_eq!(fx.store.len(), 1);
        assert_eq!(fx.repo.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_update_rolls_back_store_when_activation_fails() {
        let fx = fixture_with_registry(ListenerRegistry::with_limit(1));
        fx.repo
            .create_listener(&admin(), ListenerForm::new("a", "E", "ok"))
            .await
            .unwrap();
        let b = fx
            .repo
            .create_listener(&admin(), ListenerForm::new("b", "F", "ok"))
            .await
            .unwrap();

        let err = fx
            .repo
            .update_listener(&admin(), b.id, ListenerForm::new("b2", "E", "ok"))
            .await
            .unwrap_err();
        assert_eq!(err.status_class(), crate::error::StatusClass::Internal);

        let stored = fx.repo.get_listener(&admin(), b.id).await.unwrap();
        assert_eq!(stored, b);
        assert_eq!(fx.repo.registry().snapshot().lookup_ids("F"), vec![b.id]);
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found() {
        let fx = fixture();
        let err = fx
            .repo
            .update_listener(&admin(), ListenerId(42), ListenerForm::new("n", "E", "ok"))
            .await
            .unwrap_err();
        assert_eq!(err, ListenerError::NotFound(ListenerId(42)));
    }

    #[tokio::test]
    async fn test_update_to_disabled_deactivates() {
        let fx = fixture();
        let def = fx
            .repo
            .create_listener(&admin(), ListenerForm::new("n", "E", "ok"))
            .await
            .unwrap();

        fx.repo
            .update_listener(&admin(), def.id, ListenerForm::new("n", "E", "ok").with_enabled(false))
            .await
            .unwrap();
        assert!(!fx.repo.registry().contains(def.id));
    }

    #[tokio::test]
    async fn test_delete_store_failure_still_deactivates() {
        let fx = fixture();
        let def = fx
            .repo
            .create_listener(&admin(), ListenerForm::new("n", "E", "ok"))
            .await
            .unwrap();

        fx.store.fail_writes(true);
        let err = fx.repo.delete_listener(&admin(), def.id).await.unwrap_err();

        assert!(matches!(err, ListenerError::Storage(_)));
        assert!(!fx.repo.registry().contains(def.id));
    }

    #[tokio::test]
    async fn test_change_log_failure_does_not_fail_create() {
        struct ChangeLogDown(MemoryListenerStore);

        #[async_trait::async_trait]
        impl ListenerStore for ChangeLogDown {
            async fn create(&self, l: NewListener) -> crate::error::StorageResult<ListenerDefinition> {
                self.0.create(l).await
            }
            async fn get(&self, id: ListenerId) -> crate::error::StorageResult<Option<ListenerDefinition>> {
                self.0.get(id).await
            }
            async fn list(&self, all: bool) -> crate::error::StorageResult<Vec<ListenerDefinition>> {
                self.0.list(all).await
            }
            async fn update(&self, l: ListenerDefinition) -> crate::error::StorageResult<bool> {
                self.0.update(l).await
            }
            async fn delete(&self, id: ListenerId) -> crate::error::StorageResult<bool> {
                self.0.delete(id).await
            }
            async fn record_change(&self, _: ListenerChange) -> crate::error::StorageResult<()> {
                Err(StorageError::Backend("change log offline".into()))
            }
            async fn changes(&self, id: ListenerId) -> crate::error::StorageResult<Vec<ListenerChange>> {
                self.0.changes(id).await
            }
        }

        let repo = ListenerRepository::new(
            Arc::new(ChangeLogDown(MemoryListenerStore::new())),
            Arc::new(MockCompiler::default()),
            Arc::new(ListenerRegistry::new()),
        );
        let def = repo
            .create_listener(&admin(), ListenerForm::new("n", "E", "ok"))
            .await
            .unwrap();
        assert!(repo.registry().contains(def.id));
    }

    #[tokio::test]
    async fn test_bootstrap_skips_broken_bodies() {
        let fx = fixture();
        let now = Utc::now();
        for (name, body) in [("good", "ok"), ("broken", "!!"), ("also-good", "ok")] {
            fx.store
                .create(NewListener {
                    name: name.into(),
                    description: None,
                    selectors: vec!["E".into()],
                    script_body: body.into(),
                    enabled: true,
                    created_by: "seed".into(),
                    created_at: now,
                })
                .await
                .unwrap();
        }

        let report = fx.repo.bootstrap().await.unwrap();
        assert_eq!(report.activated, vec![ListenerId(1), ListenerId(3)]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0, ListenerId(2));
        assert_eq!(report.skipped[0].1.field, "scriptBody");
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_changes_for_unknown_id_is_not_found() {
        let fx = fixture();
        let err = fx
            .repo
            .listener_changes(&admin(), ListenerId(7))
            .await
            .unwrap_err();
        assert_eq!(err, ListenerError::NotFound(ListenerId(7)));
    }

    #[tokio::test]
    async fn test_delete_racing_create_keeps_listener_inactive() {
        let repo = slow_repo();
        let creating = {
            let repo = repo.clone();
            tokio::spawn(async move {
                repo.create_listener(&admin(), ListenerForm::new("n", "E", "ok"))
                    .await
            })
        };

        // the row exists but create has not reached activation yet
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        repo.delete_listener(&admin(), ListenerId(1)).await.unwrap();

        let result = creating.await.unwrap();
        assert_eq!(result.unwrap_err(), ListenerError::NotFound(ListenerId(1)));
        assert!(!repo.registry().contains(ListenerId(1)));
        assert!(repo.registry().lookup("E").is_empty());
        assert!(repo.locks.is_empty());
    }

    #[tokio::test]
    async fn test_update_racing_create_wins() {
        let repo = slow_repo();
        let creating = {
            let repo = repo.clone();
            tokio::spawn(async move {
                repo.create_listener(&admin(), ListenerForm::new("old", "E", "ok"))
                    .await
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let updated = repo
            .update_listener(&admin(), ListenerId(1), ListenerForm::new("new", "F", "ok"))
            .await
            .unwrap();

        let created = creating.await.unwrap().unwrap();
        assert_eq!(created, updated);

        let snap = repo.registry().snapshot();
        assert!(snap.lookup_ids("E").is_empty());
        assert_eq!(snap.lookup_ids("F"), vec![ListenerId(1)]);
        assert_eq!(&*snap.get(ListenerId(1)).unwrap().name, "new");
    }

    #[tokio::test]
    async fn test_missing_ids_leave_no_lock_entries() {
        let fx = fixture();
        let missing = ListenerId(404);

        for _ in 0..3 {
            let err = fx
                .repo
                .update_listener(&admin(), missing, ListenerForm::new("n", "E", "ok"))
                .await
                .unwrap_err();
            assert_eq!(err, ListenerError::NotFound(missing));
            let err = fx.repo.delete_listener(&admin(), missing).await.unwrap_err();
            assert_eq!(err, ListenerError::NotFound(missing));
        }
        assert!(fx.repo.locks.is_empty());
    }

    #[tokio::test]
    async fn test_delete_clears_execution_stats() {
        use crate::runner::ExecutionRunner;
        use crate::types::ListenerEvent;

        let registry = Arc::new(ListenerRegistry::new());
        let runner = ExecutionRunner::new(registry.clone(), &hearken_config::RunnerConfig::default());
        let repo = ListenerRepository::new(
            Arc::new(MemoryListenerStore::new()),
            Arc::new(MockCompiler::default()),
            registry,
        )
        .with_history(runner.history().clone());

        let def = repo
            .create_listener(&admin(), ListenerForm::new("n", "E", "ok"))
            .await
            .unwrap();
        runner
            .dispatch(ListenerEvent::new("E", serde_json::json!({})))
            .await;
        assert_eq!(runner.history().stats(def.id).unwrap().invocations, 1);

        repo.delete_listener(&admin(), def.id).await.unwrap();
        assert!(runner.history().stats(def.id).is_none());
    }
}
