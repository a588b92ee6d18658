//! ListenerStore implementation on SQLite
//!
//! rusqlite is synchronous, so every trait method moves its query onto the
//! blocking pool with `spawn_blocking` and the shared [`SqlitePool`].

use crate::config::SqliteConfig;
use crate::connection::SqlitePool;
use crate::error::{SqliteError, SqliteResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hearken_core::{
    ChangeKind, ListenerChange, ListenerDefinition, ListenerId, ListenerStore, NewListener,
    StorageError, StorageResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

const LISTENER_COLUMNS: &str = "id, name, description, selectors, script_body, enabled, \
     created_by, created_at, updated_by, updated_at";

const CHANGE_COLUMNS: &str = "listener_id, author, kind, comment, script_body, recorded_at";

/// SQLite-backed [`ListenerStore`] with soft delete.
#[derive(Debug, Clone)]
pub struct SqliteListenerStore {
    pool: SqlitePool,
}

impl SqliteListenerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the database described by `config`
    pub fn open(config: SqliteConfig) -> SqliteResult<Self> {
        Ok(Self::new(SqlitePool::new(config)?))
    }

    /// In-memory store for tests
    pub fn memory() -> SqliteResult<Self> {
        Ok(Self::new(SqlitePool::memory()?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> SqliteResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || pool.with_connection(f))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .map_err(Into::into)
    }
}

#[async_trait]
impl ListenerStore for SqliteListenerStore {
    async fn create(&self, listener: NewListener) -> StorageResult<ListenerDefinition> {
        let selectors = encode_selectors(&listener.selectors)?;
        self.run(move |conn| {
            let created_at = listener.created_at.to_rfc3339();
            conn.execute(
                "INSERT INTO listeners (name, description, selectors, script_body, enabled,
                                        created_by, created_at, updated_by, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?6, ?7)",
                params![
                    listener.name,
                    listener.description,
                    selectors,
                    listener.script_body,
                    listener.enabled,
                    listener.created_by,
                    created_at,
                ],
            )?;
            let id = ListenerId(conn.last_insert_rowid());
            debug!(listener_id = %id, "Inserted listener row");
            Ok(listener.into_definition(id))
        })
        .await
    }

    async fn get(&self, id: ListenerId) -> StorageResult<Option<ListenerDefinition>> {
        self.run(move |conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM listeners WHERE id = ?1 AND deleted = 0",
                        LISTENER_COLUMNS
                    ),
                    [id.get()],
                    ListenerRow::from_row,
                )
                .optional()?;
            row.map(ListenerRow::into_definition).transpose()
        })
        .await
    }

    async fn list(&self, include_disabled: bool) -> StorageResult<Vec<ListenerDefinition>> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM listeners
                 WHERE deleted = 0 AND (?1 OR enabled = 1)
                 ORDER BY id",
                LISTENER_COLUMNS
            ))?;
            let rows = stmt
                .query_map([include_disabled], ListenerRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(ListenerRow::into_definition).collect()
        })
        .await
    }

    async fn update(&self, listener: ListenerDefinition) -> StorageResult<bool> {
        let selectors = encode_selectors(&listener.selectors)?;
        self.run(move |conn| {
            let changed = conn.execute(
                "UPDATE listeners
                 SET name = ?2, description = ?3, selectors = ?4, script_body = ?5,
                     enabled = ?6, updated_by = ?7, updated_at = ?8
                 WHERE id = ?1 AND deleted = 0",
                params![
                    listener.id.get(),
                    listener.name,
                    listener.description,
                    selectors,
                    listener.script_body,
                    listener.enabled,
                    listener.updated_by,
                    listener.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn delete(&self, id: ListenerId) -> StorageResult<bool> {
        self.run(move |conn| {
            let changed = conn.execute(
                "UPDATE listeners SET deleted = 1, updated_at = ?2
                 WHERE id = ?1 AND deleted = 0",
                params![id.get(), Utc::now().to_rfc3339()],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn record_change(&self, change: ListenerChange) -> StorageResult<()> {
        self.run(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO listener_changes ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    CHANGE_COLUMNS
                ),
                params![
                    change.listener_id.get(),
                    change.author,
                    change.kind.as_str(),
                    change.comment,
                    change.script_body,
                    change.recorded_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn changes(&self, id: ListenerId) -> StorageResult<Vec<ListenerChange>> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM listener_changes WHERE listener_id = ?1 ORDER BY id",
                CHANGE_COLUMNS
            ))?;
            let rows = stmt
                .query_map([id.get()], ChangeRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(ChangeRow::into_change).collect()
        })
        .await
    }
}

/// Raw `listeners` row before decoding JSON and timestamps
struct ListenerRow {
    id: i64,
    name: String,
    description: Option<String>,
    selectors: String,
    script_body: String,
    enabled: bool,
    created_by: String,
    created_at: String,
    updated_by: String,
    updated_at: String,
}

impl ListenerRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            selectors: row.get(3)?,
            script_body: row.get(4)?,
            enabled: row.get(5)?,
            created_by: row.get(6)?,
            created_at: row.get(7)?,
            updated_by: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_definition(self) -> SqliteResult<ListenerDefinition> {
        let selectors: Vec<String> = serde_json::from_str(&self.selectors).map_err(|e| {
            SqliteError::Corrupted(format!("listener {} selectors: {}", self.id, e))
        })?;
        Ok(ListenerDefinition {
            id: ListenerId(self.id),
            name: self.name,
            description: self.description,
            selectors,
            script_body: self.script_body,
            enabled: self.enabled,
            created_by: self.created_by,
            created_at: parse_timestamp(&self.created_at)?,
            updated_by: self.updated_by,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

struct ChangeRow {
    listener_id: i64,
    author: String,
    kind: String,
    comment: Option<String>,
    script_body: String,
    recorded_at: String,
}

impl ChangeRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            listener_id: row.get(0)?,
            author: row.get(1)?,
            kind: row.get(2)?,
            comment: row.get(3)?,
            script_body: row.get(4)?,
            recorded_at: row.get(5)?,
        })
    }

    fn into_change(self) -> SqliteResult<ListenerChange> {
        let kind = ChangeKind::parse(&self.kind)
            .ok_or_else(|| SqliteError::Corrupted(format!("unknown change kind '{}'", self.kind)))?;
        Ok(ListenerChange {
            listener_id: ListenerId(self.listener_id),
            author: self.author,
            kind,
            comment: self.comment,
            script_body: self.script_body,
            recorded_at: parse_timestamp(&self.recorded_at)?,
        })
    }
}

fn encode_selectors(selectors: &[String]) -> StorageResult<String> {
    serde_json::to_string(selectors).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn parse_timestamp(raw: &str) -> SqliteResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SqliteError::Corrupted(format!("timestamp '{}': {}", raw, e)))
}
