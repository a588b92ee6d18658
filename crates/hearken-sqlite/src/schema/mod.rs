//! Schema management and migrations

use crate::error::{SqliteError, SqliteResult};
use rusqlite::Connection;
use tracing::{debug, info};

/// Schema version - increment when making schema changes
pub const SCHEMA_VERSION: i32 = 1;

/// Apply all pending migrations
pub fn apply_migrations(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version = current_version(conn)?;
    debug!(current_version, target_version = SCHEMA_VERSION, "Checking migrations");

    if current_version > SCHEMA_VERSION {
        return Err(SqliteError::Schema(format!(
            "database schema v{} is newer than supported v{}",
            current_version, SCHEMA_VERSION
        )));
    }

    if current_version < 1 {
        info!(from = current_version, to = SCHEMA_VERSION, "Applying schema migrations");
        apply_migration_v1(conn)?;
    }

    Ok(())
}

/// Highest applied migration, 0 for a fresh database
pub fn current_version(conn: &Connection) -> SqliteResult<i32> {
    let version: Option<i32> =
        conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })?;
    Ok(version.unwrap_or(0))
}

fn record_migration(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("INSERT INTO schema_migrations (version) VALUES (?1)", [version])?;
    Ok(())
}

fn apply_migration_v1(conn: &Connection) -> SqliteResult<()> {
    debug!("Applying migration v1: listeners and change log");

    conn.execute_batch(SCHEMA_V1)
        .map_err(|e| SqliteError::Schema(format!("Failed to apply v1 schema: {}", e)))?;

    record_migration(conn, 1)?;
    info!("Migration v1 applied successfully");
    Ok(())
}

const SCHEMA_V1: &str = r#"
-- ============================================================================
-- TABLE: listeners
-- ============================================================================
-- One row per listener definition. Rows are never removed: deletion sets
-- `deleted` so ids are not reused and the change log keeps its owner.

CREATE TABLE IF NOT EXISTS listeners (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT,
    selectors TEXT NOT NULL,  -- JSON array of event types
    script_body TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    deleted INTEGER NOT NULL DEFAULT 0,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_by TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_listeners_live ON listeners(deleted, enabled);

-- ============================================================================
-- TABLE: listener_changes
-- ============================================================================
-- Append-only history of accepted bodies

CREATE TABLE IF NOT EXISTS listener_changes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    listener_id INTEGER NOT NULL REFERENCES listeners(id),
    author TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('created', 'updated', 'deleted')),
    comment TEXT,
    script_body TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_listener_changes_listener ON listener_changes(listener_id, id);
"#;
