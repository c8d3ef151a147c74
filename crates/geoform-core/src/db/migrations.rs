//! Database migrations
//!
//! Schema evolution is version-numbered and purely additive: new versions
//! may add tables or default-filled columns, never rewrite existing rows.

use crate::error::Result;
use rusqlite::Connection;

/// Current schema version
pub const CURRENT_VERSION: i32 = 3;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }
    if version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

/// Get the current schema version
pub fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get::<_, i32>(0).map(|flag| flag != 0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

fn apply(conn: &Connection, statements: &[&str]) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", [])?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, []) {
            conn.execute("ROLLBACK", []).ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", []) {
        conn.execute("ROLLBACK", []).ok();
        return Err(e.into());
    }

    Ok(())
}

/// Migration to version 1: Initial schema
fn migrate_v1(conn: &Connection) -> Result<()> {
    apply(
        conn,
        &[
            // Schema version tracking
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            // Projects
            "CREATE TABLE IF NOT EXISTS project (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                fields TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                version_id TEXT,
                sync_at INTEGER,
                participant_quota INTEGER,
                max_distance REAL
            )",
            // Map layers
            "CREATE TABLE IF NOT EXISTS project_layer (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                layer_name TEXT NOT NULL,
                layer_order INTEGER NOT NULL,
                layer_style TEXT,
                created_at INTEGER NOT NULL,
                sync_at INTEGER
            )",
            "CREATE INDEX IF NOT EXISTS idx_project_layer_project ON project_layer(project_id)",
            // Survey records; payload is the serialized survey document
            "CREATE TABLE IF NOT EXISTS record (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                sync_at INTEGER,
                tags TEXT,
                participant_location TEXT,
                version INTEGER
            )",
            "CREATE INDEX IF NOT EXISTS idx_record_project ON record(project_id)",
            "CREATE INDEX IF NOT EXISTS idx_record_sync ON record(sync_at)",
            // Survey images
            "CREATE TABLE IF NOT EXISTS image (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                record_id TEXT NOT NULL,
                image TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                sync_at INTEGER
            )",
            "CREATE INDEX IF NOT EXISTS idx_image_project ON image(project_id)",
            // Pending-change ledger; one live entry per record
            "CREATE TABLE IF NOT EXISTS change_log (
                id TEXT PRIMARY KEY,
                table_name TEXT NOT NULL,
                project_id TEXT NOT NULL,
                data_id TEXT NOT NULL UNIQUE,
                change_type TEXT NOT NULL,
                version INTEGER,
                updated_at INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_change_log_project ON change_log(project_id)",
            // App config (local only)
            "CREATE TABLE IF NOT EXISTS app_config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            // Record migration version
            "INSERT INTO schema_version (version) VALUES (1)",
        ],
    )?;

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: image mutation timestamps for dirty tracking
fn migrate_v2(conn: &Connection) -> Result<()> {
    apply(
        conn,
        &[
            "ALTER TABLE image ADD COLUMN updated_at INTEGER NOT NULL DEFAULT 0",
            "CREATE INDEX IF NOT EXISTS idx_image_updated ON image(updated_at)",
            "INSERT INTO schema_version (version) VALUES (2)",
        ],
    )?;

    tracing::info!("Migrated database to version 2");
    Ok(())
}

/// Migration to version 3: remembered backup destination
fn migrate_v3(conn: &Connection) -> Result<()> {
    apply(
        conn,
        &[
            "CREATE TABLE IF NOT EXISTS backup_handle (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                path TEXT NOT NULL,
                saved_at INTEGER NOT NULL
            )",
            "INSERT INTO schema_version (version) VALUES (3)",
        ],
    )?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_migrations() {
        let conn = setup();
        run(&conn).unwrap();

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = setup();
        run(&conn).unwrap();
        run(&conn).unwrap(); // Should not fail

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn migration_v2_adds_image_updated_at_with_default() {
        let conn = setup();
        migrate_v1(&conn).unwrap();

        conn.execute(
            "INSERT INTO image (id, project_id, record_id, image, created_at, sync_at)
             VALUES ('i1', 'p1', 'r1', 'data:', 100, NULL)",
            [],
        )
        .unwrap();

        migrate_v2(&conn).unwrap();

        let updated_at: i64 = conn
            .query_row("SELECT updated_at FROM image WHERE id = 'i1'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(updated_at, 0);
    }

    #[test]
    fn migration_v3_creates_backup_handle_table() {
        let conn = setup();
        run(&conn).unwrap();

        let exists: i32 = conn
            .query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM sqlite_master
                    WHERE type = 'table' AND name = 'backup_handle'
                )",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(exists, 1);
    }

    #[test]
    fn change_log_enforces_single_entry_per_record() {
        let conn = setup();
        run(&conn).unwrap();

        conn.execute(
            "INSERT INTO change_log (id, table_name, project_id, data_id, change_type, updated_at)
             VALUES ('c1', 'record', 'p1', 'r1', 'insert', 100)",
            [],
        )
        .unwrap();

        let duplicate = conn.execute(
            "INSERT INTO change_log (id, table_name, project_id, data_id, change_type, updated_at)
             VALUES ('c2', 'record', 'p1', 'r1', 'update', 200)",
            [],
        );
        assert!(duplicate.is_err());
    }
}
