//! Pending-change ledger repository implementation

use crate::error::Result;
use crate::models::{ChangeEntry, ChangeId, ChangeType, RecordId};
use crate::ProjectId;
use rusqlite::{params, Connection};

/// `SQLite` repository for the pending-change ledger
pub struct SqliteChangeRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteChangeRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChangeEntry> {
        let id: String = row.get(0)?;
        let project_id: String = row.get(2)?;
        let data_id: String = row.get(3)?;
        let change_type: String = row.get(4)?;
        Ok(ChangeEntry {
            id: id.parse().unwrap_or_default(),
            table: row.get(1)?,
            project_id: project_id.parse().unwrap_or_default(),
            data_id: data_id.parse().unwrap_or_default(),
            change_type: change_type.parse().unwrap_or(ChangeType::Update),
            version: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    /// Insert a fresh ledger entry; fails if one exists for the same record
    pub fn insert(&self, entry: &ChangeEntry) -> Result<()> {
        self.conn.execute(
            "INSERT INTO change_log (id, table_name, project_id, data_id, change_type,
                                     version, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                entry.id.as_str(),
                entry.table,
                entry.project_id.as_str(),
                entry.data_id.as_str(),
                entry.change_type.as_str(),
                entry.version,
                entry.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Overwrite an existing entry in place, preserving its id
    pub fn update(&self, entry: &ChangeEntry) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE change_log SET change_type = ?, version = ?, updated_at = ? WHERE id = ?",
            params![
                entry.change_type.as_str(),
                entry.version,
                entry.updated_at,
                entry.id.as_str(),
            ],
        )?;

        if rows == 0 {
            return Err(crate::Error::NotFound(entry.id.to_string()));
        }

        Ok(())
    }

    /// Get the live entry for a record, if any
    pub fn get_by_data_id(&self, data_id: &RecordId) -> Result<Option<ChangeEntry>> {
        let result = self.conn.query_row(
            "SELECT id, table_name, project_id, data_id, change_type, version, updated_at
             FROM change_log WHERE data_id = ?",
            params![data_id.as_str()],
            Self::parse_entry,
        );

        match result {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List a project's pending inserts/updates, oldest first
    pub fn list_pending_upserts(&self, project_id: &ProjectId) -> Result<Vec<ChangeEntry>> {
        self.list_filtered(project_id, "AND change_type != 'delete'")
    }

    /// List a project's pending delete markers, oldest first
    pub fn list_pending_deletes(&self, project_id: &ProjectId) -> Result<Vec<ChangeEntry>> {
        self.list_filtered(project_id, "AND change_type = 'delete'")
    }

    fn list_filtered(&self, project_id: &ProjectId, clause: &str) -> Result<Vec<ChangeEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, table_name, project_id, data_id, change_type, version, updated_at
             FROM change_log
             WHERE project_id = ? {clause}
             ORDER BY updated_at, id"
        ))?;

        let entries = stmt
            .query_map(params![project_id.as_str()], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    /// Count a project's pending inserts/updates
    pub fn count_pending_upserts(&self, project_id: &ProjectId) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM change_log
             WHERE project_id = ? AND change_type != 'delete'",
            params![project_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Delete one entry by id
    pub fn delete_by_id(&self, id: &ChangeId) -> Result<()> {
        self.conn
            .execute("DELETE FROM change_log WHERE id = ?", params![id.as_str()])?;
        Ok(())
    }

    /// Delete exactly the given entries
    pub fn delete_many(&self, ids: &[ChangeId]) -> Result<()> {
        let mut stmt = self.conn.prepare("DELETE FROM change_log WHERE id = ?")?;
        for id in ids {
            stmt.execute(params![id.as_str()])?;
        }
        Ok(())
    }

    /// List every ledger entry (backup export)
    pub fn list_all(&self) -> Result<Vec<ChangeEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, table_name, project_id, data_id, change_type, version, updated_at
             FROM change_log ORDER BY updated_at",
        )?;

        let entries = stmt
            .query_map([], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }
}
