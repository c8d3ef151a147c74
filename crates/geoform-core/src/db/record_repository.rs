//! Survey record repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use crate::error::Result;
use crate::models::{LngLat, Payload, Record, RecordId};
use crate::ProjectId;
use rusqlite::types::Type;
use rusqlite::{params, Connection};
use uuid::Uuid;

/// Pagination and filtering options for project-scoped record listings
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    /// Maximum rows to return; unlimited when `None`
    pub limit: Option<usize>,
    /// Rows to skip
    pub offset: usize,
    /// Case-insensitive keyword matched against the parsed payload values
    pub keyword: Option<String>,
}

/// Trait for record storage operations
pub trait RecordRepository {
    /// Insert a new record row
    fn insert(&self, record: &Record) -> Result<()>;

    /// Get a record by ID
    fn get(&self, id: &RecordId) -> Result<Option<Record>>;

    /// Get several records by ID; missing ids are silently skipped
    fn get_many(&self, ids: &[RecordId]) -> Result<Vec<Record>>;

    /// List a project's records, oldest first
    fn list_by_project(&self, project_id: &ProjectId, query: &RecordQuery) -> Result<Vec<Record>>;

    /// Count a project's records
    fn count_by_project(&self, project_id: &ProjectId) -> Result<usize>;

    /// Write back a merged record row
    fn update(&self, record: &Record) -> Result<()>;

    /// Delete a record row; returns whether a row existed
    fn delete(&self, id: &RecordId) -> Result<bool>;

    /// Reconcile server-confirmed rows: set `sync_at` and the
    /// server-assigned version for each `(id, version)` pair
    fn apply_sync_results(&self, results: &[(Uuid, i64)], sync_at: i64) -> Result<()>;
}

/// `SQLite` implementation of `RecordRepository`
pub struct SqliteRecordRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteRecordRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a record from a database row
    fn parse_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
        let id: String = row.get(0)?;
        let project_id: String = row.get(1)?;
        let payload_raw: String = row.get(2)?;
        let tags_raw: Option<String> = row.get(6)?;
        let location_raw: Option<String> = row.get(7)?;

        let payload: Payload = serde_json::from_str(&payload_raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
        let tags: Option<Vec<Uuid>> = tags_raw
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;
        let participant_location: Option<LngLat> = location_raw
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

        Ok(Record {
            id: id.parse().unwrap_or_default(),
            project_id: project_id.parse().unwrap_or_default(),
            payload,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
            sync_at: row.get(5)?,
            tags,
            participant_location,
            version: row.get(8)?,
        })
    }

    fn row_params(record: &Record) -> Result<(String, Option<String>, Option<String>)> {
        let payload = serde_json::to_string(&record.payload)?;
        let tags = record
            .tags
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let location = record
            .participant_location
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        Ok((payload, tags, location))
    }

    /// Match the keyword against any value in the parsed payload
    fn matches_keyword(record: &Record, keyword: &str) -> bool {
        let needle = keyword.to_lowercase();
        record
            .payload
            .data
            .values()
            .any(|value| match value {
                serde_json::Value::String(text) => text.to_lowercase().contains(&needle),
                other => other.to_string().to_lowercase().contains(&needle),
            })
    }
}

const SELECT_COLUMNS: &str = "id, project_id, payload, created_at, updated_at, sync_at, \
                              tags, participant_location, version";

impl RecordRepository for SqliteRecordRepository<'_> {
    fn insert(&self, record: &Record) -> Result<()> {
        let (payload, tags, location) = Self::row_params(record)?;

        self.conn.execute(
            "INSERT INTO record (id, project_id, payload, created_at, updated_at, sync_at,
                                 tags, participant_location, version)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.id.as_str(),
                record.project_id.as_str(),
                payload,
                record.created_at,
                record.updated_at,
                record.sync_at,
                tags,
                location,
                record.version,
            ],
        )?;

        Ok(())
    }

    fn get(&self, id: &RecordId) -> Result<Option<Record>> {
        let result = self.conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM record WHERE id = ?"),
            params![id.as_str()],
            Self::parse_record,
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn get_many(&self, ids: &[RecordId]) -> Result<Vec<Record>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM record WHERE id IN ({placeholders}) ORDER BY created_at, id"
        ))?;

        let records = stmt
            .query_map(
                rusqlite::params_from_iter(ids.iter().map(RecordId::as_str)),
                Self::parse_record,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    fn list_by_project(&self, project_id: &ProjectId, query: &RecordQuery) -> Result<Vec<Record>> {
        if let Some(keyword) = query.keyword.as_deref() {
            // Keyword filtering runs over the parsed payload, so paging is
            // applied after the filter.
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM record WHERE project_id = ? ORDER BY created_at, id"
            ))?;
            let records = stmt
                .query_map(params![project_id.as_str()], Self::parse_record)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let filtered = records
                .into_iter()
                .filter(|record| Self::matches_keyword(record, keyword))
                .skip(query.offset)
                .take(query.limit.unwrap_or(usize::MAX))
                .collect();
            return Ok(filtered);
        }

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM record
             WHERE project_id = ?
             ORDER BY created_at, id
             LIMIT ? OFFSET ?"
        ))?;

        let limit = query.limit.map_or(-1i64, |limit| limit as i64);
        let records = stmt
            .query_map(
                params![project_id.as_str(), limit, query.offset as i64],
                Self::parse_record,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    fn count_by_project(&self, project_id: &ProjectId) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM record WHERE project_id = ?",
            params![project_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn update(&self, record: &Record) -> Result<()> {
        let (payload, tags, location) = Self::row_params(record)?;

        let rows = self.conn.execute(
            "UPDATE record
             SET payload = ?, updated_at = ?, sync_at = ?, tags = ?,
                 participant_location = ?, version = ?
             WHERE id = ?",
            params![
                payload,
                record.updated_at,
                record.sync_at,
                tags,
                location,
                record.version,
                record.id.as_str(),
            ],
        )?;

        if rows == 0 {
            return Err(crate::Error::NotFound(record.id.to_string()));
        }

        Ok(())
    }

    fn delete(&self, id: &RecordId) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM record WHERE id = ?", params![id.as_str()])?;
        Ok(rows > 0)
    }

    fn apply_sync_results(&self, results: &[(Uuid, i64)], sync_at: i64) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare("UPDATE record SET sync_at = ?, version = ? WHERE id = ?")?;

        for (id, version) in results {
            stmt.execute(params![sync_at, version, id.to_string()])?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use serde_json::{json, Map};

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn payload_with(key: &str, value: serde_json::Value) -> Payload {
        let mut data = Map::new();
        data.insert(key.to_string(), value);
        Payload::new(json!({"type": "Point", "coordinates": [0.0, 0.0]}), data)
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup();
        let repo = SqliteRecordRepository::new(db.connection());

        let record = Record::new(ProjectId::new(), payload_with("species", json!("oak")));
        repo.insert(&record).unwrap();

        let fetched = repo.get(&record.id).unwrap().unwrap();
        assert_eq!(fetched, record);
    }

    #[test]
    fn get_many_skips_missing_ids() {
        let db = setup();
        let repo = SqliteRecordRepository::new(db.connection());

        let project_id = ProjectId::new();
        let record = Record::new(project_id, payload_with("species", json!("elm")));
        repo.insert(&record).unwrap();

        let fetched = repo.get_many(&[record.id, RecordId::new()]).unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, record.id);
    }

    #[test]
    fn list_by_project_pages_in_insert_order() {
        let db = setup();
        let repo = SqliteRecordRepository::new(db.connection());
        let project_id = ProjectId::new();

        for index in 0..5 {
            let mut record = Record::new(project_id, payload_with("n", json!(index)));
            record.created_at = 1000 + index;
            record.updated_at = record.created_at;
            repo.insert(&record).unwrap();
        }

        let page = repo
            .list_by_project(
                &project_id,
                &RecordQuery {
                    limit: Some(2),
                    offset: 2,
                    keyword: None,
                },
            )
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].payload.data["n"], json!(2));
        assert_eq!(page[1].payload.data["n"], json!(3));
    }

    #[test]
    fn list_by_project_filters_by_keyword_over_parsed_payload() {
        let db = setup();
        let repo = SqliteRecordRepository::new(db.connection());
        let project_id = ProjectId::new();

        repo.insert(&Record::new(
            project_id,
            payload_with("species", json!("Red Oak")),
        ))
        .unwrap();
        repo.insert(&Record::new(
            project_id,
            payload_with("species", json!("Elm")),
        ))
        .unwrap();

        let matched = repo
            .list_by_project(
                &project_id,
                &RecordQuery {
                    keyword: Some("oak".to_string()),
                    ..RecordQuery::default()
                },
            )
            .unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].payload.data["species"], json!("Red Oak"));
    }

    #[test]
    fn update_replaces_payload_and_stamps() {
        let db = setup();
        let repo = SqliteRecordRepository::new(db.connection());

        let mut record = Record::new(ProjectId::new(), payload_with("species", json!("oak")));
        repo.insert(&record).unwrap();

        record.payload = payload_with("species", json!("elm"));
        record.updated_at += 10;
        repo.update(&record).unwrap();

        let fetched = repo.get(&record.id).unwrap().unwrap();
        assert_eq!(fetched.payload.data["species"], json!("elm"));
        assert_eq!(fetched.updated_at, record.updated_at);
    }

    #[test]
    fn update_missing_record_is_not_found() {
        let db = setup();
        let repo = SqliteRecordRepository::new(db.connection());

        let record = Record::new(ProjectId::new(), payload_with("species", json!("oak")));
        let error = repo.update(&record).unwrap_err();
        assert!(matches!(error, crate::Error::NotFound(_)));
    }

    #[test]
    fn apply_sync_results_sets_version_and_sync_at() {
        let db = setup();
        let repo = SqliteRecordRepository::new(db.connection());

        let record = Record::new(ProjectId::new(), payload_with("species", json!("oak")));
        repo.insert(&record).unwrap();

        let sync_at = record.updated_at + 5;
        repo.apply_sync_results(&[(record.id.as_uuid(), 7)], sync_at)
            .unwrap();

        let fetched = repo.get(&record.id).unwrap().unwrap();
        assert_eq!(fetched.version, Some(7));
        assert_eq!(fetched.sync_at, Some(sync_at));
        assert!(!fetched.is_dirty());
    }

    #[test]
    fn delete_reports_existence() {
        let db = setup();
        let repo = SqliteRecordRepository::new(db.connection());

        let record = Record::new(ProjectId::new(), payload_with("species", json!("oak")));
        repo.insert(&record).unwrap();

        assert!(repo.delete(&record.id).unwrap());
        assert!(!repo.delete(&record.id).unwrap());
        assert!(repo.get(&record.id).unwrap().is_none());
    }
}
