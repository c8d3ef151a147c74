//! Survey image repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use crate::error::Result;
use crate::models::{ImageId, SurveyImage};
use crate::ProjectId;
use rusqlite::{params, Connection};

/// `SQLite` repository for survey images
pub struct SqliteImageRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteImageRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_image(row: &rusqlite::Row<'_>) -> rusqlite::Result<SurveyImage> {
        let id: String = row.get(0)?;
        let project_id: String = row.get(1)?;
        let record_id: String = row.get(2)?;
        Ok(SurveyImage {
            id: id.parse().unwrap_or_default(),
            project_id: project_id.parse().unwrap_or_default(),
            record_id: record_id.parse().unwrap_or_default(),
            image: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
            sync_at: row.get(6)?,
        })
    }

    /// Insert a new image row
    pub fn insert(&self, image: &SurveyImage) -> Result<()> {
        self.conn.execute(
            "INSERT INTO image (id, project_id, record_id, image, created_at, updated_at, sync_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                image.id.as_str(),
                image.project_id.as_str(),
                image.record_id.as_str(),
                image.image,
                image.created_at,
                image.updated_at,
                image.sync_at,
            ],
        )?;
        Ok(())
    }

    /// Get an image by ID
    pub fn get(&self, id: &ImageId) -> Result<Option<SurveyImage>> {
        let result = self.conn.query_row(
            "SELECT id, project_id, record_id, image, created_at, updated_at, sync_at
             FROM image WHERE id = ?",
            params![id.as_str()],
            Self::parse_image,
        );

        match result {
            Ok(image) => Ok(Some(image)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List a project's dirty images, oldest first, up to `limit`
    pub fn list_dirty(&self, project_id: &ProjectId, limit: Option<usize>) -> Result<Vec<SurveyImage>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, project_id, record_id, image, created_at, updated_at, sync_at
             FROM image
             WHERE project_id = ? AND (sync_at IS NULL OR sync_at < updated_at)
             ORDER BY created_at, id
             LIMIT ?",
        )?;

        let limit = limit.map_or(-1i64, |limit| limit as i64);
        let images = stmt
            .query_map(params![project_id.as_str(), limit], Self::parse_image)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(images)
    }

    /// Count a project's dirty images
    pub fn count_dirty(&self, project_id: &ProjectId) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM image
             WHERE project_id = ? AND (sync_at IS NULL OR sync_at < updated_at)",
            params![project_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Replace an image body, bumping its mutation timestamp
    pub fn update_image(&self, id: &ImageId, image: &str, updated_at: i64) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE image SET image = ?, updated_at = ? WHERE id = ?",
            params![image, updated_at, id.as_str()],
        )?;

        if rows == 0 {
            return Err(crate::Error::NotFound(id.to_string()));
        }

        Ok(())
    }

    /// Mark exactly the given images as synced
    pub fn mark_synced(&self, ids: &[ImageId], sync_at: i64) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare("UPDATE image SET sync_at = ? WHERE id = ?")?;

        for id in ids {
            stmt.execute(params![sync_at, id.as_str()])?;
        }

        Ok(())
    }

    /// Delete an image row
    pub fn delete(&self, id: &ImageId) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM image WHERE id = ?", params![id.as_str()])?;
        Ok(rows > 0)
    }
}
