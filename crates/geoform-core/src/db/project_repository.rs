//! Project and layer repository implementations

use crate::error::Result;
use crate::models::{FieldConfig, LayerStyle, Project, ProjectId, ProjectLayer};
use rusqlite::types::Type;
use rusqlite::{params, Connection};

/// `SQLite` repository for projects
pub struct SqliteProjectRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteProjectRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
        let id: String = row.get(0)?;
        let fields_raw: String = row.get(2)?;
        let fields: Vec<FieldConfig> = serde_json::from_str(&fields_raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

        Ok(Project {
            id: id.parse().unwrap_or_default(),
            name: row.get(1)?,
            fields,
            created_at: row.get(3)?,
            version_id: row.get(4)?,
            sync_at: row.get(5)?,
            participant_quota: row.get(6)?,
            max_distance: row.get(7)?,
        })
    }

    /// Insert a new project row
    pub fn insert(&self, project: &Project) -> Result<()> {
        let fields = serde_json::to_string(&project.fields)?;

        self.conn.execute(
            "INSERT INTO project (id, name, fields, created_at, version_id, sync_at,
                                  participant_quota, max_distance)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                project.id.as_str(),
                project.name,
                fields,
                project.created_at,
                project.version_id,
                project.sync_at,
                project.participant_quota,
                project.max_distance,
            ],
        )?;
        Ok(())
    }

    /// Get a project by ID
    pub fn get(&self, id: &ProjectId) -> Result<Option<Project>> {
        let result = self.conn.query_row(
            "SELECT id, name, fields, created_at, version_id, sync_at,
                    participant_quota, max_distance
             FROM project WHERE id = ?",
            params![id.as_str()],
            Self::parse_project,
        );

        match result {
            Ok(project) => Ok(Some(project)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List all projects, newest first
    pub fn list(&self) -> Result<Vec<Project>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, fields, created_at, version_id, sync_at,
                    participant_quota, max_distance
             FROM project ORDER BY created_at DESC",
        )?;

        let projects = stmt
            .query_map([], Self::parse_project)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(projects)
    }

    /// Write back a merged project row
    pub fn update(&self, project: &Project) -> Result<()> {
        let fields = serde_json::to_string(&project.fields)?;

        let rows = self.conn.execute(
            "UPDATE project
             SET name = ?, fields = ?, version_id = ?, sync_at = ?,
                 participant_quota = ?, max_distance = ?
             WHERE id = ?",
            params![
                project.name,
                fields,
                project.version_id,
                project.sync_at,
                project.participant_quota,
                project.max_distance,
                project.id.as_str(),
            ],
        )?;

        if rows == 0 {
            return Err(crate::Error::NotFound(project.id.to_string()));
        }

        Ok(())
    }

    /// Record a server-confirmed project push: sync stamp + version token
    pub fn mark_synced(&self, id: &ProjectId, sync_at: i64, version_id: &str) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE project SET sync_at = ?, version_id = ? WHERE id = ?",
            params![sync_at, version_id, id.as_str()],
        )?;

        if rows == 0 {
            return Err(crate::Error::NotFound(id.to_string()));
        }

        Ok(())
    }
}

/// `SQLite` repository for project layers
pub struct SqliteLayerRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteLayerRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_layer(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProjectLayer> {
        let id: String = row.get(0)?;
        let project_id: String = row.get(1)?;
        let style_raw: Option<String> = row.get(4)?;
        let layer_style: Option<LayerStyle> = style_raw
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

        Ok(ProjectLayer {
            id: id.parse().unwrap_or_default(),
            project_id: project_id.parse().unwrap_or_default(),
            layer_name: row.get(2)?,
            layer_order: row.get(3)?,
            layer_style,
            created_at: row.get(5)?,
            sync_at: row.get(6)?,
        })
    }

    /// Insert a new layer row
    pub fn insert(&self, layer: &ProjectLayer) -> Result<()> {
        let style = layer
            .layer_style
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn.execute(
            "INSERT INTO project_layer (id, project_id, layer_name, layer_order, layer_style,
                                        created_at, sync_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                layer.id.as_str(),
                layer.project_id.as_str(),
                layer.layer_name,
                layer.layer_order,
                style,
                layer.created_at,
                layer.sync_at,
            ],
        )?;
        Ok(())
    }

    /// List a project's layers in draw order
    pub fn list_by_project(&self, project_id: &ProjectId) -> Result<Vec<ProjectLayer>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, project_id, layer_name, layer_order, layer_style, created_at, sync_at
             FROM project_layer
             WHERE project_id = ?
             ORDER BY layer_order",
        )?;

        let layers = stmt
            .query_map(params![project_id.as_str()], Self::parse_layer)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(layers)
    }

    /// List every layer (backup export)
    pub fn list_all(&self) -> Result<Vec<ProjectLayer>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, project_id, layer_name, layer_order, layer_style, created_at, sync_at
             FROM project_layer ORDER BY created_at",
        )?;

        let layers = stmt
            .query_map([], Self::parse_layer)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{FieldKind, TextRules};
    use pretty_assertions::assert_eq;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn sample_project() -> Project {
        Project::new(
            "Street trees",
            vec![FieldConfig {
                key: "species".to_string(),
                name: "Species".to_string(),
                required: true,
                kind: FieldKind::Text {
                    rules: TextRules::default(),
                },
            }],
        )
    }

    #[test]
    fn insert_and_get_round_trips_fields() {
        let db = setup();
        let repo = SqliteProjectRepository::new(db.connection());

        let project = sample_project();
        repo.insert(&project).unwrap();

        let fetched = repo.get(&project.id).unwrap().unwrap();
        assert_eq!(fetched, project);
    }

    #[test]
    fn mark_synced_sets_version_token() {
        let db = setup();
        let repo = SqliteProjectRepository::new(db.connection());

        let project = sample_project();
        repo.insert(&project).unwrap();

        repo.mark_synced(&project.id, 5000, "v-token").unwrap();

        let fetched = repo.get(&project.id).unwrap().unwrap();
        assert_eq!(fetched.version_id.as_deref(), Some("v-token"));
        assert_eq!(fetched.sync_at, Some(5000));
    }

    #[test]
    fn layers_list_in_draw_order() {
        let db = setup();
        let repo = SqliteLayerRepository::new(db.connection());
        let project_id = ProjectId::new();

        let mut top = ProjectLayer::new(project_id, "top", 2);
        top.layer_style = Some(LayerStyle::Raster { opacity: 0.5 });
        let bottom = ProjectLayer::new(project_id, "bottom", 1);

        repo.insert(&top).unwrap();
        repo.insert(&bottom).unwrap();

        let layers = repo.list_by_project(&project_id).unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].layer_name, "bottom");
        assert_eq!(layers[1], top);
    }
}
