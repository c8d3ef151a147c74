//! Shared data service wrapper used across clients.
//!
//! Owns the explicitly-opened [`Database`] behind a mutex so async
//! callers (sync drains, feeds, CLI commands) can share one store.
//! Every record mutation goes through here, which is what lets the
//! change tracker run in the same transaction as the row write.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{watch, Mutex, MutexGuard};
use uuid::Uuid;

use crate::changes::{self, MutationEvent};
use crate::db::{
    ConfigRepository, Database, RecordQuery, RecordRepository, SqliteBackupHandleRepository,
    SqliteChangeRepository, SqliteConfigRepository, SqliteImageRepository, SqliteLayerRepository,
    SqliteProjectRepository, SqliteRecordRepository,
};
use crate::error::{Error, Result};
use crate::models::{
    has_multi_level_nesting, AppConfig, ChangeEntry, ChangeId, FieldConfig, FieldKind, ImageId,
    Payload, Project, ProjectId, ProjectLayer, Record, RecordId, SurveyImage,
};
use crate::util::now_ms;

/// Thread-safe service over the local store.
#[derive(Clone)]
pub struct DataService {
    db: Arc<Mutex<Database>>,
    revision: Arc<watch::Sender<u64>>,
}

impl DataService {
    /// Open a data service over a database file at the given path.
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::wrap(Database::open(db_path.into())?))
    }

    /// Open an in-memory data service (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::wrap(Database::open_in_memory()?))
    }

    fn wrap(db: Database) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            db: Arc::new(Mutex::new(db)),
            revision: Arc::new(revision),
        }
    }

    pub(crate) async fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().await
    }

    pub(crate) fn notify(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    // ------------------------------------------------------------------
    // Projects and layers
    // ------------------------------------------------------------------

    /// Create a new local project.
    ///
    /// Rejects field definitions with more than one level of nesting.
    pub async fn create_project(
        &self,
        name: impl Into<String>,
        fields: Vec<FieldConfig>,
    ) -> Result<Project> {
        for field in &fields {
            if let FieldKind::Nested { fields: children, .. } = &field.kind {
                if has_multi_level_nesting(children) {
                    return Err(Error::InvalidInput(format!(
                        "field '{}' nests another nested field",
                        field.key
                    )));
                }
            }
        }

        let project = Project::new(name, fields);
        let db = self.db().await;
        SqliteProjectRepository::new(db.connection()).insert(&project)?;
        Ok(project)
    }

    /// Fetch a project by id.
    pub async fn get_project(&self, id: &ProjectId) -> Result<Option<Project>> {
        let db = self.db().await;
        SqliteProjectRepository::new(db.connection()).get(id)
    }

    /// List all projects, newest first.
    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        let db = self.db().await;
        SqliteProjectRepository::new(db.connection()).list()
    }

    /// Record a server-confirmed project push.
    pub async fn mark_project_synced(
        &self,
        id: &ProjectId,
        sync_at: i64,
        version_id: &str,
    ) -> Result<()> {
        let db = self.db().await;
        SqliteProjectRepository::new(db.connection()).mark_synced(id, sync_at, version_id)
    }

    /// Attach a layer to a project.
    pub async fn add_layer(&self, layer: &ProjectLayer) -> Result<()> {
        let db = self.db().await;
        SqliteLayerRepository::new(db.connection()).insert(layer)
    }

    /// List a project's layers in draw order.
    pub async fn list_layers(&self, project_id: &ProjectId) -> Result<Vec<ProjectLayer>> {
        let db = self.db().await;
        SqliteLayerRepository::new(db.connection()).list_by_project(project_id)
    }

    // ------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------

    /// Capture a new record for a project.
    pub async fn add_record(&self, project_id: ProjectId, payload: Payload) -> Result<Record> {
        self.insert_record(Record::new(project_id, payload)).await
    }

    /// Insert a fully-stamped record row (cloud pulls, imports, tests).
    ///
    /// The change tracker sees the row's own stamps, so server-originated
    /// rows are not re-tracked.
    pub async fn insert_record(&self, record: Record) -> Result<Record> {
        {
            let db = self.db().await;
            let tx = db.connection().unchecked_transaction()?;
            SqliteRecordRepository::new(&tx).insert(&record)?;
            changes::track(&tx, &MutationEvent::insert(&record))?;
            tx.commit()?;
        }
        self.notify();
        Ok(record)
    }

    /// Replace a record's payload, tracking the change.
    pub async fn update_record(&self, id: &RecordId, payload: Payload) -> Result<Record> {
        let updated = {
            let db = self.db().await;
            let existing = SqliteRecordRepository::new(db.connection())
                .get(id)?
                .ok_or_else(|| Error::NotFound(id.to_string()))?;

            let diverged = payload != existing.payload;
            let mut updated = existing.clone();
            updated.payload = payload;
            updated.updated_at = now_ms();

            let tx = db.connection().unchecked_transaction()?;
            SqliteRecordRepository::new(&tx).update(&updated)?;
            changes::track(&tx, &MutationEvent::update(&existing, diverged))?;
            tx.commit()?;
            updated
        };
        self.notify();
        Ok(updated)
    }

    /// Delete a record, tracking the change. Returns whether a row
    /// existed.
    pub async fn delete_record(&self, id: &RecordId) -> Result<bool> {
        let deleted = {
            let db = self.db().await;
            let Some(existing) = SqliteRecordRepository::new(db.connection()).get(id)? else {
                return Ok(false);
            };

            let tx = db.connection().unchecked_transaction()?;
            SqliteRecordRepository::new(&tx).delete(id)?;
            changes::track(&tx, &MutationEvent::delete(&existing))?;
            tx.commit()?;
            true
        };
        self.notify();
        Ok(deleted)
    }

    /// Fetch a record by id.
    pub async fn get_record(&self, id: &RecordId) -> Result<Option<Record>> {
        let db = self.db().await;
        SqliteRecordRepository::new(db.connection()).get(id)
    }

    /// Fetch several records by id; missing ids are skipped.
    pub async fn get_records(&self, ids: &[RecordId]) -> Result<Vec<Record>> {
        let db = self.db().await;
        SqliteRecordRepository::new(db.connection()).get_many(ids)
    }

    /// List a project's records with paging and keyword filtering.
    pub async fn list_records(
        &self,
        project_id: &ProjectId,
        query: &RecordQuery,
    ) -> Result<Vec<Record>> {
        let db = self.db().await;
        SqliteRecordRepository::new(db.connection()).list_by_project(project_id, query)
    }

    /// Reconcile server-confirmed rows in one transaction.
    pub async fn apply_sync_results(&self, results: &[(Uuid, i64)], sync_at: i64) -> Result<()> {
        {
            let db = self.db().await;
            let tx = db.connection().unchecked_transaction()?;
            SqliteRecordRepository::new(&tx).apply_sync_results(results, sync_at)?;
            tx.commit()?;
        }
        self.notify();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Images
    // ------------------------------------------------------------------

    /// Capture a new image for a record.
    pub async fn add_image(
        &self,
        project_id: ProjectId,
        record_id: RecordId,
        image: impl Into<String>,
    ) -> Result<SurveyImage> {
        let image = SurveyImage::new(project_id, record_id, image);
        self.insert_image(image.clone()).await?;
        Ok(image)
    }

    /// Insert a fully-stamped image row (imports, tests).
    pub async fn insert_image(&self, image: SurveyImage) -> Result<()> {
        let db = self.db().await;
        SqliteImageRepository::new(db.connection()).insert(&image)
    }

    /// Replace an image body, making it dirty again.
    pub async fn update_image(&self, id: &ImageId, image: &str) -> Result<()> {
        let db = self.db().await;
        SqliteImageRepository::new(db.connection()).update_image(id, image, now_ms())
    }

    /// Count a project's dirty images.
    pub async fn count_dirty_images(&self, project_id: &ProjectId) -> Result<usize> {
        let db = self.db().await;
        SqliteImageRepository::new(db.connection()).count_dirty(project_id)
    }

    /// Select up to `limit` of a project's dirty images, oldest first.
    pub async fn dirty_images(
        &self,
        project_id: &ProjectId,
        limit: Option<usize>,
    ) -> Result<Vec<SurveyImage>> {
        let db = self.db().await;
        SqliteImageRepository::new(db.connection()).list_dirty(project_id, limit)
    }

    /// Mark exactly the given images as synced, in one transaction.
    pub async fn mark_images_synced(&self, ids: &[ImageId], sync_at: i64) -> Result<()> {
        let db = self.db().await;
        let tx = db.connection().unchecked_transaction()?;
        SqliteImageRepository::new(&tx).mark_synced(ids, sync_at)?;
        tx.commit()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Pending-change ledger
    // ------------------------------------------------------------------

    /// List a project's pending inserts/updates, oldest first.
    pub async fn pending_upserts(&self, project_id: &ProjectId) -> Result<Vec<ChangeEntry>> {
        let db = self.db().await;
        SqliteChangeRepository::new(db.connection()).list_pending_upserts(project_id)
    }

    /// List a project's pending delete markers, oldest first.
    pub async fn pending_deletes(&self, project_id: &ProjectId) -> Result<Vec<ChangeEntry>> {
        let db = self.db().await;
        SqliteChangeRepository::new(db.connection()).list_pending_deletes(project_id)
    }

    /// Count a project's pending inserts/updates.
    pub async fn count_pending_upserts(&self, project_id: &ProjectId) -> Result<usize> {
        let db = self.db().await;
        SqliteChangeRepository::new(db.connection()).count_pending_upserts(project_id)
    }

    /// The live ledger entry for a record, if any.
    pub async fn change_for_record(&self, data_id: &RecordId) -> Result<Option<ChangeEntry>> {
        let db = self.db().await;
        SqliteChangeRepository::new(db.connection()).get_by_data_id(data_id)
    }

    /// Remove exactly the given ledger entries, in one transaction.
    pub async fn delete_change_entries(&self, ids: &[ChangeId]) -> Result<()> {
        let db = self.db().await;
        let tx = db.connection().unchecked_transaction()?;
        SqliteChangeRepository::new(&tx).delete_many(ids)?;
        tx.commit()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // App config
    // ------------------------------------------------------------------

    /// Load app config.
    pub async fn load_config(&self) -> Result<AppConfig> {
        let db = self.db().await;
        SqliteConfigRepository::new(db.connection()).load()
    }

    /// Save app config.
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        let db = self.db().await;
        SqliteConfigRepository::new(db.connection()).save(config)
    }

    /// The remembered backup destination, if any.
    pub async fn backup_handle(&self) -> Result<Option<crate::db::BackupHandle>> {
        let db = self.db().await;
        SqliteBackupHandleRepository::new(db.connection()).get()
    }

    /// Remember a backup destination for future backups.
    pub async fn remember_backup_handle(&self, path: &std::path::Path) -> Result<()> {
        let db = self.db().await;
        SqliteBackupHandleRepository::new(db.connection()).set(path, now_ms())
    }

    // ------------------------------------------------------------------
    // Feeds
    // ------------------------------------------------------------------

    /// Subscribe to a project's records.
    ///
    /// The feed re-reads the store on every notification, so it carries
    /// the store's read-after-write guarantee.
    pub fn subscribe(&self, project_id: ProjectId) -> RecordFeed {
        RecordFeed {
            service: self.clone(),
            project_id,
            revision: self.revision.subscribe(),
        }
    }
}

/// A poll/notify view over one project's records
pub struct RecordFeed {
    service: DataService,
    project_id: ProjectId,
    revision: watch::Receiver<u64>,
}

impl RecordFeed {
    /// The current record set.
    pub async fn current(&self) -> Result<Vec<Record>> {
        self.service
            .list_records(&self.project_id, &RecordQuery::default())
            .await
    }

    /// Wait for the next store mutation, then return the current record
    /// set.
    pub async fn changed(&mut self) -> Result<Vec<Record>> {
        self.revision.changed().await.ok();
        self.current().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn point_payload(value: &str) -> Payload {
        let mut data = Map::new();
        data.insert("species".to_string(), json!(value));
        Payload::new(json!({"type": "Point", "coordinates": [0.0, 0.0]}), data)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn add_record_tracks_an_insert() {
        let service = DataService::open_in_memory().unwrap();
        let project_id = ProjectId::new();

        let record = service
            .add_record(project_id, point_payload("oak"))
            .await
            .unwrap();

        let entry = service.change_for_record(&record.id).await.unwrap().unwrap();
        assert_eq!(entry.change_type, crate::models::ChangeType::Insert);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_then_delete_of_draft_clears_the_ledger() {
        let service = DataService::open_in_memory().unwrap();
        let project_id = ProjectId::new();

        let record = service
            .add_record(project_id, point_payload("oak"))
            .await
            .unwrap();
        service
            .update_record(&record.id, point_payload("elm"))
            .await
            .unwrap();
        service.delete_record(&record.id).await.unwrap();

        assert!(service
            .change_for_record(&record.id)
            .await
            .unwrap()
            .is_none());
        assert!(service.get_record(&record.id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn server_row_updates_track_only_on_divergence() {
        let service = DataService::open_in_memory().unwrap();
        let project_id = ProjectId::new();

        let mut record = Record::new(project_id, point_payload("oak"));
        record.sync_at = Some(record.created_at);
        record.version = Some(1);
        service.insert_record(record.clone()).await.unwrap();
        assert!(service
            .change_for_record(&record.id)
            .await
            .unwrap()
            .is_none());

        // Identical-value update: still untracked.
        service
            .update_record(&record.id, point_payload("oak"))
            .await
            .unwrap();
        assert!(service
            .change_for_record(&record.id)
            .await
            .unwrap()
            .is_none());

        // First real divergence starts tracking.
        service
            .update_record(&record.id, point_payload("elm"))
            .await
            .unwrap();
        let entry = service.change_for_record(&record.id).await.unwrap().unwrap();
        assert_eq!(entry.change_type, crate::models::ChangeType::Update);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_project_rejects_multi_level_nesting() {
        let service = DataService::open_in_memory().unwrap();

        let inner = FieldConfig {
            key: "inner".to_string(),
            name: "Inner".to_string(),
            required: false,
            kind: FieldKind::Nested {
                fields: vec![],
                rules: crate::models::NestedRules::default(),
            },
        };
        let outer = FieldConfig {
            key: "outer".to_string(),
            name: "Outer".to_string(),
            required: false,
            kind: FieldKind::Nested {
                fields: vec![inner],
                rules: crate::models::NestedRules::default(),
            },
        };

        let error = service.create_project("bad", vec![outer]).await.unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn feed_reflects_mutations_after_notification() {
        let service = DataService::open_in_memory().unwrap();
        let project_id = ProjectId::new();
        let mut feed = service.subscribe(project_id);

        assert!(feed.current().await.unwrap().is_empty());

        let service_clone = service.clone();
        let writer = tokio::spawn(async move {
            service_clone
                .add_record(project_id, point_payload("oak"))
                .await
                .unwrap();
        });

        let records = feed.changed().await.unwrap();
        writer.await.unwrap();
        assert_eq!(records.len(), 1);
    }
}
