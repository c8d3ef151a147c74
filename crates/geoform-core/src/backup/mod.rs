//! Whole-store backup and restore.
//!
//! The archive is a single `.ixdb` JSON document holding every table's
//! rows plus a schema-version marker. The `backup_handle` table is never
//! exported and never imported: a fresh destination must be
//! re-established after a restore.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::db::{
    migrations, RecordRepository, SqliteChangeRepository, SqliteConfigRepository,
    SqliteImageRepository, SqliteLayerRepository, SqliteProjectRepository, SqliteRecordRepository,
};
use crate::error::{Error, Result};
use crate::models::{ChangeEntry, Project, ProjectLayer, Record, SurveyImage};
use crate::service::DataService;
use crate::util::now_ms;

/// Archive format marker
pub const BACKUP_FORMAT: &str = "geoform-backup";

/// Default archive file name for the download fallback
pub const DEFAULT_BACKUP_FILE_NAME: &str = "form_backup.ixdb";

/// A portable export of the whole local store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupArchive {
    /// Always [`BACKUP_FORMAT`]
    pub format: String,
    /// Local-store schema version at export time
    pub schema_version: i32,
    /// Export timestamp (Unix ms)
    pub exported_at: i64,
    /// Per-table row sets; a `None` table was absent from the archive
    pub tables: BackupTables,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupTables {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Vec<Project>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<Vec<ProjectLayer>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Vec<SurveyImage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<Vec<ChangeEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Vec<(String, String)>>,
}

/// Import behavior knobs
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Accept archives written at a different schema version
    pub accept_version_diff: bool,
    /// Accept archives missing whole tables
    pub accept_missing_tables: bool,
}

/// Outcome of a backup run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupOutcome {
    /// Where the archive was written
    pub path: PathBuf,
    /// Whether the destination came from a remembered handle
    pub used_remembered_handle: bool,
}

/// Serialize the entire store (minus the backup handle) to an archive.
pub async fn export_archive(service: &DataService) -> Result<BackupArchive> {
    let db = service.db().await;
    let conn = db.connection();

    let tables = BackupTables {
        project: Some(SqliteProjectRepository::new(conn).list()?),
        layer: Some(SqliteLayerRepository::new(conn).list_all()?),
        record: Some(list_all_records(conn)?),
        image: Some(list_all_images(conn)?),
        changes: Some(SqliteChangeRepository::new(conn).list_all()?),
        config: Some(SqliteConfigRepository::new(conn).all_entries()?),
    };

    Ok(BackupArchive {
        format: BACKUP_FORMAT.to_string(),
        schema_version: migrations::get_version(conn)?,
        exported_at: now_ms(),
        tables,
    })
}

/// Write a backup archive.
///
/// The destination is, in order: `explicit_path` if given, the
/// remembered handle, or [`DEFAULT_BACKUP_FILE_NAME`] in `fallback_dir`
/// (the direct-download analogue for environments with no chooser).
/// The chosen destination is remembered for future backups, and the
/// config's `time_machine` section is stamped.
pub async fn backup(
    service: &DataService,
    explicit_path: Option<&Path>,
    fallback_dir: &Path,
) -> Result<BackupOutcome> {
    let handle = service.backup_handle().await?;
    let (destination, used_remembered_handle) = match (explicit_path, &handle) {
        (Some(path), _) => (path.to_path_buf(), false),
        (None, Some(handle)) => (handle.path.clone(), true),
        (None, None) => (fallback_dir.join(DEFAULT_BACKUP_FILE_NAME), false),
    };

    let archive = export_archive(service).await?;
    write_archive(&archive, &destination)?;

    service.remember_backup_handle(&destination).await?;

    let mut config = service.load_config().await?;
    config.time_machine.last_updated = Some(now_ms());
    config.time_machine.is_continuous = true;
    service.save_config(&config).await?;

    tracing::info!("backup written to {}", destination.display());
    Ok(BackupOutcome {
        path: destination,
        used_remembered_handle,
    })
}

/// Flip the continuous-backup flag, returning its new value.
pub async fn toggle_continuous(service: &DataService) -> Result<bool> {
    let mut config = service.load_config().await?;
    config.time_machine.is_continuous = !config.time_machine.is_continuous;
    service.save_config(&config).await?;
    Ok(config.time_machine.is_continuous)
}

/// Destroy the current store and re-create it from an archive.
///
/// Missing tables and schema-version differences are tolerated per
/// `options`; the backup-handle table is always skipped on import.
pub async fn restore(service: &DataService, file: &Path, options: ImportOptions) -> Result<()> {
    let raw = std::fs::read_to_string(file)?;
    let archive: BackupArchive = serde_json::from_str(&raw)?;

    if archive.format != BACKUP_FORMAT {
        return Err(Error::InvalidInput(format!(
            "not a geoform backup archive: format '{}'",
            archive.format
        )));
    }
    if archive.schema_version != migrations::CURRENT_VERSION && !options.accept_version_diff {
        return Err(Error::InvalidInput(format!(
            "archive schema version {} differs from {} (pass accept_version_diff to import anyway)",
            archive.schema_version,
            migrations::CURRENT_VERSION
        )));
    }
    if !options.accept_missing_tables {
        let tables = &archive.tables;
        let missing = [
            ("project", tables.project.is_none()),
            ("layer", tables.layer.is_none()),
            ("record", tables.record.is_none()),
            ("image", tables.image.is_none()),
            ("changes", tables.changes.is_none()),
            ("config", tables.config.is_none()),
        ]
        .iter()
        .find_map(|(name, absent)| absent.then_some(*name));
        if let Some(name) = missing {
            return Err(Error::InvalidInput(format!(
                "archive is missing table '{name}' (pass accept_missing_tables to import anyway)"
            )));
        }
    }

    {
        let db = service.db().await;
        db.reset()?;

        let conn = db.connection();
        let tx = conn.unchecked_transaction()?;

        let projects = SqliteProjectRepository::new(&tx);
        for project in archive.tables.project.unwrap_or_default() {
            projects.insert(&project)?;
        }
        let layers = SqliteLayerRepository::new(&tx);
        for layer in archive.tables.layer.unwrap_or_default() {
            layers.insert(&layer)?;
        }
        let records = SqliteRecordRepository::new(&tx);
        for record in archive.tables.record.unwrap_or_default() {
            records.insert(&record)?;
        }
        let images = SqliteImageRepository::new(&tx);
        for image in archive.tables.image.unwrap_or_default() {
            images.insert(&image)?;
        }
        let changes = SqliteChangeRepository::new(&tx);
        for entry in archive.tables.changes.unwrap_or_default() {
            changes.insert(&entry)?;
        }
        let config = SqliteConfigRepository::new(&tx);
        for (key, value) in archive.tables.config.unwrap_or_default() {
            config.insert_raw(&key, &value)?;
        }

        tx.commit()?;
    }

    service.notify();
    tracing::info!("store restored from {}", file.display());
    Ok(())
}

fn write_archive(archive: &BackupArchive, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(destination)
        .map_err(|error| {
            if error.kind() == ErrorKind::PermissionDenied {
                Error::PermissionDenied(destination.display().to_string())
            } else {
                Error::Io(error)
            }
        })?;

    serde_json::to_writer(file, archive)?;
    Ok(())
}

fn list_all_records(conn: &rusqlite::Connection) -> Result<Vec<Record>> {
    let projects = SqliteProjectRepository::new(conn).list()?;
    let records = SqliteRecordRepository::new(conn);
    let mut all = Vec::new();
    for project in projects {
        all.extend(records.list_by_project(&project.id, &crate::db::RecordQuery::default())?);
    }
    Ok(all)
}

fn list_all_images(conn: &rusqlite::Connection) -> Result<Vec<SurveyImage>> {
    let mut stmt = conn.prepare(
        "SELECT id, project_id, record_id, image, created_at, updated_at, sync_at
         FROM image ORDER BY created_at, id",
    )?;

    let images = stmt
        .query_map([], |row| {
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
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Payload, ProjectId, ProjectLayer};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Map};
    use tempfile::tempdir;

    fn payload() -> Payload {
        let mut data = Map::new();
        data.insert("species".to_string(), json!("oak"));
        Payload::new(json!({"type": "Point", "coordinates": [0.0, 0.0]}), data)
    }

    async fn seeded_service() -> (DataService, ProjectId) {
        let service = DataService::open_in_memory().unwrap();
        let project = service.create_project("survey", vec![]).await.unwrap();
        service
            .add_layer(&ProjectLayer::new(project.id, "base", 0))
            .await
            .unwrap();
        let record = service.add_record(project.id, payload()).await.unwrap();
        service
            .add_image(project.id, record.id, "data:image/png;base64,x")
            .await
            .unwrap();
        (service, project.id)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn backup_then_restore_round_trips_every_table() {
        let (service, project_id) = seeded_service().await;
        let tmp = tempdir().unwrap();

        let outcome = backup(&service, None, tmp.path()).await.unwrap();
        assert!(!outcome.used_remembered_handle);

        let original = export_archive(&service).await.unwrap();

        // Restore into a fresh store.
        let restored = DataService::open_in_memory().unwrap();
        restore(&restored, &outcome.path, ImportOptions::default())
            .await
            .unwrap();

        let round_tripped = export_archive(&restored).await.unwrap();
        assert_eq!(round_tripped.tables.project, original.tables.project);
        assert_eq!(round_tripped.tables.layer, original.tables.layer);
        assert_eq!(round_tripped.tables.record, original.tables.record);
        assert_eq!(round_tripped.tables.image, original.tables.image);
        assert_eq!(round_tripped.tables.changes, original.tables.changes);

        // The restored store never inherits a backup handle.
        assert!(restored.backup_handle().await.unwrap().is_none());

        // The seeded ledger survives the round trip.
        assert_eq!(restored.count_pending_upserts(&project_id).await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn backup_remembers_the_destination_and_stamps_config() {
        let (service, _) = seeded_service().await;
        let tmp = tempdir().unwrap();

        let first = backup(&service, None, tmp.path()).await.unwrap();
        let handle = service.backup_handle().await.unwrap().unwrap();
        assert_eq!(handle.path, first.path);

        let config = service.load_config().await.unwrap();
        assert!(config.time_machine.last_updated.is_some());
        assert!(config.time_machine.is_continuous);

        // The second run reuses the remembered handle.
        let second = backup(&service, None, Path::new("/nonexistent")).await.unwrap();
        assert!(second.used_remembered_handle);
        assert_eq!(second.path, first.path);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn restore_rejects_foreign_files_and_version_drift() {
        let service = DataService::open_in_memory().unwrap();
        let tmp = tempdir().unwrap();

        let foreign = tmp.path().join("notes.json");
        std::fs::write(&foreign, r#"{"format": "something-else", "schemaVersion": 1, "exportedAt": 0, "tables": {}}"#).unwrap();
        let error = restore(&service, &foreign, ImportOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));

        let stale = tmp.path().join("stale.ixdb");
        std::fs::write(
            &stale,
            format!(
                r#"{{"format": "{BACKUP_FORMAT}", "schemaVersion": 999, "exportedAt": 0, "tables": {{}}}}"#
            ),
        )
        .unwrap();

        let error = restore(&service, &stale, ImportOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));

        // Accepting both differences makes the import pass.
        restore(
            &service,
            &stale,
            ImportOptions {
                accept_version_diff: true,
                accept_missing_tables: true,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn restore_replaces_existing_rows_entirely() {
        let (source, _) = seeded_service().await;
        let tmp = tempdir().unwrap();
        let outcome = backup(&source, None, tmp.path()).await.unwrap();

        let target = DataService::open_in_memory().unwrap();
        let doomed_project = target.create_project("doomed", vec![]).await.unwrap();
        let doomed = target
            .add_record(doomed_project.id, payload())
            .await
            .unwrap();

        restore(&target, &outcome.path, ImportOptions::default())
            .await
            .unwrap();

        assert!(target.get_record(&doomed.id).await.unwrap().is_none());
        assert_eq!(target.list_projects().await.unwrap().len(), 1);
        assert_eq!(target.list_projects().await.unwrap()[0].name, "survey");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn toggle_continuous_flips_the_flag() {
        let service = DataService::open_in_memory().unwrap();

        assert!(toggle_continuous(&service).await.unwrap());
        assert!(!toggle_continuous(&service).await.unwrap());
    }

    #[test]
    fn archive_tables_distinguish_missing_from_empty() {
        let archive: BackupArchive = serde_json::from_str(&format!(
            r#"{{"format": "{BACKUP_FORMAT}", "schemaVersion": 3, "exportedAt": 0,
                "tables": {{"record": []}}}}"#
        ))
        .unwrap();

        assert!(archive.tables.record.is_some());
        assert!(archive.tables.project.is_none());
    }
}
