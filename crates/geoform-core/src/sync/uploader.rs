//! Chunked drains over the pending-image set and the pending-change
//! ledger.
//!
//! Each drain processes fixed-size batches sequentially. A failed batch
//! aborts the rest of its drain; local effects of earlier batches are
//! already committed, so a later retry naturally skips them. Local
//! failures *after* a confirmed send are reported and swallowed — the
//! data is safe server-side, and surfacing them would only produce
//! duplicate-upload errors for the user.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::{ChangeEntry, ChangeId, Project, Record};
use crate::report::{ErrorReporter, TracingReporter};
use crate::service::DataService;
use crate::util::now_ms;
use crate::ProjectId;

use super::client::SyncApi;
use super::location::{locate_with_timeout, LocationProvider, LOCATION_TIMEOUT};
use super::wire::{DeletedKey, ImageBatchRequest, ImageRow, ModifiedRow, SyncRequest};

/// Default number of items per network round trip
pub const DEFAULT_BATCH_SIZE: usize = 3;

/// Pause between consecutive batches of one drain
const BATCH_PAUSE: Duration = Duration::from_millis(200);

/// Drains pending local changes to the remote service in bounded batches
pub struct Uploader<A, L> {
    service: DataService,
    api: A,
    location: L,
    reporter: Arc<dyn ErrorReporter>,
    batch_size: usize,
}

impl<A: SyncApi, L: LocationProvider> Uploader<A, L> {
    /// Create an uploader with the default batch size
    pub fn new(service: DataService, api: A, location: L) -> Self {
        Self {
            service,
            api,
            location,
            reporter: Arc::new(TracingReporter),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Override the batch size (must be at least 1)
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Override the error reporter
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Drain the project's dirty images.
    ///
    /// Progress is `(batches_done / total_batches) * 100`, monotone,
    /// ending at 100. An empty drain is a no-op and skips the callback.
    pub async fn upload_pending_images(
        &self,
        project_id: ProjectId,
        mut on_progress: impl FnMut(f64),
    ) -> Result<()> {
        let pending = self.service.dirty_images(&project_id, None).await?;
        if pending.is_empty() {
            return Ok(());
        }

        let total_batches = pending.len().div_ceil(self.batch_size);
        on_progress(0.0);

        for (batch_index, images) in pending.chunks(self.batch_size).enumerate() {
            let request = ImageBatchRequest {
                project_id: project_id.as_uuid(),
                images: images
                    .iter()
                    .map(|image| ImageRow {
                        id: image.id.as_uuid(),
                        record_id: image.record_id.as_uuid(),
                        image: image.image.clone(),
                    })
                    .collect(),
            };
            self.api.push_images(&request).await?;

            let ids: Vec<_> = images.iter().map(|image| image.id).collect();
            if let Err(error) = self.service.mark_images_synced(&ids, now_ms()).await {
                // The batch is on the server; a failed local mark must
                // not fail the drain.
                self.reporter.capture("mark images synced", &error);
            }

            #[allow(clippy::cast_precision_loss)]
            on_progress(((batch_index + 1) as f64 / total_batches as f64) * 100.0);
        }

        Ok(())
    }

    /// Ship the project's pending delete markers as `(id, version)` keys.
    pub async fn upload_pending_deletes(&self, project_id: ProjectId) -> Result<()> {
        let entries = self.service.pending_deletes(&project_id).await?;
        if entries.is_empty() {
            return Ok(());
        }

        let project = self.require_project(project_id).await?;
        let version_id = require_version_id(&project)?;

        let request = SyncRequest {
            modified: vec![],
            deleted_keys: entries
                .iter()
                .map(|entry| DeletedKey {
                    id: entry.data_id.as_uuid(),
                    version: entry.version,
                })
                .collect(),
            project_version_id: version_id,
        };
        self.api.push_changes(project_id, &request).await?;

        let ids: Vec<_> = entries.iter().map(|entry| entry.id).collect();
        if let Err(error) = self.service.delete_change_entries(&ids).await {
            self.reporter.capture("clear delete markers", &error);
        }

        Ok(())
    }

    /// Drain the project's pending inserts/updates.
    ///
    /// Fails fast when the project has no server version token. Each
    /// batch resolves ledger entries to current records (skipping
    /// vanished ones), attaches a best-effort participant location, and
    /// on success reconciles `sync_at`/`version` before clearing exactly
    /// that batch's ledger entries.
    pub async fn upload_pending_upserts(
        &self,
        project_id: ProjectId,
        mut on_progress: impl FnMut(f64),
    ) -> Result<()> {
        let project = self.require_project(project_id).await?;
        let version_id = require_version_id(&project)?;

        let entries = self.service.pending_upserts(&project_id).await?;
        if entries.is_empty() {
            return Ok(());
        }

        let total_batches = entries.len().div_ceil(self.batch_size);
        on_progress(0.0);

        for (batch_index, batch) in entries.chunks(self.batch_size).enumerate() {
            self.upload_upsert_batch(project_id, &version_id, batch)
                .await?;

            #[allow(clippy::cast_precision_loss)]
            on_progress(((batch_index + 1) as f64 / total_batches as f64) * 100.0);

            if batch_index + 1 < total_batches {
                tokio::time::sleep(BATCH_PAUSE).await;
            }
        }

        Ok(())
    }

    async fn upload_upsert_batch(
        &self,
        project_id: ProjectId,
        version_id: &str,
        batch: &[ChangeEntry],
    ) -> Result<()> {
        let data_ids: Vec<_> = batch.iter().map(|entry| entry.data_id).collect();
        let records = self.service.get_records(&data_ids).await?;
        let entry_ids: Vec<ChangeId> = batch.iter().map(|entry| entry.id).collect();

        if records.is_empty() {
            // Every record in the batch has vanished locally; the stale
            // entries just get cleared.
            self.service.delete_change_entries(&entry_ids).await?;
            return Ok(());
        }

        let fallback_location = locate_with_timeout(&self.location, LOCATION_TIMEOUT).await;
        let request = SyncRequest {
            modified: records.iter().map(|record| to_modified_row(record, fallback_location)).collect(),
            deleted_keys: vec![],
            project_version_id: version_id.to_string(),
        };

        let results = self.api.push_changes(project_id, &request).await?;

        if let Err(error) = self.service.apply_sync_results(&results, now_ms()).await {
            self.reporter.capture("reconcile synced records", &error);
        }
        if let Err(error) = self.service.delete_change_entries(&entry_ids).await {
            self.reporter.capture("clear uploaded ledger entries", &error);
        }

        Ok(())
    }

    /// Sequence a full cloud submission: images, deletes, then upserts,
    /// with progress scaled into one 0–100 window.
    ///
    /// A failure while draining images aborts the whole run. Later
    /// failures are reported and propagate without rolling back the
    /// durable effects of earlier steps.
    pub async fn submit_data_cloud(
        &self,
        project_id: ProjectId,
        mut on_progress: impl FnMut(f64),
    ) -> Result<()> {
        const IMAGE_WINDOW: f64 = 30.0;
        const DELETE_MARK: f64 = 40.0;

        self.upload_pending_images(project_id, |progress| {
            on_progress(progress / 100.0 * IMAGE_WINDOW);
        })
        .await?;
        on_progress(IMAGE_WINDOW);

        if let Err(error) = self.upload_pending_deletes(project_id).await {
            self.reporter.capture("submit pending deletes", &error);
            return Err(error);
        }
        on_progress(DELETE_MARK);

        if let Err(error) = self
            .upload_pending_upserts(project_id, |progress| {
                on_progress(DELETE_MARK + progress / 100.0 * (100.0 - DELETE_MARK));
            })
            .await
        {
            self.reporter.capture("submit pending upserts", &error);
            return Err(error);
        }

        on_progress(100.0);
        Ok(())
    }

    async fn require_project(&self, project_id: ProjectId) -> Result<Project> {
        self.service
            .get_project(&project_id)
            .await?
            .ok_or_else(|| Error::NotFound(project_id.to_string()))
    }
}

fn require_version_id(project: &Project) -> Result<String> {
    project
        .version_id
        .clone()
        .ok_or_else(Error::need_to_sync)
}

fn to_modified_row(record: &Record, fallback_location: Option<crate::models::LngLat>) -> ModifiedRow {
    ModifiedRow {
        id: record.id.as_uuid(),
        geom: record.payload.geom.clone(),
        data: record.payload.data.clone(),
        tags: record.tags.clone(),
        participant_location: record.participant_location.or(fallback_location),
    }
}
