//! Change tracking: collapses raw record mutations into the
//! pending-change ledger.
//!
//! The mutation site calls [`track`] directly, inside the same
//! transaction as the row write, so each mutation is evaluated exactly
//! once and the ledger can never observe a half-applied event.

use rusqlite::Connection;

use crate::db::SqliteChangeRepository;
use crate::error::Result;
use crate::models::{ChangeEntry, ChangeType, Record, RecordId};
use crate::ProjectId;

/// Timestamps of the row a mutation applied to, when known
#[derive(Debug, Clone, Copy, Default)]
pub struct RowStamp {
    pub created_at: Option<i64>,
    pub sync_at: Option<i64>,
}

impl RowStamp {
    fn of(record: &Record) -> Self {
        Self {
            created_at: Some(record.created_at),
            sync_at: record.sync_at,
        }
    }
}

/// A raw record mutation, as seen by the mutation site
#[derive(Debug, Clone)]
pub struct MutationEvent {
    pub change_type: ChangeType,
    pub project_id: ProjectId,
    pub data_id: RecordId,
    /// Stamps of the pre-mutation row (for insert: the inserted row
    /// itself, whose stamps reveal a server-originated pull)
    pub prior: Option<RowStamp>,
    /// Server row version of the pre-delete row
    pub prior_version: Option<i64>,
    /// Update only: whether the new payload differs from the stored one
    pub diverged: bool,
}

impl MutationEvent {
    /// An insert of the given record
    #[must_use]
    pub fn insert(record: &Record) -> Self {
        Self {
            change_type: ChangeType::Insert,
            project_id: record.project_id,
            data_id: record.id,
            prior: Some(RowStamp::of(record)),
            prior_version: None,
            diverged: false,
        }
    }

    /// An update of `prior`, where `diverged` says whether the new
    /// payload differs from the stored one
    #[must_use]
    pub fn update(prior: &Record, diverged: bool) -> Self {
        Self {
            change_type: ChangeType::Update,
            project_id: prior.project_id,
            data_id: prior.id,
            prior: Some(RowStamp::of(prior)),
            prior_version: None,
            diverged,
        }
    }

    /// A delete of `prior`
    #[must_use]
    pub fn delete(prior: &Record) -> Self {
        Self {
            change_type: ChangeType::Delete,
            project_id: prior.project_id,
            data_id: prior.id,
            prior: Some(RowStamp::of(prior)),
            prior_version: prior.version,
            diverged: false,
        }
    }
}

/// Whether the mutated row's authoritative first write came from the
/// server. Unknown stamps fall back so that an absent `sync_at` never
/// classifies as server-originated.
fn is_server_originated(prior: Option<RowStamp>) -> bool {
    let sync_at = prior.and_then(|stamp| stamp.sync_at).unwrap_or(0);
    let created_at = prior.and_then(|stamp| stamp.created_at).unwrap_or(i64::MAX);
    sync_at >= created_at
}

/// Apply one mutation event to the ledger.
///
/// Must run inside the caller's transaction, alongside the row write.
/// Idempotent under replays: the ledger holds at most one live entry per
/// record, keyed by `data_id`.
pub fn track(conn: &Connection, event: &MutationEvent) -> Result<()> {
    let repo = SqliteChangeRepository::new(conn);

    match event.change_type {
        ChangeType::Insert => {
            // A row pulled from the server must not be re-uploaded.
            if is_server_originated(event.prior) {
                return Ok(());
            }
            upsert_entry(&repo, event, ChangeType::Insert, None)
        }
        ChangeType::Update => {
            // Untouched server rows stay untracked; the first payload
            // divergence starts tracking.
            if is_server_originated(event.prior) && !event.diverged {
                return Ok(());
            }
            upsert_entry(&repo, event, ChangeType::Update, None)
        }
        ChangeType::Delete => {
            if event.prior.is_some_and(|stamp| stamp.sync_at.is_some()) {
                // The server holds this row; leave a delete marker.
                upsert_entry(&repo, event, ChangeType::Delete, event.prior_version)
            } else {
                // A never-synced draft: there is nothing to tell the
                // server, so the pending entry vanishes with the row.
                if let Some(existing) = repo.get_by_data_id(&event.data_id)? {
                    repo.delete_by_id(&existing.id)?;
                }
                Ok(())
            }
        }
    }
}

fn upsert_entry(
    repo: &SqliteChangeRepository<'_>,
    event: &MutationEvent,
    change_type: ChangeType,
    version: Option<i64>,
) -> Result<()> {
    if let Some(mut existing) = repo.get_by_data_id(&event.data_id)? {
        existing.change_type = change_type;
        existing.version = version;
        existing.updated_at = crate::util::now_ms();
        repo.update(&existing)
    } else {
        let mut entry = ChangeEntry::new(event.project_id, event.data_id, change_type);
        entry.version = version;
        repo.insert(&entry)
    }
}
