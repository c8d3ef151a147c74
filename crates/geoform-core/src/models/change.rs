//! Pending-change ledger model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::project::ProjectId;
use super::record::RecordId;

/// Table name recorded on ledger entries for survey records
pub const RECORD_TABLE: &str = "record";

/// A unique identifier for a ledger entry, using UUID v7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeId(Uuid);

impl ChangeId {
    /// Create a new unique change ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for ChangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChangeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The kind of pending mutation a ledger entry describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

impl ChangeType {
    /// Stable string form used in the local store
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl FromStr for ChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(format!("unknown change type '{other}'")),
        }
    }
}

/// One not-yet-uploaded mutation.
///
/// At most one live entry exists per `data_id`; the change tracker
/// collapses repeated mutations into it. The entry weakly references the
/// record by id and never owns the data it describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    /// Unique identifier
    pub id: ChangeId,
    /// Source table name
    pub table: String,
    /// Owning project
    pub project_id: ProjectId,
    /// The mutated record's id
    pub data_id: RecordId,
    /// Collapsed mutation kind
    pub change_type: ChangeType,
    /// Server row version captured at delete time, shipped with delete
    /// markers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    /// Timestamp of the latest collapsed mutation (Unix ms)
    pub updated_at: i64,
}

impl ChangeEntry {
    /// Create a fresh ledger entry for a record mutation
    #[must_use]
    pub fn new(project_id: ProjectId, data_id: RecordId, change_type: ChangeType) -> Self {
        Self {
            id: ChangeId::new(),
            table: RECORD_TABLE.to_string(),
            project_id,
            data_id,
            change_type,
            version: None,
            updated_at: crate::util::now_ms(),
        }
    }
}
