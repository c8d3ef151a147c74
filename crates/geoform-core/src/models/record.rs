//! Survey record model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::project::ProjectId;

/// A unique identifier for a survey record, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Create a new unique record ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }

    /// The underlying UUID, for wire packing
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A longitude/latitude pair, serialized as `[lng, lat]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl From<[f64; 2]> for LngLat {
    fn from(pair: [f64; 2]) -> Self {
        Self {
            lng: pair[0],
            lat: pair[1],
        }
    }
}

impl From<LngLat> for [f64; 2] {
    fn from(location: LngLat) -> Self {
        [location.lng, location.lat]
    }
}

/// The survey document held by a record: a geometry plus the captured
/// field values, keyed by field key.
///
/// Stored as a serialized JSON string in the local store and parsed on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// GeoJSON geometry of the surveyed feature
    pub geom: Value,
    /// Field key to captured value
    pub data: Map<String, Value>,
}

impl Payload {
    /// Create a payload from a geometry and field values.
    #[must_use]
    pub const fn new(geom: Value, data: Map<String, Value>) -> Self {
        Self { geom, data }
    }
}

/// A geo-tagged survey record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Unique identifier
    pub id: RecordId,
    /// Owning project
    pub project_id: ProjectId,
    /// Geometry and field values
    pub payload: Payload,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last local mutation timestamp (Unix ms)
    pub updated_at: i64,
    /// Last confirmed server sync timestamp (Unix ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_at: Option<i64>,
    /// Participant tag ids
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Uuid>>,
    /// Location of the participant at capture time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_location: Option<LngLat>,
    /// Server-assigned row version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

impl Record {
    /// Create a new local draft record
    #[must_use]
    pub fn new(project_id: ProjectId, payload: Payload) -> Self {
        let now = crate::util::now_ms();
        Self {
            id: RecordId::new(),
            project_id,
            payload,
            created_at: now,
            updated_at: now,
            sync_at: None,
            tags: None,
            participant_location: None,
            version: None,
        }
    }

    /// Whether the local state diverges from the last confirmed sync.
    ///
    /// A record is dirty when it was never synced, or when it was mutated
    /// after the last sync.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.sync_at.is_none_or(|sync_at| sync_at < self.updated_at)
    }

    /// Whether this row's authoritative first write came from the server.
    #[must_use]
    pub fn is_server_originated(&self) -> bool {
        self.sync_at.unwrap_or(0) >= self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point_payload() -> Payload {
        let mut data = Map::new();
        data.insert("species".to_string(), json!("oak"));
        Payload::new(json!({"type": "Point", "coordinates": [121.5, 25.0]}), data)
    }

    #[test]
    fn test_record_id_unique() {
        let id1 = RecordId::new();
        let id2 = RecordId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_record_id_parse() {
        let id = RecordId::new();
        let parsed: RecordId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn new_record_is_dirty() {
        let record = Record::new(ProjectId::new(), point_payload());
        assert!(record.is_dirty());
        assert!(!record.is_server_originated());
    }

    #[test]
    fn synced_record_is_clean_until_mutated() {
        let mut record = Record::new(ProjectId::new(), point_payload());
        record.sync_at = Some(record.updated_at);
        assert!(!record.is_dirty());

        record.updated_at += 1;
        assert!(record.is_dirty());
    }

    #[test]
    fn server_originated_when_sync_at_reaches_created_at() {
        let mut record = Record::new(ProjectId::new(), point_payload());
        record.sync_at = Some(record.created_at);
        assert!(record.is_server_originated());

        record.sync_at = Some(record.created_at - 1);
        assert!(!record.is_server_originated());
    }

    #[test]
    fn lng_lat_round_trips_as_pair() {
        let location = LngLat {
            lng: 121.56,
            lat: 25.03,
        };
        let encoded = serde_json::to_string(&location).unwrap();
        assert_eq!(encoded, "[121.56,25.03]");

        let decoded: LngLat = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, location);
    }
}
