//! Wire payloads for the sync protocol.
//!
//! Every request has two functionally equivalent renditions: a compact
//! MessagePack form with UUIDs packed to 16-byte binary fields, and a
//! plain JSON form with UUIDs as strings. The server accepts either;
//! the client prefers binary and falls back to JSON.

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::LngLat;

/// Content type of the binary rendition
pub const MSGPACK_CONTENT_TYPE: &str = "application/msgpack";

/// One modified record in a sync request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifiedRow {
    pub id: Uuid,
    /// GeoJSON geometry
    pub geom: Value,
    /// Captured field values
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Uuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_location: Option<LngLat>,
}

/// One deleted record key in a sync request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedKey {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

/// Body of `POST /projects/{id}/data/sync`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub modified: Vec<ModifiedRow>,
    pub deleted_keys: Vec<DeletedKey>,
    pub project_version_id: String,
}

/// One image in an image batch request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRow {
    pub id: Uuid,
    pub record_id: Uuid,
    pub image: String,
}

/// Body of `POST /projects/images/batch-create`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageBatchRequest {
    pub project_id: Uuid,
    pub images: Vec<ImageRow>,
}

/// Server response to a sync request: `(id, new_version)` per modified row
pub type SyncResponse = Vec<(Uuid, i64)>;

// Binary renditions: same shape, UUIDs packed to fixed-width bytes.

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PackedModifiedRow<'a> {
    id: ByteBuf,
    geom: &'a Value,
    data: &'a Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<Vec<ByteBuf>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    participant_location: Option<LngLat>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PackedDeletedKey {
    id: ByteBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PackedSyncRequest<'a> {
    modified: Vec<PackedModifiedRow<'a>>,
    deleted_keys: Vec<PackedDeletedKey>,
    project_version_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PackedImageRow<'a> {
    id: ByteBuf,
    record_id: ByteBuf,
    image: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PackedImageBatchRequest<'a> {
    project_id: ByteBuf,
    images: Vec<PackedImageRow<'a>>,
}

fn pack_uuid(id: Uuid) -> ByteBuf {
    ByteBuf::from(id.into_bytes().to_vec())
}

/// Encode a sync request to its binary rendition
pub fn encode_sync_binary(request: &SyncRequest) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    let packed = PackedSyncRequest {
        modified: request
            .modified
            .iter()
            .map(|row| PackedModifiedRow {
                id: pack_uuid(row.id),
                geom: &row.geom,
                data: &row.data,
                tags: row
                    .tags
                    .as_ref()
                    .map(|tags| tags.iter().copied().map(pack_uuid).collect()),
                participant_location: row.participant_location,
            })
            .collect(),
        deleted_keys: request
            .deleted_keys
            .iter()
            .map(|key| PackedDeletedKey {
                id: pack_uuid(key.id),
                version: key.version,
            })
            .collect(),
        project_version_id: &request.project_version_id,
    };

    rmp_serde::to_vec_named(&packed)
}

/// Encode an image batch request to its binary rendition
pub fn encode_images_binary(
    request: &ImageBatchRequest,
) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    let packed = PackedImageBatchRequest {
        project_id: pack_uuid(request.project_id),
        images: request
            .images
            .iter()
            .map(|row| PackedImageRow {
                id: pack_uuid(row.id),
                record_id: pack_uuid(row.record_id),
                image: &row.image,
            })
            .collect(),
    };

    rmp_serde::to_vec_named(&packed)
}
