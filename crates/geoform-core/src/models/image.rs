//! Survey image model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::project::ProjectId;
use super::record::RecordId;

/// A unique identifier for a survey image, using UUID v7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageId(Uuid);

impl ImageId {
    /// Create a new unique image ID using UUID v7
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

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ImageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// An image captured for a survey record.
///
/// The image body is carried as a data-URI/base64 string, the form the
/// batch-create endpoint accepts directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyImage {
    /// Unique identifier
    pub id: ImageId,
    /// Owning project
    pub project_id: ProjectId,
    /// Record this image belongs to
    pub record_id: RecordId,
    /// Image body as a data-URI string
    pub image: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last local mutation timestamp (Unix ms)
    pub updated_at: i64,
    /// Last confirmed server sync timestamp (Unix ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_at: Option<i64>,
}

impl SurveyImage {
    /// Create a new unsynced image
    #[must_use]
    pub fn new(project_id: ProjectId, record_id: RecordId, image: impl Into<String>) -> Self {
        let now = crate::util::now_ms();
        Self {
            id: ImageId::new(),
            project_id,
            record_id,
            image: image.into(),
            created_at: now,
            updated_at: now,
            sync_at: None,
        }
    }

    /// Dirty iff never synced or mutated after the last sync.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.sync_at.is_none_or(|sync_at| sync_at < self.updated_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_image_is_dirty() {
        let image = SurveyImage::new(ProjectId::new(), RecordId::new(), "data:image/png;base64,x");
        assert!(image.is_dirty());
    }

    #[test]
    fn image_dirty_tracks_updated_at() {
        let mut image =
            SurveyImage::new(ProjectId::new(), RecordId::new(), "data:image/png;base64,x");
        image.sync_at = Some(image.updated_at);
        assert!(!image.is_dirty());

        image.updated_at += 5;
        assert!(image.is_dirty());
    }
}
