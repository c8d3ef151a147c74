//! Map layer model and styling types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::project::ProjectId;

/// A unique identifier for a project layer, using UUID v7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerId(Uuid);

impl LayerId {
    /// Create a new unique layer ID using UUID v7
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

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A base or reference layer attached to a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectLayer {
    /// Unique identifier
    pub id: LayerId,
    /// Owning project
    pub project_id: ProjectId,
    /// Display name
    pub layer_name: String,
    /// Draw order, lowest first
    pub layer_order: i64,
    /// Rendering style
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_style: Option<LayerStyle>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last confirmed server sync timestamp (Unix ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_at: Option<i64>,
}

impl ProjectLayer {
    /// Create a new layer for a project
    #[must_use]
    pub fn new(project_id: ProjectId, layer_name: impl Into<String>, layer_order: i64) -> Self {
        Self {
            id: LayerId::new(),
            project_id,
            layer_name: layer_name.into(),
            layer_order,
            layer_style: None,
            created_at: crate::util::now_ms(),
            sync_at: None,
        }
    }
}

/// Layer styling tagged union
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LayerStyle {
    #[serde(rename_all = "camelCase")]
    Raster { opacity: f64 },
    #[serde(rename_all = "camelCase")]
    Line { line_color: String, line_width: f64 },
    #[serde(rename_all = "camelCase")]
    Polygon {
        line_color: String,
        line_width: f64,
        fill_color: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label_field: Option<Vec<String>>,
    },
    #[serde(rename_all = "camelCase")]
    Point {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        point_color: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        point_image: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label_field: Option<Vec<String>>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn layer_style_round_trips_with_type_tag() {
        let style = LayerStyle::Polygon {
            line_color: "#336699".to_string(),
            line_width: 1.5,
            fill_color: "#33669922".to_string(),
            label_field: Some(vec!["species".to_string()]),
        };

        let json = serde_json::to_value(&style).unwrap();
        assert_eq!(json["type"], "POLYGON");
        assert_eq!(json["fillColor"], "#33669922");

        let decoded: LayerStyle = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, style);
    }

    #[test]
    fn new_layer_is_unsynced() {
        let layer = ProjectLayer::new(ProjectId::new(), "parcels", 0);
        assert!(layer.sync_at.is_none());
        assert!(layer.layer_style.is_none());
    }
}
