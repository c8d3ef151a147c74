//! Project and form field configuration models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for a project, using UUID v7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(Uuid);

impl ProjectId {
    /// Create a new unique project ID using UUID v7
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

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProjectId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A survey project: a named, ordered form definition plus sync state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Unique identifier
    pub id: ProjectId,
    /// Display name
    pub name: String,
    /// Ordered form field definitions
    pub fields: Vec<FieldConfig>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Server optimistic-concurrency token; required before data sync
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    /// Last confirmed server sync timestamp (Unix ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_at: Option<i64>,
    /// Maximum number of participants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_quota: Option<u32>,
    /// Maximum capture distance from the surveyed feature, in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_distance: Option<f64>,
}

impl Project {
    /// Create a new local project
    #[must_use]
    pub fn new(name: impl Into<String>, fields: Vec<FieldConfig>) -> Self {
        Self {
            id: ProjectId::new(),
            name: name.into(),
            fields,
            created_at: crate::util::now_ms(),
            version_id: None,
            sync_at: None,
            participant_quota: None,
            max_distance: None,
        }
    }
}

/// A single form field: key, label, required flag, and the typed
/// constraint set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Key into the record payload's data map
    pub key: String,
    /// Display label
    pub name: String,
    /// Whether a value must be present
    #[serde(default)]
    pub required: bool,
    /// Field type and its validation constraints
    #[serde(flatten)]
    pub kind: FieldKind,
}

/// Field type tagged union with type-specific validation constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldKind {
    Text {
        #[serde(default, rename = "fieldConfig")]
        rules: TextRules,
    },
    Number {
        #[serde(default, rename = "fieldConfig")]
        rules: NumberRules,
    },
    Date {
        #[serde(default, rename = "fieldConfig")]
        rules: DateRules,
    },
    Checkbox {
        #[serde(rename = "fieldConfig")]
        rules: CheckboxRules,
    },
    Image {
        #[serde(default, rename = "fieldConfig")]
        rules: ImageRules,
    },
    Boolean,
    Nested {
        /// Child fields; only non-nested kinds are valid here
        fields: Vec<FieldConfig>,
        #[serde(default, rename = "fieldConfig")]
        rules: NestedRules,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_float: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_date: Option<chrono::NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_date: Option<chrono::NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckboxRules {
    /// Selectable options
    pub options: Vec<CheckboxOption>,
    /// Whether more than one option may be selected
    #[serde(default)]
    pub multiple: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckboxOption {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_formats: Option<Vec<String>>,
    /// Maximum image size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedRules {
    /// Minimum number of nested items required
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_item: Option<usize>,
}

/// Check whether a nested field contains another nested field.
///
/// Only one level of nesting is supported; deeper nesting is detected
/// here but never recursed into.
#[must_use]
pub fn has_multi_level_nesting(fields: &[FieldConfig]) -> bool {
    fields
        .iter()
        .any(|field| matches!(field.kind, FieldKind::Nested { .. }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_field(key: &str) -> FieldConfig {
        FieldConfig {
            key: key.to_string(),
            name: key.to_string(),
            required: true,
            kind: FieldKind::Text {
                rules: TextRules {
                    min_length: Some(1),
                    max_length: Some(80),
                    pattern: None,
                },
            },
        }
    }

    #[test]
    fn test_project_id_parse() {
        let id = ProjectId::new();
        let parsed: ProjectId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn field_config_serializes_with_type_tag() {
        let field = text_field("species");
        let json = serde_json::to_value(&field).unwrap();

        assert_eq!(json["type"], "TEXT");
        assert_eq!(json["key"], "species");
        assert_eq!(json["fieldConfig"]["minLength"], 1);
    }

    #[test]
    fn field_config_round_trips() {
        let field = FieldConfig {
            key: "visit".to_string(),
            name: "Visit".to_string(),
            required: false,
            kind: FieldKind::Nested {
                fields: vec![text_field("notes")],
                rules: NestedRules { min_item: Some(2) },
            },
        };

        let json = serde_json::to_string(&field).unwrap();
        let decoded: FieldConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, field);
    }

    #[test]
    fn boolean_field_parses_without_field_config() {
        let decoded: FieldConfig = serde_json::from_str(
            r#"{"key": "flowering", "name": "Flowering", "required": false, "type": "BOOLEAN"}"#,
        )
        .unwrap();
        assert_eq!(decoded.kind, FieldKind::Boolean);
    }

    #[test]
    fn detects_multi_level_nesting() {
        let nested = FieldConfig {
            key: "outer".to_string(),
            name: "Outer".to_string(),
            required: false,
            kind: FieldKind::Nested {
                fields: vec![FieldConfig {
                    key: "inner".to_string(),
                    name: "Inner".to_string(),
                    required: false,
                    kind: FieldKind::Nested {
                        fields: vec![],
                        rules: NestedRules::default(),
                    },
                }],
                rules: NestedRules::default(),
            },
        };

        let FieldKind::Nested { fields, .. } = &nested.kind else {
            unreachable!();
        };
        assert!(has_multi_level_nesting(fields));
        assert!(!has_multi_level_nesting(&[text_field("species")]));
    }

    #[test]
    fn new_project_has_no_version_token() {
        let project = Project::new("Street trees", vec![text_field("species")]);
        assert!(project.version_id.is_none());
        assert!(project.sync_at.is_none());
    }
}
