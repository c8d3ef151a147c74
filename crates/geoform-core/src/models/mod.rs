//! Data models for geoform

mod change;
mod config;
mod image;
mod layer;
mod project;
mod record;

pub use change::{ChangeEntry, ChangeId, ChangeType, RECORD_TABLE};
pub use config::{AppConfig, CameraConfig, TimeMachineConfig};
pub use image::{ImageId, SurveyImage};
pub use layer::{LayerId, LayerStyle, ProjectLayer};
pub use project::{
    has_multi_level_nesting, CheckboxOption, CheckboxRules, DateRules, FieldConfig, FieldKind,
    ImageRules, NestedRules, NumberRules, Project, ProjectId, TextRules,
};
pub use record::{LngLat, Payload, Record, RecordId};
