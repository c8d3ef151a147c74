//! Application configuration model

use serde::{Deserialize, Serialize};

/// Device-local application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Camera selection for image capture
    #[serde(default)]
    pub camera: CameraConfig,
    /// Continuous-backup state
    #[serde(default)]
    pub time_machine: TimeMachineConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraConfig {
    /// Selected camera device id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeMachineConfig {
    /// When the last backup was written (Unix ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<i64>,
    /// Whether backups should be taken continuously
    #[serde(default)]
    pub is_continuous: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_camera_and_no_backup() {
        let config = AppConfig::default();
        assert!(config.camera.selected.is_none());
        assert!(config.time_machine.last_updated.is_none());
        assert!(!config.time_machine.is_continuous);
    }

    #[test]
    fn config_round_trips() {
        let config = AppConfig {
            camera: CameraConfig {
                selected: Some("rear".to_string()),
            },
            time_machine: TimeMachineConfig {
                last_updated: Some(1234),
                is_continuous: true,
            },
        };

        let json = serde_json::to_string(&config).unwrap();
        let decoded: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, config);
    }
}
