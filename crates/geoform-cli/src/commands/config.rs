use std::path::Path;

use crate::commands::common::{format_timestamp, open_service};
use crate::error::CliError;

pub async fn run_show(db_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path)?;
    let config = service.load_config().await?;

    println!(
        "camera: {}",
        config.camera.selected.as_deref().unwrap_or("(none)")
    );
    println!(
        "continuous backup: {}",
        if config.time_machine.is_continuous {
            "on"
        } else {
            "off"
        }
    );
    println!(
        "last backup: {}",
        config
            .time_machine
            .last_updated
            .map_or_else(|| "(never)".to_string(), format_timestamp)
    );

    Ok(())
}

pub async fn run_camera(id: &str, db_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path)?;

    let mut config = service.load_config().await?;
    config.camera.selected = Some(id.to_string());
    service.save_config(&config).await?;

    println!("camera set to {id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[tokio::test(flavor = "multi_thread")]
    async fn camera_selection_persists() {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |duration| duration.as_nanos());
        let db_path: PathBuf =
            std::env::temp_dir().join(format!("geoform-config-test-{timestamp}.db"));

        run_camera("rear-wide", &db_path).await.unwrap();

        let service = open_service(&db_path).unwrap();
        let config = service.load_config().await.unwrap();
        assert_eq!(config.camera.selected.as_deref(), Some("rear-wide"));

        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
    }
}
