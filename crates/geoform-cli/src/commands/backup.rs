use std::path::Path;

use geoform_core::backup::{backup, restore, toggle_continuous, ImportOptions};

use crate::commands::common::{default_backup_dir, open_service};
use crate::error::CliError;

pub async fn run_backup(output: Option<&Path>, db_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path)?;

    let outcome = backup(&service, output, &default_backup_dir()).await?;
    println!("{}", outcome.path.display());
    Ok(())
}

pub async fn run_restore(
    file: &Path,
    accept_version_diff: bool,
    accept_missing_tables: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let service = open_service(db_path)?;

    restore(
        &service,
        file,
        ImportOptions {
            accept_version_diff,
            accept_missing_tables,
        },
    )
    .await?;

    println!("Store restored from {}", file.display());
    println!("note: choose a new backup destination; handles are never imported");
    Ok(())
}

pub async fn run_toggle_continuous(db_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path)?;
    let enabled = toggle_continuous(&service).await?;
    println!(
        "continuous backup {}",
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_test_db_path(tag: &str) -> PathBuf {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |duration| duration.as_nanos());
        std::env::temp_dir().join(format!("geoform-backup-test-{tag}-{timestamp}.db"))
    }

    fn cleanup_db_files(path: &PathBuf) {
        let _ = std::fs::remove_file(path);
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn backup_then_restore_round_trips_between_stores() {
        let source_db = unique_test_db_path("src");
        let target_db = unique_test_db_path("dst");
        let archive = std::env::temp_dir().join(format!(
            "geoform-test-{}.ixdb",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |duration| duration.as_nanos())
        ));

        {
            let service = open_service(&source_db).unwrap();
            service.create_project("trees", vec![]).await.unwrap();
        }

        run_backup(Some(&archive), &source_db).await.unwrap();
        run_restore(&archive, false, false, &target_db).await.unwrap();

        let service = open_service(&target_db).unwrap();
        let projects = service.list_projects().await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "trees");

        let _ = std::fs::remove_file(archive);
        cleanup_db_files(&source_db);
        cleanup_db_files(&target_db);
    }
}
