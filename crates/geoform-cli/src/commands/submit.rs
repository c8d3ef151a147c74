use std::io::Write as _;
use std::path::Path;

use geoform_core::sync::{HttpSyncClient, Uploader};

use crate::commands::common::{
    api_base_url_from_env, open_service, resolve_project, CliLocationProvider,
};
use crate::error::CliError;

pub async fn run_submit(project_query: &str, db_path: &Path) -> Result<(), CliError> {
    let base_url = api_base_url_from_env()?;
    let service = open_service(db_path)?;
    let project = resolve_project(project_query, &service).await?;

    let api = HttpSyncClient::new(base_url)?;
    let uploader = Uploader::new(service, api, CliLocationProvider::from_env());

    let result = uploader
        .submit_data_cloud(project.id, print_progress)
        .await;
    println!();

    match result {
        Ok(()) => {
            tracing::info!("submitted pending changes for project {}", project.id);
            println!("Data submitted successfully");
            Ok(())
        }
        Err(error @ geoform_core::Error::VersionConflict(_)) => {
            eprintln!("The project must be synced before submitting data");
            Err(error.into())
        }
        Err(error) => Err(error.into()),
    }
}

pub async fn run_status(project_query: &str, db_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path)?;
    let project = resolve_project(project_query, &service).await?;

    let upserts = service.pending_upserts(&project.id).await?;
    let deletes = service.pending_deletes(&project.id).await?;
    let images = service.count_dirty_images(&project.id).await?;

    println!("{} pending upserts", upserts.len());
    println!("{} pending deletes", deletes.len());
    println!("{images} pending images");

    if project.version_id.is_none() && (!upserts.is_empty() || !deletes.is_empty() || images > 0) {
        println!("note: the project has no version token; submit will fail until it is synced");
    }

    Ok(())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn print_progress(progress: f64) {
    print!("\rsubmitting... {:>3}%", progress.round() as u64);
    let _ = std::io::stdout().flush();
}
