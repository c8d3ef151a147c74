use std::path::{Path, PathBuf};

use geoform_core::models::FieldConfig;
use geoform_core::util::now_ms;
use serde::Serialize;

use crate::commands::common::{format_timestamp, open_service, resolve_project};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct ProjectListItem {
    id: String,
    name: String,
    fields: usize,
    version_id: Option<String>,
    synced_at: Option<String>,
}

pub async fn run_create(
    name: &str,
    fields_path: Option<&Path>,
    db_path: &Path,
) -> Result<(), CliError> {
    let fields: Vec<FieldConfig> = match fields_path {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => Vec::new(),
    };

    let service = open_service(db_path)?;
    let project = service.create_project(name, fields).await?;
    println!("{}", project.id);
    Ok(())
}

pub async fn run_list(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path)?;
    let projects = service.list_projects().await?;

    if as_json {
        let items: Vec<ProjectListItem> = projects
            .iter()
            .map(|project| ProjectListItem {
                id: project.id.to_string(),
                name: project.name.clone(),
                fields: project.fields.len(),
                version_id: project.version_id.clone(),
                synced_at: project.sync_at.map(format_timestamp),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    for project in projects {
        let id = project.id.to_string();
        let short_id = id.chars().take(13).collect::<String>();
        let sync_state = if project.version_id.is_some() {
            "cloud"
        } else {
            "local"
        };
        println!(
            "{short_id:<13}  {sync_state:<5}  {:<3}  {}",
            project.fields.len(),
            project.name
        );
    }

    Ok(())
}

pub async fn run_mark_synced(id: &str, version_id: &str, db_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path)?;
    let project = resolve_project(id, &service).await?;

    service
        .mark_project_synced(&project.id, now_ms(), version_id)
        .await?;
    println!("{}", project.id);
    Ok(())
}

pub fn resolve_fields_path(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|path| !path.as_os_str().is_empty())
}
