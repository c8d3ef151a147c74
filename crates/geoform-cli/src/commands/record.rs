use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use geoform_core::db::RecordQuery;
use geoform_core::models::RecordId;

use crate::commands::common::{
    build_payload, format_record_lines, open_service, parse_field_data, record_to_list_item,
    resolve_project, RecordListItem,
};
use crate::error::CliError;

pub async fn run_add(
    project_query: &str,
    data: &str,
    lng: Option<f64>,
    lat: Option<f64>,
    geom: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let service = open_service(db_path)?;
    let project = resolve_project(project_query, &service).await?;

    let values = parse_field_data(&project, data)?;
    let payload = build_payload(values, lng, lat, geom)?;

    let record = service.add_record(project.id, payload).await?;
    println!("{}", record.id);
    Ok(())
}

pub async fn run_list(
    project_query: &str,
    limit: usize,
    offset: usize,
    keyword: Option<&str>,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let service = open_service(db_path)?;
    let project = resolve_project(project_query, &service).await?;

    let records = service
        .list_records(
            &project.id,
            &RecordQuery {
                limit: Some(limit),
                offset,
                keyword: keyword.map(str::to_string),
            },
        )
        .await?;

    if as_json {
        let items: Vec<RecordListItem> = records.iter().map(record_to_list_item).collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for line in format_record_lines(&records) {
            println!("{line}");
        }
    }

    Ok(())
}

pub async fn run_edit(id: &str, data: &str, db_path: &Path) -> Result<(), CliError> {
    let record_id: RecordId = id
        .trim()
        .parse()
        .map_err(|_| CliError::RecordNotFound(id.to_string()))?;

    let service = open_service(db_path)?;
    let record = service
        .get_record(&record_id)
        .await?
        .ok_or_else(|| CliError::RecordNotFound(id.to_string()))?;
    let project = resolve_project(&record.project_id.to_string(), &service).await?;

    let values = parse_field_data(&project, data)?;
    let mut payload = record.payload.clone();
    payload.data = values;

    let updated = service.update_record(&record_id, payload).await?;
    println!("{}", updated.id);
    Ok(())
}

pub async fn run_delete(id: &str, db_path: &Path) -> Result<(), CliError> {
    let record_id: RecordId = id
        .trim()
        .parse()
        .map_err(|_| CliError::RecordNotFound(id.to_string()))?;

    let service = open_service(db_path)?;
    if !service.delete_record(&record_id).await? {
        return Err(CliError::RecordNotFound(id.to_string()));
    }

    println!("{record_id}");
    Ok(())
}

pub async fn run_attach(id: &str, file: &Path, db_path: &Path) -> Result<(), CliError> {
    let record_id: RecordId = id
        .trim()
        .parse()
        .map_err(|_| CliError::RecordNotFound(id.to_string()))?;

    let service = open_service(db_path)?;
    let record = service
        .get_record(&record_id)
        .await?
        .ok_or_else(|| CliError::RecordNotFound(id.to_string()))?;

    let bytes = std::fs::read(file)?;
    let encoded = data_uri_for(file, &bytes);

    let image = service
        .add_image(record.project_id, record.id, encoded)
        .await?;
    println!("{}", image.id);
    Ok(())
}

pub async fn run_watch(project_query: &str, db_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path)?;
    let project = resolve_project(project_query, &service).await?;

    let mut feed = service.subscribe(project.id);
    let current = feed.current().await?;
    println!("{} records; watching for changes (Ctrl-C to stop)", current.len());

    loop {
        let records = feed.changed().await?;
        println!("{} records", records.len());
    }
}

fn data_uri_for(file: &Path, bytes: &[u8]) -> String {
    let mime = mime_guess::from_path(file).first_or_octet_stream();
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_picks_mime_from_extension() {
        let uri = data_uri_for(Path::new("photo.png"), b"x");
        assert!(uri.starts_with("data:image/png;base64,"));

        let unknown = data_uri_for(Path::new("photo.raw"), b"x");
        assert!(unknown.starts_with("data:application/octet-stream;base64,"));
    }

    #[test]
    fn data_uri_encodes_the_body() {
        let uri = data_uri_for(Path::new("photo.png"), b"foobar");
        assert!(uri.ends_with("Zm9vYmFy"));
    }
}
