use std::env;
use std::path::{Path, PathBuf};

use geoform_core::models::{LngLat, Payload, Project, Record};
use geoform_core::sync::LocationProvider;
use geoform_core::DataService;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct RecordListItem {
    pub id: String,
    pub values: Map<String, Value>,
    pub created_at: i64,
    pub synced: bool,
    pub version: Option<i64>,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("GEOFORM_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("geoform")
        .join("geoform.db")
}

pub fn default_backup_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::data_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn open_service(db_path: &Path) -> Result<DataService, CliError> {
    Ok(DataService::open_path(db_path)?)
}

/// Resolve a project by exact id or unique id prefix.
pub async fn resolve_project(query: &str, service: &DataService) -> Result<Project, CliError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(CliError::ProjectNotFound(query.to_string()));
    }

    if let Ok(project_id) = query.parse() {
        if let Some(project) = service.get_project(&project_id).await? {
            return Ok(project);
        }
    }

    let matches: Vec<Project> = service
        .list_projects()
        .await?
        .into_iter()
        .filter(|project| project.id.as_str().starts_with(query))
        .collect();

    match matches.len() {
        0 => Err(CliError::ProjectNotFound(query.to_string())),
        1 => Ok(matches.into_iter().next().unwrap()),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|project| project.id.as_str().chars().take(13).collect::<String>())
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousProjectId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// Parse `--data` JSON and validate it against the project's fields.
pub fn parse_field_data(project: &Project, raw: &str) -> Result<Map<String, Value>, CliError> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Object(data) = value else {
        return Err(CliError::InvalidFieldData(
            "field data must be a JSON object".to_string(),
        ));
    };

    if let Err(issues) = geoform_core::validate::validate_record(&project.fields, &data) {
        let rendered = issues
            .iter()
            .map(|issue| format!("{}: {}", issue.key, issue.message))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(CliError::InvalidFieldData(rendered));
    }

    Ok(data)
}

/// Build a payload from the geometry flags and validated field data.
pub fn build_payload(
    data: Map<String, Value>,
    lng: Option<f64>,
    lat: Option<f64>,
    geom: Option<&str>,
) -> Result<Payload, CliError> {
    let geom = match (geom, lng, lat) {
        (Some(raw), _, _) => serde_json::from_str(raw)?,
        (None, Some(lng), Some(lat)) => {
            serde_json::json!({"type": "Point", "coordinates": [lng, lat]})
        }
        _ => {
            return Err(CliError::InvalidCoordinates(
                "pass --lng and --lat, or a full --geom geometry".to_string(),
            ))
        }
    };

    Ok(Payload::new(geom, data))
}

pub fn record_to_list_item(record: &Record) -> RecordListItem {
    RecordListItem {
        id: record.id.to_string(),
        values: record.payload.data.clone(),
        created_at: record.created_at,
        synced: !record.is_dirty(),
        version: record.version,
    }
}

pub fn format_record_lines(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let id = record.id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            let state = if record.is_dirty() { "pending" } else { "synced" };
            let values = serde_json::to_string(&record.payload.data).unwrap_or_default();
            let preview = values.chars().take(60).collect::<String>();

            format!("{short_id:<13}  {state:<7}  {preview}")
        })
        .collect()
}

/// Location source for submissions: a fixed coordinate from
/// `GEOFORM_FIXED_LOCATION` ("lng,lat"), or nothing.
pub enum CliLocationProvider {
    Fixed(LngLat),
    None,
}

impl CliLocationProvider {
    pub fn from_env() -> Self {
        env::var("GEOFORM_FIXED_LOCATION")
            .ok()
            .and_then(|raw| parse_lng_lat(&raw))
            .map_or(Self::None, Self::Fixed)
    }
}

impl LocationProvider for CliLocationProvider {
    async fn current_location(&self) -> Option<LngLat> {
        match self {
            Self::Fixed(location) => Some(*location),
            Self::None => None,
        }
    }
}

pub fn parse_lng_lat(raw: &str) -> Option<LngLat> {
    let (lng, lat) = raw.split_once(',')?;
    Some(LngLat {
        lng: lng.trim().parse().ok()?,
        lat: lat.trim().parse().ok()?,
    })
}

pub fn api_base_url_from_env() -> Result<String, CliError> {
    match env::var("GEOFORM_API_BASE_URL") {
        Ok(url) if !url.trim().is_empty() => Ok(url),
        _ => Err(CliError::SyncNotConfigured),
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}
