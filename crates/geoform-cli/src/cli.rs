use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "geoform")]
#[command(about = "Collect geo-tagged survey data offline and sync it later")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage survey projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Capture a survey record
    Add {
        /// Project ID or unique ID prefix
        #[arg(long, value_name = "PROJECT")]
        project: String,
        /// Field values as a JSON object
        #[arg(long, value_name = "JSON")]
        data: String,
        /// Longitude of the surveyed feature
        #[arg(long, allow_hyphen_values = true)]
        lng: Option<f64>,
        /// Latitude of the surveyed feature
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        /// Full GeoJSON geometry (overrides --lng/--lat)
        #[arg(long, value_name = "JSON")]
        geom: Option<String>,
    },
    /// List a project's records
    List {
        /// Project ID or unique ID prefix
        #[arg(long, value_name = "PROJECT")]
        project: String,
        /// Number of records to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Records to skip
        #[arg(long, default_value = "0")]
        offset: usize,
        /// Filter by keyword over the captured values
        #[arg(long)]
        keyword: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update a record's field values
    Edit {
        /// Record ID
        id: String,
        /// New field values as a JSON object
        #[arg(long, value_name = "JSON")]
        data: String,
    },
    /// Delete a record
    Delete {
        /// Record ID
        id: String,
    },
    /// Attach an image to a record
    Attach {
        /// Record ID
        id: String,
        /// Path to the image file
        #[arg(value_name = "PATH")]
        file: PathBuf,
    },
    /// Watch a project's records for changes
    Watch {
        /// Project ID or unique ID prefix
        #[arg(long, value_name = "PROJECT")]
        project: String,
    },
    /// Submit pending images and data changes to the cloud
    Submit {
        /// Project ID or unique ID prefix
        #[arg(long, value_name = "PROJECT")]
        project: String,
    },
    /// Show pending changes awaiting submission
    Status {
        /// Project ID or unique ID prefix
        #[arg(long, value_name = "PROJECT")]
        project: String,
    },
    /// Back up the whole local store to an .ixdb archive
    Backup {
        /// Destination path (remembered handle or default when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Restore the local store from an .ixdb archive
    Restore {
        /// Archive to import
        file: PathBuf,
        /// Accept archives written at a different schema version
        #[arg(long)]
        accept_version_diff: bool,
        /// Accept archives missing whole tables
        #[arg(long)]
        accept_missing_tables: bool,
    },
    /// Inspect or change app configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Create a project from a field definition file
    Create {
        /// Project name
        name: String,
        /// Path to a JSON list of field definitions
        #[arg(long, value_name = "PATH")]
        fields: Option<PathBuf>,
    },
    /// List projects
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record a server-confirmed push (sync stamp + version token)
    MarkSynced {
        /// Project ID or unique ID prefix
        id: String,
        /// Server version token
        #[arg(long, value_name = "TOKEN")]
        version_id: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Select the capture camera
    Camera {
        /// Camera device id
        id: String,
    },
    /// Toggle continuous backup
    ContinuousBackup,
}
