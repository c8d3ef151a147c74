//! Database layer for geoform

mod change_repository;
mod config_repository;
mod connection;
mod image_repository;
pub mod migrations;
mod project_repository;
mod record_repository;

pub use change_repository::SqliteChangeRepository;
pub use config_repository::{
    BackupHandle, ConfigRepository, SqliteBackupHandleRepository, SqliteConfigRepository,
};
pub use connection::Database;
pub use image_repository::SqliteImageRepository;
pub use project_repository::{SqliteLayerRepository, SqliteProjectRepository};
pub use record_repository::{RecordQuery, RecordRepository, SqliteRecordRepository};
