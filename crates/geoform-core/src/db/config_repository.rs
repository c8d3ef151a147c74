//! App config and backup handle repository implementations

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::{AppConfig, CameraConfig, TimeMachineConfig};
use rusqlite::{params, Connection};

/// Trait for app config storage operations
pub trait ConfigRepository {
    /// Load config from the database, falling back to defaults
    fn load(&self) -> Result<AppConfig>;

    /// Save config to the database
    fn save(&self, config: &AppConfig) -> Result<()>;
}

/// `SQLite` implementation of `ConfigRepository`.
///
/// Each config section is stored as one JSON value under its own key.
pub struct SqliteConfigRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteConfigRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn get_value(&self, key: &str) -> Result<Option<String>> {
        let result = self.conn.query_row(
            "SELECT value FROM app_config WHERE key = ?",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO app_config (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Raw key/value listing (backup export)
    pub fn all_entries(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM app_config ORDER BY key")?;

        let entries = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    /// Raw key/value write (backup import)
    pub fn insert_raw(&self, key: &str, value: &str) -> Result<()> {
        self.set_value(key, value)
    }
}

impl ConfigRepository for SqliteConfigRepository<'_> {
    fn load(&self) -> Result<AppConfig> {
        let mut config = AppConfig::default();

        if let Some(raw) = self.get_value("camera")? {
            config.camera = serde_json::from_str::<CameraConfig>(&raw).unwrap_or_default();
        }
        if let Some(raw) = self.get_value("time_machine")? {
            config.time_machine =
                serde_json::from_str::<TimeMachineConfig>(&raw).unwrap_or_default();
        }

        Ok(config)
    }

    fn save(&self, config: &AppConfig) -> Result<()> {
        self.set_value("camera", &serde_json::to_string(&config.camera)?)?;
        self.set_value(
            "time_machine",
            &serde_json::to_string(&config.time_machine)?,
        )?;
        Ok(())
    }
}

/// The remembered backup destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupHandle {
    /// Destination file path
    pub path: PathBuf,
    /// When the destination was chosen (Unix ms)
    pub saved_at: i64,
}

/// `SQLite` repository for the singleton backup handle row.
///
/// Never exported by backup and never imported by restore; a fresh
/// destination must be re-established after a restore.
pub struct SqliteBackupHandleRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteBackupHandleRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Load the remembered destination, if any
    pub fn get(&self) -> Result<Option<BackupHandle>> {
        let result = self.conn.query_row(
            "SELECT path, saved_at FROM backup_handle WHERE id = 1",
            [],
            |row| {
                Ok(BackupHandle {
                    path: PathBuf::from(row.get::<_, String>(0)?),
                    saved_at: row.get(1)?,
                })
            },
        );

        match result {
            Ok(handle) => Ok(Some(handle)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remember a destination for future backups
    pub fn set(&self, path: &Path, saved_at: i64) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO backup_handle (id, path, saved_at) VALUES (1, ?, ?)",
            params![path.to_string_lossy(), saved_at],
        )?;
        Ok(())
    }
}
