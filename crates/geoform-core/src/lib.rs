//! geoform-core - Core library for geoform
//!
//! This crate contains the shared models, local store, change tracker,
//! sync engine, and backup machinery used by all geoform clients.

pub mod backup;
pub mod changes;
pub mod db;
pub mod error;
pub mod models;
pub mod report;
pub mod service;
pub mod sync;
pub mod util;
pub mod validate;

pub use error::{Error, Result};
pub use models::{Project, ProjectId, Record, RecordId};
pub use service::{DataService, RecordFeed};
