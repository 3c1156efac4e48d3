//! Database layer for rescache
//!
//! Provides SQLite-based storage with:
//! - Versioned resources keyed by (resource type, file name)
//! - Tags and resource/tag links
//! - Storage bookkeeping with cascading removal

mod resources;
mod schema;
mod stats;
mod storages;
mod sync;
mod tags;

pub use resources::{ResourceChange, ResourceRecord, ScanReport, VersionRecord};
pub use schema::{
    Database, SchemaInfo, SchemaState, APP_VERSION, DATABASE_FILENAME, SCHEMA_VERSION, TABLES,
};
pub use stats::CacheStats;
pub use storages::StorageRecord;
pub use sync::{SyncAction, SyncReport};
pub use tags::{TagRecord, TagScanReport};

use chrono::{DateTime, Utc};
use std::path::PathBuf;

impl Database {
    /// Get the default cache directory
    pub fn default_location() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CACHE_DIR_NAME)
    }
}

/// Timestamps are stored as whole seconds since the Unix epoch
pub(crate) fn from_unix(seconds: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(seconds, 0).unwrap_or_default()
}
