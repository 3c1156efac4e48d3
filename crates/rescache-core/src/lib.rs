//! Rescache Core Library
//!
//! A persistent SQLite cache of versioned, tagged resources (brushes,
//! palettes, presets and the like) collected from storages.
//!
//! # Features
//! - Folder, bundle and in-memory storages behind one trait
//! - Per-resource version history with content checksums
//! - Tags linked to resources by natural key
//! - Timestamp-driven synchronization with cascading storage removal

pub mod config;
pub mod db;
pub mod error;
pub mod localize;
pub mod registry;
pub mod storage;

pub use config::{Config, StorageConfig, StorageKind};
pub use db::{
    CacheStats, Database, ResourceChange, ResourceRecord, ScanReport, StorageRecord, SyncAction,
    SyncReport, TagRecord, TagScanReport, VersionRecord,
};
pub use error::{Error, ResCacheError, Result};
pub use localize::{Localizer, Passthrough};
pub use registry::ResourceTypeRegistry;
pub use storage::{
    BundleStorage, FolderStorage, MemoryStorage, OriginType, Resource, ResourceEntry,
    ResourceStorage, Tag, TagEntry,
};

/// Default cache directory name
pub const CACHE_DIR_NAME: &str = "rescache";

/// Default config directory name
pub const CONFIG_DIR_NAME: &str = "rescache";
