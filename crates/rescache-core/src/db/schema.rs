//! Database schema and initialization

use crate::error::{ResCacheError, Result};
use crate::localize::{Localizer, Passthrough};
use crate::registry::ResourceTypeRegistry;
use crate::storage::OriginType;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Main database handle
///
/// Only a successful [`Database::initialize`] hands one out, so holding a
/// `Database` means the cache is usable.
pub struct Database {
    pub(crate) conn: Connection,
    pub(crate) registry: ResourceTypeRegistry,
    pub(crate) localizer: Arc<dyn Localizer>,
    path: Option<PathBuf>,
}

/// Schema version this code expects
pub const SCHEMA_VERSION: &str = "0.0.1";

/// File name of the cache database inside the cache directory
pub const DATABASE_FILENAME: &str = "resourcecache.sqlite";

/// Version of the application writing the cache
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Every table of the cache, in creation order
pub const TABLES: [&str; 8] = [
    "version_information",
    "origin_types",
    "resource_types",
    "storages",
    "tags",
    "resources",
    "versioned_resources",
    "resource_tags",
];

const TABLE_DEFINITIONS: [(&str, &str); 8] = [
    (
        "version_information",
        "CREATE TABLE version_information (
            schema_version TEXT NOT NULL,
            app_version TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
    ),
    (
        "origin_types",
        "CREATE TABLE origin_types (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        )",
    ),
    (
        "resource_types",
        "CREATE TABLE resource_types (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )",
    ),
    (
        "storages",
        "CREATE TABLE storages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            origin_type_id INTEGER NOT NULL REFERENCES origin_types(id),
            location TEXT NOT NULL UNIQUE,
            timestamp INTEGER NOT NULL,
            pre_installed INTEGER NOT NULL DEFAULT 0,
            active INTEGER NOT NULL DEFAULT 1
        )",
    ),
    (
        "tags",
        "CREATE TABLE tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            url TEXT NOT NULL,
            name TEXT NOT NULL,
            comment TEXT,
            resource_type_id INTEGER NOT NULL REFERENCES resource_types(id),
            active INTEGER NOT NULL DEFAULT 1,
            UNIQUE(url, resource_type_id)
        )",
    ),
    (
        "resources",
        "CREATE TABLE resources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            resource_type_id INTEGER NOT NULL REFERENCES resource_types(id),
            name TEXT NOT NULL,
            filename TEXT NOT NULL,
            tooltip TEXT,
            thumbnail BLOB,
            status INTEGER NOT NULL DEFAULT 1,
            UNIQUE(resource_type_id, filename)
        )",
    ),
    (
        "versioned_resources",
        "CREATE TABLE versioned_resources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            resource_id INTEGER NOT NULL REFERENCES resources(id),
            storage_id INTEGER NOT NULL REFERENCES storages(id),
            version INTEGER NOT NULL,
            location TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            deleted INTEGER NOT NULL DEFAULT 0,
            checksum TEXT NOT NULL,
            UNIQUE(resource_id, version)
        )",
    ),
    (
        "resource_tags",
        "CREATE TABLE resource_tags (
            resource_id INTEGER NOT NULL REFERENCES resources(id),
            tag_id INTEGER NOT NULL REFERENCES tags(id),
            PRIMARY KEY (resource_id, tag_id)
        )",
    ),
];

const INDEX_DEFINITIONS: [(&str, &str); 3] = [
    (
        "idx_versioned_resources_storage",
        "CREATE INDEX idx_versioned_resources_storage ON versioned_resources(storage_id)",
    ),
    (
        "idx_versioned_resources_location",
        "CREATE INDEX idx_versioned_resources_location ON versioned_resources(location)",
    ),
    (
        "idx_resource_tags_tag",
        "CREATE INDEX idx_resource_tags_tag ON resource_tags(tag_id)",
    ),
];

/// Contents of the `version_information` row
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SchemaInfo {
    pub schema_version: String,
    pub app_version: String,
    pub created_at: String,
}

/// What initialization had to do to make the cache usable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    /// Every table present at the expected version
    UpToDate,
    /// One or more tables were missing; the schema was created
    Created,
    /// The stored schema version differed; the cache was rebuilt
    Rebuilt,
}

impl Database {
    /// Open (creating if necessary) the cache database in `location`
    ///
    /// The directory is created when missing. If any table is missing or the
    /// stored schema version differs from [`SCHEMA_VERSION`], every table is
    /// dropped and recreated and the lookup tables are seeded again, all in
    /// one transaction.
    pub fn initialize(location: impl AsRef<Path>, registry: &ResourceTypeRegistry) -> Result<Self> {
        let location = location.as_ref();
        std::fs::create_dir_all(location).map_err(|source| ResCacheError::CacheDirectory {
            path: location.to_path_buf(),
            source,
        })?;

        let path = location.join(DATABASE_FILENAME);
        let conn = Connection::open(&path).map_err(|source| ResCacheError::Open {
            path: path.clone(),
            source,
        })?;

        let mut db = Self::from_connection(conn, registry);
        db.path = Some(path);
        db.apply_pragmas()?;
        db.ensure_schema()?;
        Ok(db)
    }

    /// Initialize an in-memory database (for testing)
    pub fn initialize_in_memory(registry: &ResourceTypeRegistry) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| ResCacheError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        let db = Self::from_connection(conn, registry);
        db.apply_pragmas()?;
        db.ensure_schema()?;
        Ok(db)
    }

    fn from_connection(conn: Connection, registry: &ResourceTypeRegistry) -> Self {
        Self {
            conn,
            registry: registry.clone(),
            localizer: Arc::new(Passthrough),
            path: None,
        }
    }

    /// Use `localizer` to derive resource tooltips
    pub fn with_localizer(mut self, localizer: impl Localizer + 'static) -> Self {
        self.localizer = Arc::new(localizer);
        self
    }

    /// Path of the database file, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn registry(&self) -> &ResourceTypeRegistry {
        &self.registry
    }

    fn apply_pragmas(&self) -> Result<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Verify the schema, (re)building it when needed
    fn ensure_schema(&self) -> Result<SchemaState> {
        let present = self.table_names()?;
        let all_present = TABLES.iter().all(|t| present.iter().any(|p| p == t));

        let mut outdated = false;
        if present.iter().any(|t| t == "version_information") {
            match self.schema_info() {
                Ok(Some(info)) => {
                    tracing::info!(
                        "Database version {} created by {} at {}",
                        info.schema_version,
                        info.app_version,
                        info.created_at
                    );
                    if info.schema_version != SCHEMA_VERSION {
                        tracing::warn!(
                            "Database schema {} is outdated (expected {}), rebuilding cache",
                            info.schema_version,
                            SCHEMA_VERSION
                        );
                        outdated = true;
                    }
                }
                Ok(None) => {
                    tracing::warn!("Database has no version information, rebuilding cache");
                    outdated = true;
                }
                Err(e) => {
                    tracing::warn!("Could not read version information ({}), rebuilding cache", e);
                    outdated = true;
                }
            }
        }

        if all_present && !outdated {
            tracing::info!("All tables are present and up to date");
            self.sync_resource_types()?;
            return Ok(SchemaState::UpToDate);
        }

        self.rebuild()?;
        Ok(if outdated {
            SchemaState::Rebuilt
        } else {
            SchemaState::Created
        })
    }

    /// Drop and recreate every table, then seed the lookup tables
    fn rebuild(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
        let result = self.rebuild_tables();
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        result
    }

    fn rebuild_tables(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        for table in TABLES.into_iter().rev() {
            tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", table))
                .map_err(|source| ResCacheError::CreateTable { table, source })?;
        }

        for (table, sql) in TABLE_DEFINITIONS {
            tx.execute_batch(sql)
                .map_err(|source| ResCacheError::CreateTable { table, source })?;
            tracing::info!("Created table {}", table);
        }

        for (index, sql) in INDEX_DEFINITIONS {
            tx.execute_batch(sql)
                .map_err(|source| ResCacheError::CreateIndex { index, source })?;
            tracing::info!("Created index {}", index);
        }

        for origin in OriginType::ALL {
            tx.execute(
                "INSERT INTO origin_types (id, name) VALUES (?1, ?2)",
                params![origin.id(), origin.name()],
            )
            .map_err(|source| ResCacheError::Seed {
                table: "origin_types",
                source,
            })?;
        }
        tracing::info!("Filled lookup table origin_types");

        for name in self.registry.resource_types() {
            tx.execute(
                "INSERT INTO resource_types (name) VALUES (?1)",
                params![name],
            )
            .map_err(|source| ResCacheError::Seed {
                table: "resource_types",
                source,
            })?;
        }
        tracing::info!("Filled lookup table resource_types");

        tx.execute(
            "INSERT INTO version_information (schema_version, app_version, created_at)
             VALUES (?1, ?2, ?3)",
            params![SCHEMA_VERSION, APP_VERSION, Utc::now().to_rfc3339()],
        )
        .map_err(|source| ResCacheError::Seed {
            table: "version_information",
            source,
        })?;
        tracing::info!("Filled version table");

        tx.commit()?;
        Ok(())
    }

    /// Append resource types registered since the cache was created
    fn sync_resource_types(&self) -> Result<usize> {
        let mut added = 0;
        for name in self.registry.resource_types() {
            added += self
                .conn
                .execute(
                    "INSERT OR IGNORE INTO resource_types (name) VALUES (?1)",
                    params![name],
                )
                .map_err(|source| ResCacheError::Seed {
                    table: "resource_types",
                    source,
                })?;
        }
        if added > 0 {
            tracing::info!("Registered {} new resource types", added);
        }
        Ok(added)
    }

    /// Get the stored version information
    pub fn schema_info(&self) -> Result<Option<SchemaInfo>> {
        let info = self
            .conn
            .query_row(
                "SELECT schema_version, app_version, created_at
                 FROM version_information ORDER BY rowid DESC LIMIT 1",
                [],
                |row| {
                    Ok(SchemaInfo {
                        schema_version: row.get(0)?,
                        app_version: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(info)
    }

    /// Names of all user tables, sorted
    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Resource type names known to the cache, in registration order
    pub fn resource_types(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM resource_types ORDER BY id")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }
}

/// Look up a resource type id by name
pub(crate) fn resource_type_id(conn: &Connection, name: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM resource_types WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn count(db: &Database, table: &str) -> i64 {
        db.conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })
            .unwrap()
    }

    #[test]
    fn test_initialize_in_memory() {
        let db = Database::initialize_in_memory(&ResourceTypeRegistry::with_defaults()).unwrap();
        let info = db.schema_info().unwrap().unwrap();
        assert_eq!(info.schema_version, SCHEMA_VERSION);
        assert_eq!(info.app_version, APP_VERSION);
    }

    #[test]
    fn test_fresh_directory_creates_all_tables() {
        let temp = TempDir::new().unwrap();
        let location = temp.path().join("cache").join("nested");
        let db = Database::initialize(&location, &ResourceTypeRegistry::with_defaults()).unwrap();

        assert!(location.join(DATABASE_FILENAME).exists());
        let tables = db.table_names().unwrap();
        for table in TABLES {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
        assert_eq!(count(&db, "origin_types"), 5);
        assert_eq!(count(&db, "version_information"), 1);
        assert_eq!(
            count(&db, "resource_types"),
            ResourceTypeRegistry::with_defaults().len() as i64
        );
    }

    #[test]
    fn test_origin_type_ids_match_enum() {
        let db = Database::initialize_in_memory(&ResourceTypeRegistry::new()).unwrap();
        for origin in OriginType::ALL {
            let name: String = db
                .conn
                .query_row(
                    "SELECT name FROM origin_types WHERE id = ?1",
                    params![origin.id()],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(name, origin.name());
        }
    }

    #[test]
    fn test_initialize_twice_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let registry = ResourceTypeRegistry::with_defaults();

        let first = Database::initialize(temp.path(), &registry).unwrap();
        let created_at = first.schema_info().unwrap().unwrap().created_at;
        let types = first.resource_types().unwrap();
        drop(first);

        let second = Database::initialize(temp.path(), &registry).unwrap();
        assert_eq!(count(&second, "origin_types"), 5);
        assert_eq!(count(&second, "version_information"), 1);
        assert_eq!(second.resource_types().unwrap(), types);
        assert_eq!(second.schema_info().unwrap().unwrap().created_at, created_at);
        assert_eq!(second.ensure_schema().unwrap(), SchemaState::UpToDate);
    }

    #[test]
    fn test_schema_version_mismatch_rebuilds() {
        let temp = TempDir::new().unwrap();
        let registry = ResourceTypeRegistry::with_defaults();

        let db = Database::initialize(temp.path(), &registry).unwrap();
        db.conn
            .execute(
                "INSERT INTO storages (origin_type_id, location, timestamp) VALUES (1, '/old', 0)",
                [],
            )
            .unwrap();
        db.conn
            .execute("UPDATE version_information SET schema_version = '0.0.0'", [])
            .unwrap();
        assert_eq!(db.ensure_schema().unwrap(), SchemaState::Rebuilt);

        assert_eq!(count(&db, "storages"), 0);
        assert_eq!(count(&db, "origin_types"), 5);
        assert_eq!(count(&db, "version_information"), 1);
        assert_eq!(
            db.schema_info().unwrap().unwrap().schema_version,
            SCHEMA_VERSION
        );
    }

    #[test]
    fn test_missing_table_recreates_schema() {
        let db = Database::initialize_in_memory(&ResourceTypeRegistry::with_defaults()).unwrap();
        db.conn.execute_batch("DROP TABLE resource_tags").unwrap();
        assert_eq!(db.ensure_schema().unwrap(), SchemaState::Created);
        assert!(db.table_names().unwrap().contains(&"resource_tags".to_string()));
        assert_eq!(count(&db, "origin_types"), 5);
    }

    #[test]
    fn test_new_resource_types_are_appended() {
        let temp = TempDir::new().unwrap();
        let mut registry = ResourceTypeRegistry::new();
        registry.register("brushes", &["*.gbr"]).unwrap();
        drop(Database::initialize(temp.path(), &registry).unwrap());

        registry.register("symbols", &["*.svg"]).unwrap();
        let db = Database::initialize(temp.path(), &registry).unwrap();
        assert_eq!(
            db.resource_types().unwrap(),
            vec!["brushes".to_string(), "symbols".to_string()]
        );
    }

    #[test]
    fn test_unopenable_database_file() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(DATABASE_FILENAME)).unwrap();
        let err = Database::initialize(temp.path(), &ResourceTypeRegistry::new())
            .err()
            .unwrap();
        assert!(err.is_initialization(), "unexpected error: {}", err);
    }

    #[test]
    fn test_uncreatable_cache_directory() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("not-a-dir");
        std::fs::write(&file, "x").unwrap();
        let err = Database::initialize(file.join("cache"), &ResourceTypeRegistry::new())
            .err()
            .unwrap();
        assert!(matches!(err, ResCacheError::CacheDirectory { .. }));
    }
}
