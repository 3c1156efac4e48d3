//! Resource indexing

use super::schema::resource_type_id;
use super::storages::storage_id;
use super::{from_unix, Database};
use crate::error::{ResCacheError, Result};
use crate::storage::{ResourceEntry, ResourceStorage};
use base64::Engine;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Serialize, Serializer};

/// Outcome of indexing a single resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceChange {
    /// First sighting: resource row and version 1 written
    Created { id: i64 },
    /// Newer than the latest stored version: a new version was written
    Versioned { id: i64, version: i64 },
    /// Already up to date, nothing written
    Unchanged { id: i64 },
}

impl ResourceChange {
    pub fn resource_id(&self) -> i64 {
        match *self {
            ResourceChange::Created { id }
            | ResourceChange::Versioned { id, .. }
            | ResourceChange::Unchanged { id } => id,
        }
    }
}

/// Counts from indexing one resource enumerator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub created: usize,
    pub versioned: usize,
    pub unchanged: usize,
    /// Items that failed to load or to be written
    pub skipped: usize,
}

impl ScanReport {
    fn record(&mut self, change: ResourceChange) {
        match change {
            ResourceChange::Created { .. } => self.created += 1,
            ResourceChange::Versioned { .. } => self.versioned += 1,
            ResourceChange::Unchanged { .. } => self.unchanged += 1,
        }
    }

    pub fn merge(&mut self, other: &ScanReport) {
        self.created += other.created;
        self.versioned += other.versioned;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
    }

    /// Number of resources that got a new version row
    pub fn written(&self) -> usize {
        self.created + self.versioned
    }
}

/// A resource together with its latest version
#[derive(Debug, Clone, Serialize)]
pub struct ResourceRecord {
    pub id: i64,
    pub resource_type: String,
    pub name: String,
    pub filename: String,
    pub tooltip: Option<String>,
    #[serde(serialize_with = "as_base64")]
    pub thumbnail: Vec<u8>,
    pub status: i64,
    pub version: i64,
    pub storage_location: String,
    pub location: String,
    pub timestamp: DateTime<Utc>,
    pub deleted: bool,
    pub checksum: String,
}

/// One stored version of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionRecord {
    pub version: i64,
    pub storage_location: String,
    pub location: String,
    pub timestamp: DateTime<Utc>,
    pub deleted: bool,
    pub checksum: String,
}

fn as_base64<S: Serializer>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
}

pub(crate) const RESOURCE_SELECT: &str = "
    SELECT r.id, rt.name, r.name, r.filename, r.tooltip, r.thumbnail, r.status,
           v.version, s.location, v.location, v.timestamp, v.deleted, v.checksum
    FROM resources r
    JOIN resource_types rt ON rt.id = r.resource_type_id
    JOIN versioned_resources v ON v.resource_id = r.id
    JOIN storages s ON s.id = v.storage_id
    WHERE v.version = (SELECT MAX(version) FROM versioned_resources WHERE resource_id = r.id)";

pub(crate) fn resource_from_row(row: &Row) -> rusqlite::Result<ResourceRecord> {
    Ok(ResourceRecord {
        id: row.get(0)?,
        resource_type: row.get(1)?,
        name: row.get(2)?,
        filename: row.get(3)?,
        tooltip: row.get(4)?,
        thumbnail: row.get::<_, Option<Vec<u8>>>(5)?.unwrap_or_default(),
        status: row.get(6)?,
        version: row.get(7)?,
        storage_location: row.get(8)?,
        location: row.get(9)?,
        timestamp: from_unix(row.get(10)?),
        deleted: row.get::<_, i64>(11)? != 0,
        checksum: row.get(12)?,
    })
}

/// Look up a resource id by its natural key
pub(crate) fn resource_id(
    conn: &Connection,
    filename: &str,
    resource_type: &str,
) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT r.id FROM resources r
             JOIN resource_types rt ON rt.id = r.resource_type_id
             WHERE r.filename = ?1 AND rt.name = ?2",
            params![filename, resource_type],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Latest (version, timestamp) stored for a resource
fn latest_version(conn: &Connection, id: i64) -> Result<Option<(i64, i64)>> {
    let latest = conn
        .query_row(
            "SELECT version, timestamp FROM versioned_resources
             WHERE resource_id = ?1 ORDER BY version DESC LIMIT 1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(latest)
}

/// Whether `timestamp` is strictly newer than the latest stored version
fn needs_updating(conn: &Connection, id: i64, timestamp: DateTime<Utc>) -> Result<bool> {
    match latest_version(conn, id)? {
        Some((_, stored)) => Ok(timestamp.timestamp() > stored),
        None => {
            tracing::warn!(
                "Inconsistent database: could not find a version for resource {}",
                id
            );
            Ok(false)
        }
    }
}

impl Database {
    /// Find the id of the resource with this file name and type
    pub fn resource_id_for_resource(
        &self,
        filename: &str,
        resource_type: &str,
    ) -> Result<Option<i64>> {
        resource_id(&self.conn, filename, resource_type)
    }

    /// Whether `timestamp` is strictly newer than the resource's latest version
    ///
    /// A resource without any version is reported as not needing an update.
    pub fn resource_needs_updating(&self, id: i64, timestamp: DateTime<Utc>) -> Result<bool> {
        needs_updating(&self.conn, id, timestamp)
    }

    /// Index one resource found in `storage`
    ///
    /// A new resource gets a resource row and version 1. A known resource
    /// gets a new version only when `timestamp` is newer than its latest
    /// version. That refreshes the name, tooltip and thumbnail; the filename
    /// is the lookup key, so it already matches. All writes happen in a
    /// single transaction.
    pub fn add_resource(
        &self,
        storage: &dyn ResourceStorage,
        timestamp: DateTime<Utc>,
        entry: &ResourceEntry,
        resource_type: &str,
    ) -> Result<ResourceChange> {
        let resource = match &entry.resource {
            Some(resource) if resource.valid => resource,
            _ => {
                tracing::warn!("Could not load resource {}", entry.location);
                return Err(ResCacheError::InvalidResource(entry.location.clone()));
            }
        };

        let tx = self.conn.unchecked_transaction()?;
        let storage_id = storage_id(&tx, storage.location())?
            .ok_or_else(|| ResCacheError::StorageNotFound(storage.location().to_string()))?;
        let checksum = resource.checksum();

        let change = match resource_id(&tx, &resource.filename, resource_type)? {
            Some(id) => {
                if !needs_updating(&tx, id, timestamp)? {
                    return Ok(ResourceChange::Unchanged { id });
                }
                let (latest, _) = latest_version(&tx, id)?.unwrap_or((0, 0));
                let version = latest + 1;

                tx.execute(
                    "UPDATE resources SET name = ?2, tooltip = ?3, thumbnail = ?4 WHERE id = ?1",
                    params![
                        id,
                        resource.name,
                        self.localizer.tooltip(&resource.name),
                        resource.thumbnail
                    ],
                )?;
                insert_version(&tx, id, storage_id, version, entry, timestamp, &checksum)?;
                tracing::debug!("Resource {} is now at version {}", entry.location, version);
                ResourceChange::Versioned { id, version }
            }
            None => {
                let type_id = resource_type_id(&tx, resource_type)?
                    .ok_or_else(|| ResCacheError::UnknownResourceType(resource_type.to_string()))?;
                tx.execute(
                    "INSERT INTO resources (resource_type_id, name, filename, tooltip, thumbnail, status)
                     VALUES (?1, ?2, ?3, ?4, ?5, 1)",
                    params![
                        type_id,
                        resource.name,
                        resource.filename,
                        self.localizer.tooltip(&resource.name),
                        resource.thumbnail
                    ],
                )?;
                let id = tx.last_insert_rowid();
                insert_version(&tx, id, storage_id, 1, entry, timestamp, &checksum)?;
                tracing::debug!("Added resource {}", entry.location);
                ResourceChange::Created { id }
            }
        };

        tx.commit()?;
        Ok(change)
    }

    /// Index every resource `storage` yields for `resource_type`
    ///
    /// Items that fail to load or to be written are logged and counted as
    /// skipped; the scan continues with the next item.
    pub fn add_resources(
        &self,
        storage: &dyn ResourceStorage,
        resource_type: &str,
    ) -> Result<ScanReport> {
        let (report, _) = self.scan_resources(storage, resource_type)?;
        Ok(report)
    }

    /// Like [`Database::add_resources`], also returning the ids of every
    /// resource the storage still holds
    pub(crate) fn scan_resources(
        &self,
        storage: &dyn ResourceStorage,
        resource_type: &str,
    ) -> Result<(ScanReport, Vec<i64>)> {
        let mut report = ScanReport::default();
        let mut seen = Vec::new();

        for item in storage.resources(resource_type)? {
            let entry = match item {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(
                        "Could not enumerate {} in {}: {}",
                        resource_type,
                        storage.location(),
                        e
                    );
                    report.skipped += 1;
                    continue;
                }
            };

            match self.add_resource(storage, entry.last_modified, &entry, &entry.resource_type) {
                Ok(change) => {
                    report.record(change);
                    seen.push(change.resource_id());
                }
                Err(e) => {
                    tracing::warn!("Could not add resource {} to the cache: {}", entry.location, e);
                    report.skipped += 1;
                }
            }
        }

        tracing::info!(
            "Indexed {} from {}: {} new, {} updated, {} unchanged, {} skipped",
            resource_type,
            storage.location(),
            report.created,
            report.versioned,
            report.unchanged,
            report.skipped
        );
        Ok((report, seen))
    }

    /// Get a resource with its latest version
    pub fn get_resource(&self, id: i64) -> Result<Option<ResourceRecord>> {
        let sql = format!("{} AND r.id = ?1", RESOURCE_SELECT);
        let record = self
            .conn
            .query_row(&sql, params![id], resource_from_row)
            .optional()?;
        Ok(record)
    }

    /// Current resources of one type, skipping those whose latest version
    /// is marked deleted
    pub fn latest_resources(&self, resource_type: &str) -> Result<Vec<ResourceRecord>> {
        let sql = format!(
            "{} AND rt.name = ?1 AND v.deleted = 0 ORDER BY r.name, r.filename",
            RESOURCE_SELECT
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![resource_type], resource_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Every stored version of a resource, oldest first
    pub fn resource_versions(&self, id: i64) -> Result<Vec<VersionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT v.version, s.location, v.location, v.timestamp, v.deleted, v.checksum
             FROM versioned_resources v
             JOIN storages s ON s.id = v.storage_id
             WHERE v.resource_id = ?1
             ORDER BY v.version",
        )?;
        let versions = stmt
            .query_map(params![id], |row| {
                Ok(VersionRecord {
                    version: row.get(0)?,
                    storage_location: row.get(1)?,
                    location: row.get(2)?,
                    timestamp: from_unix(row.get(3)?),
                    deleted: row.get::<_, i64>(4)? != 0,
                    checksum: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(versions)
    }
}

fn insert_version(
    conn: &Connection,
    resource_id: i64,
    storage_id: i64,
    version: i64,
    entry: &ResourceEntry,
    timestamp: DateTime<Utc>,
    checksum: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO versioned_resources (resource_id, storage_id, version, location, timestamp, deleted, checksum)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        params![
            resource_id,
            storage_id,
            version,
            entry.location,
            timestamp.timestamp(),
            checksum
        ],
    )?;
    Ok(())
}
