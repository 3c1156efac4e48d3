//! Storage operations

use super::{from_unix, Database};
use crate::error::Result;
use crate::storage::{OriginType, ResourceStorage};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

/// Storage info
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StorageRecord {
    pub id: i64,
    pub location: String,
    pub origin_type: OriginType,
    pub timestamp: DateTime<Utc>,
    pub pre_installed: bool,
    pub active: bool,
    pub resource_count: usize,
}

const STORAGE_SELECT: &str = "
    SELECT s.id, s.location, s.origin_type_id, s.timestamp, s.pre_installed, s.active,
           (SELECT COUNT(DISTINCT v.resource_id) FROM versioned_resources v WHERE v.storage_id = s.id)
    FROM storages s";

fn storage_from_row(row: &rusqlite::Row) -> rusqlite::Result<StorageRecord> {
    Ok(StorageRecord {
        id: row.get(0)?,
        location: row.get(1)?,
        origin_type: OriginType::from_id(row.get(2)?),
        timestamp: from_unix(row.get(3)?),
        pre_installed: row.get::<_, i64>(4)? != 0,
        active: row.get::<_, i64>(5)? != 0,
        resource_count: row.get::<_, i64>(6)? as usize,
    })
}

/// Look up a storage id by location
pub(crate) fn storage_id(conn: &Connection, location: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM storages WHERE location = ?1",
            params![location],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Insert the storage row unless one exists for the location
pub(crate) fn insert_storage(
    conn: &Connection,
    storage: &dyn ResourceStorage,
    pre_installed: bool,
) -> Result<bool> {
    if storage_id(conn, storage.location())?.is_some() {
        tracing::debug!("Storage {} is already registered", storage.location());
        return Ok(false);
    }

    conn.execute(
        "INSERT INTO storages (origin_type_id, location, timestamp, pre_installed, active)
         VALUES (?1, ?2, ?3, ?4, 1)",
        params![
            storage.origin_type().id(),
            storage.location(),
            storage.timestamp().timestamp(),
            pre_installed
        ],
    )?;
    tracing::info!(
        "Registered {} storage {}",
        storage.origin_type(),
        storage.location()
    );
    Ok(true)
}

/// Remove a storage and every resource it holds a version of
///
/// Such resources go with all of their versions, from any storage, and their
/// tag links. Version numbers of the resources that remain stay contiguous.
pub(crate) fn delete_storage_rows(conn: &Connection, location: &str) -> Result<bool> {
    let Some(id) = storage_id(conn, location)? else {
        return Ok(false);
    };

    const HELD: &str = "SELECT resource_id FROM versioned_resources WHERE storage_id = ?1";
    conn.execute(
        &format!("DELETE FROM resource_tags WHERE resource_id IN ({})", HELD),
        params![id],
    )?;
    let versions = conn.execute(
        &format!("DELETE FROM versioned_resources WHERE resource_id IN ({})", HELD),
        params![id],
    )?;
    let resources = conn.execute(
        "DELETE FROM resources
         WHERE id NOT IN (SELECT resource_id FROM versioned_resources)",
        [],
    )?;
    conn.execute("DELETE FROM storages WHERE id = ?1", params![id])?;

    tracing::info!(
        "Removed storage {} ({} versions, {} resources)",
        location,
        versions,
        resources
    );
    Ok(true)
}

impl Database {
    /// Register a storage; returns false if its location is already known
    pub fn add_storage(&self, storage: &dyn ResourceStorage, pre_installed: bool) -> Result<bool> {
        insert_storage(&self.conn, storage, pre_installed)
    }

    /// Remove a storage and the resources it holds
    pub fn delete_storage(&self, storage: &dyn ResourceStorage) -> Result<bool> {
        self.delete_storage_at(storage.location())
    }

    /// Remove the storage registered at `location`
    pub fn delete_storage_at(&self, location: &str) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let removed = delete_storage_rows(&tx, location)?;
        tx.commit()?;
        Ok(removed)
    }

    /// Remove every storage whose location is not in `live_locations`
    pub fn prune_storages(&self, live_locations: &[String]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let known: Vec<String> = {
            let mut stmt = tx.prepare("SELECT location FROM storages ORDER BY id")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        let mut pruned = 0;
        for location in known.iter().filter(|l| !live_locations.contains(l)) {
            if delete_storage_rows(&tx, location)? {
                pruned += 1;
            }
        }
        tx.commit()?;

        if pruned > 0 {
            tracing::info!("Pruned {} stale storages", pruned);
        }
        Ok(pruned)
    }

    /// Get a storage by location
    pub fn get_storage(&self, location: &str) -> Result<Option<StorageRecord>> {
        let sql = format!("{} WHERE s.location = ?1", STORAGE_SELECT);
        let record = self
            .conn
            .query_row(&sql, params![location], storage_from_row)
            .optional()?;
        Ok(record)
    }

    /// List all storages, in registration order
    pub fn list_storages(&self) -> Result<Vec<StorageRecord>> {
        let sql = format!("{} ORDER BY s.id", STORAGE_SELECT);
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map([], storage_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Mark a registered storage as shipped with the application (or not)
    pub fn set_pre_installed(&self, location: &str, pre_installed: bool) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE storages SET pre_installed = ?2 WHERE location = ?1",
            params![location, pre_installed],
        )?;
        Ok(rows > 0)
    }

    /// Record the storage's current timestamp
    pub(crate) fn touch_storage(&self, storage: &dyn ResourceStorage) -> Result<()> {
        self.conn.execute(
            "UPDATE storages SET timestamp = ?2 WHERE location = ?1",
            params![storage.location(), storage.timestamp().timestamp()],
        )?;
        Ok(())
    }
}
