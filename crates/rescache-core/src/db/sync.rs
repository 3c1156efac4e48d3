//! Storage synchronization

use super::resources::ScanReport;
use super::storages::{delete_storage_rows, insert_storage, storage_id};
use super::tags::TagScanReport;
use super::Database;
use crate::error::{ResCacheError, Result};
use crate::storage::{OriginType, ResourceStorage};
use rusqlite::{params, OptionalExtension};

/// What synchronizing a storage did
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    /// Archive seen for the first time and indexed
    Added,
    /// Archive newer than the cached copy: dropped and indexed again
    Reindexed,
    /// Archive not modified since it was cached
    Unchanged,
    /// Folder scanned resource by resource
    Scanned,
}

/// Result of synchronizing one storage
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SyncReport {
    pub location: String,
    pub origin_type: OriginType,
    pub action: SyncAction,
    pub resources: ScanReport,
    pub tags: TagScanReport,
    /// Folder versions newly flagged deleted because their file is gone
    pub missing: usize,
}

impl SyncReport {
    fn new(storage: &dyn ResourceStorage, action: SyncAction) -> Self {
        Self {
            location: storage.location().to_string(),
            origin_type: storage.origin_type(),
            action,
            resources: ScanReport::default(),
            tags: TagScanReport::default(),
            missing: 0,
        }
    }
}

impl Database {
    /// Bring the cache in line with the current contents of `storage`
    ///
    /// Archives (anything but folders) are atomic: when their timestamp is
    /// newer than the cached one they are dropped and indexed from scratch,
    /// otherwise nothing happens. Folders are always scanned, with per
    /// resource timestamps deciding what gets a new version.
    pub fn synchronize_storage(&self, storage: &dyn ResourceStorage) -> Result<SyncReport> {
        if storage.origin_type().is_folder() {
            self.synchronize_folder(storage)
        } else {
            self.synchronize_archive(storage)
        }
    }

    fn synchronize_archive(&self, storage: &dyn ResourceStorage) -> Result<SyncReport> {
        let location = storage.location();
        let stored: Option<(i64, bool)> = self
            .conn
            .query_row(
                "SELECT timestamp, pre_installed FROM storages WHERE location = ?1",
                params![location],
                |row| Ok((row.get(0)?, row.get::<_, i64>(1)? != 0)),
            )
            .optional()?;

        let action = match stored {
            None => {
                tracing::info!("Adding new storage {}", location);
                self.add_storage(storage, false)?;
                SyncAction::Added
            }
            Some((timestamp, pre_installed)) if storage.timestamp().timestamp() > timestamp => {
                tracing::info!("Storage {} was modified, re-indexing", location);
                let tx = self.conn.unchecked_transaction()?;
                delete_storage_rows(&tx, location)?;
                insert_storage(&tx, storage, pre_installed)?;
                tx.commit()?;
                SyncAction::Reindexed
            }
            Some(_) => {
                tracing::debug!("Storage {} is up to date", location);
                return Ok(SyncReport::new(storage, SyncAction::Unchanged));
            }
        };

        let mut report = SyncReport::new(storage, action);
        if let Err(e) = self.index_storage(storage, &mut report, None) {
            // Forget the storage so the next sync retries it
            tracing::warn!("Could not index storage {}: {}", location, e);
            self.delete_storage(storage)?;
            return Err(e);
        }
        Ok(report)
    }

    fn synchronize_folder(&self, storage: &dyn ResourceStorage) -> Result<SyncReport> {
        self.add_storage(storage, false)?;
        let id = storage_id(&self.conn, storage.location())?
            .ok_or_else(|| ResCacheError::StorageNotFound(storage.location().to_string()))?;

        let mut report = SyncReport::new(storage, SyncAction::Scanned);
        let mut seen = Vec::new();
        self.index_storage(storage, &mut report, Some(&mut seen))?;

        if report.resources.skipped == 0 {
            report.missing = self.flag_missing(id, &seen)?;
        } else {
            tracing::warn!(
                "Skipped {} resources in {}, not checking for removed files",
                report.resources.skipped,
                storage.location()
            );
        }

        self.touch_storage(storage)?;
        Ok(report)
    }

    /// Index resources and tags of every registered type
    fn index_storage(
        &self,
        storage: &dyn ResourceStorage,
        report: &mut SyncReport,
        mut seen: Option<&mut Vec<i64>>,
    ) -> Result<()> {
        for resource_type in self.registry.resource_types() {
            let (resources, ids) = self.scan_resources(storage, &resource_type)?;
            report.resources.merge(&resources);
            if let Some(seen) = seen.as_deref_mut() {
                seen.extend(ids);
            }

            let tags = self.add_tags(storage, &resource_type)?;
            report.tags.merge(&tags);
        }
        Ok(())
    }

    /// Flag versions of resources no longer in the storage as deleted, and
    /// clear the flag on the ones that are back
    fn flag_missing(&self, storage_id: i64, seen: &[i64]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let before: i64 = tx.query_row(
            "SELECT COUNT(*) FROM versioned_resources WHERE storage_id = ?1 AND deleted = 1",
            params![storage_id],
            |row| row.get(0),
        )?;

        tx.execute(
            "UPDATE versioned_resources SET deleted = 1 WHERE storage_id = ?1",
            params![storage_id],
        )?;
        {
            let mut stmt = tx.prepare(
                "UPDATE versioned_resources SET deleted = 0
                 WHERE storage_id = ?1 AND resource_id = ?2",
            )?;
            for id in seen {
                stmt.execute(params![storage_id, id])?;
            }
        }

        let after: i64 = tx.query_row(
            "SELECT COUNT(*) FROM versioned_resources WHERE storage_id = ?1 AND deleted = 1",
            params![storage_id],
            |row| row.get(0),
        )?;
        tx.commit()?;

        let missing = (after - before).max(0) as usize;
        if missing > 0 {
            tracing::info!("{} versions in storage {} are gone", missing, storage_id);
        }
        Ok(missing)
    }
}
