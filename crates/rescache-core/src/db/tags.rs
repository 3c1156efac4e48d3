//! Tag indexing

use super::resources::{resource_from_row, resource_id, ResourceRecord, RESOURCE_SELECT};
use super::schema::resource_type_id;
use super::Database;
use crate::error::{ResCacheError, Result};
use crate::storage::{ResourceStorage, Tag};
use rusqlite::{params, Connection, OptionalExtension};

/// Tag info
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TagRecord {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub comment: Option<String>,
    pub resource_type: String,
    pub active: bool,
}

/// Counts from indexing one tag enumerator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct TagScanReport {
    pub tags_added: usize,
    pub links_added: usize,
    pub skipped: usize,
}

impl TagScanReport {
    pub fn merge(&mut self, other: &TagScanReport) {
        self.tags_added += other.tags_added;
        self.links_added += other.links_added;
        self.skipped += other.skipped;
    }
}

fn tag_id(conn: &Connection, url: &str, resource_type: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT t.id FROM tags t
             JOIN resource_types rt ON rt.id = t.resource_type_id
             WHERE t.url = ?1 AND rt.name = ?2",
            params![url, resource_type],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

impl Database {
    /// Whether a tag with this url exists for the resource type
    pub fn has_tag(&self, url: &str, resource_type: &str) -> Result<bool> {
        Ok(tag_id(&self.conn, url, resource_type)?.is_some())
    }

    /// Add a tag; returns false if it already exists
    pub fn add_tag(
        &self,
        resource_type: &str,
        url: &str,
        name: &str,
        comment: &str,
    ) -> Result<bool> {
        if self.has_tag(url, resource_type)? {
            return Ok(false);
        }

        let type_id = resource_type_id(&self.conn, resource_type)?
            .ok_or_else(|| ResCacheError::UnknownResourceType(resource_type.to_string()))?;
        self.conn.execute(
            "INSERT INTO tags (url, name, comment, resource_type_id, active)
             VALUES (?1, ?2, ?3, ?4, 1)",
            params![url, name, comment, type_id],
        )?;
        tracing::debug!("Added tag {} for {}", url, resource_type);
        Ok(true)
    }

    /// Link the resource named `resource_name` to `tag`
    ///
    /// Both sides are looked up by natural key; a miss on either fails
    /// without writing anything. Linking an already linked pair is a no-op.
    pub fn tag_resource(
        &self,
        storage: &dyn ResourceStorage,
        resource_name: &str,
        tag: &Tag,
        resource_type: &str,
    ) -> Result<()> {
        self.link_resource(storage, resource_name, tag, resource_type)?;
        Ok(())
    }

    /// Returns whether a new link row was written
    fn link_resource(
        &self,
        storage: &dyn ResourceStorage,
        resource_name: &str,
        tag: &Tag,
        resource_type: &str,
    ) -> Result<bool> {
        let Some(resource) = resource_id(&self.conn, resource_name, resource_type)? else {
            tracing::warn!(
                "Could not find resource {}/{} from {} to tag with {}",
                resource_type,
                resource_name,
                storage.location(),
                tag.url
            );
            return Err(ResCacheError::ResourceNotFound(format!(
                "{}/{}",
                resource_type, resource_name
            )));
        };

        let Some(tag_id) = tag_id(&self.conn, &tag.url, resource_type)? else {
            tracing::warn!("Could not find tag {} for {}", tag.url, resource_type);
            return Err(ResCacheError::TagNotFound(format!(
                "{}/{}",
                resource_type, tag.url
            )));
        };

        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO resource_tags (resource_id, tag_id) VALUES (?1, ?2)",
            params![resource, tag_id],
        )?;
        Ok(rows > 0)
    }

    /// Index every tag definition `storage` yields for `resource_type`
    ///
    /// New tags are linked to their default resources. Failures are logged
    /// and counted as skipped.
    pub fn add_tags(
        &self,
        storage: &dyn ResourceStorage,
        resource_type: &str,
    ) -> Result<TagScanReport> {
        let mut report = TagScanReport::default();

        for item in storage.tags(resource_type)? {
            let entry = match item {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(
                        "Could not read tag definition in {}: {}",
                        storage.location(),
                        e
                    );
                    report.skipped += 1;
                    continue;
                }
            };

            match self.add_tag(resource_type, entry.url(), entry.name(), entry.comment()) {
                Ok(true) => report.tags_added += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Could not add tag {} from {}: {}", entry.url(), entry.location, e);
                    report.skipped += 1;
                    continue;
                }
            }

            for resource_name in &entry.tag.default_resources {
                match self.link_resource(storage, resource_name, &entry.tag, resource_type) {
                    Ok(true) => report.links_added += 1,
                    Ok(false) => {}
                    Err(_) => report.skipped += 1,
                }
            }
        }

        Ok(report)
    }

    /// Active tags linked to a resource
    pub fn tags_for_resource(&self, resource_id: i64) -> Result<Vec<TagRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.url, t.name, t.comment, rt.name, t.active
             FROM tags t
             JOIN resource_types rt ON rt.id = t.resource_type_id
             JOIN resource_tags l ON l.tag_id = t.id
             WHERE l.resource_id = ?1 AND t.active = 1
             ORDER BY t.name",
        )?;
        let tags = stmt
            .query_map(params![resource_id], |row| {
                Ok(TagRecord {
                    id: row.get(0)?,
                    url: row.get(1)?,
                    name: row.get(2)?,
                    comment: row.get(3)?,
                    resource_type: row.get(4)?,
                    active: row.get::<_, i64>(5)? != 0,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    /// Resources carrying a tag, with their latest versions
    pub fn resources_for_tag(&self, url: &str, resource_type: &str) -> Result<Vec<ResourceRecord>> {
        let sql = format!(
            "{} AND rt.name = ?2 AND r.id IN (
                 SELECT l.resource_id FROM resource_tags l
                 JOIN tags t ON t.id = l.tag_id
                 WHERE t.url = ?1 AND t.resource_type_id = r.resource_type_id
             )
             ORDER BY r.name, r.filename",
            RESOURCE_SELECT
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![url, resource_type], resource_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
