//! In-memory storage
//!
//! Holds resources and tags supplied by the embedding application directly,
//! with any origin type. Also the storage of choice in tests.

use super::{
    OriginType, Resource, ResourceEntry, ResourceIter, ResourceStorage, Tag, TagEntry, TagIter,
};
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Storage backed by in-process collections
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    location: String,
    origin_type: OriginType,
    timestamp: DateTime<Utc>,
    resources: BTreeMap<String, Vec<ResourceEntry>>,
    tags: BTreeMap<String, Vec<Tag>>,
}

impl MemoryStorage {
    pub fn new(location: &str, origin_type: OriginType, timestamp: DateTime<Utc>) -> Self {
        Self {
            location: location.to_string(),
            origin_type,
            timestamp,
            resources: BTreeMap::new(),
            tags: BTreeMap::new(),
        }
    }

    /// Add (or replace) a resource of `resource_type`
    pub fn with_resource(
        mut self,
        resource_type: &str,
        resource: Resource,
        last_modified: DateTime<Utc>,
    ) -> Self {
        self.put_resource(resource_type, resource, last_modified);
        self
    }

    /// Add a raw enumerator entry, e.g. one whose resource failed to load
    pub fn with_entry(mut self, entry: ResourceEntry) -> Self {
        self.push_entry(entry);
        self
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags
            .entry(tag.resource_type.clone())
            .or_default()
            .push(tag);
        self
    }

    /// Add or replace a resource in place, keyed by filename
    pub fn put_resource(
        &mut self,
        resource_type: &str,
        resource: Resource,
        last_modified: DateTime<Utc>,
    ) {
        self.push_entry(ResourceEntry::new(resource_type, resource, last_modified));
    }

    /// Remove a resource by filename; returns whether it was present
    pub fn remove_resource(&mut self, resource_type: &str, filename: &str) -> bool {
        match self.resources.get_mut(resource_type) {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|e| e.filename != filename);
                entries.len() != before
            }
            None => false,
        }
    }

    pub fn set_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = timestamp;
    }

    fn push_entry(&mut self, entry: ResourceEntry) {
        let entries = self
            .resources
            .entry(entry.resource_type.clone())
            .or_default();
        entries.retain(|e| e.filename != entry.filename);
        entries.push(entry);
    }
}

impl ResourceStorage for MemoryStorage {
    fn location(&self) -> &str {
        &self.location
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn origin_type(&self) -> OriginType {
        self.origin_type
    }

    fn resources(&self, resource_type: &str) -> Result<ResourceIter<'_>> {
        let entries = self.resources.get(resource_type).into_iter().flatten();
        Ok(Box::new(
            entries.map(|e| -> Result<ResourceEntry> { Ok(e.clone()) }),
        ))
    }

    fn tags(&self, resource_type: &str) -> Result<TagIter<'_>> {
        let location = self.location.clone();
        let tags = self.tags.get(resource_type).into_iter().flatten();
        Ok(Box::new(tags.map(move |tag| -> Result<TagEntry> {
            Ok(TagEntry::new(
                format!("{}#{}", location, tag.url),
                tag.clone(),
            ))
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_memory_storage_replaces_by_filename() {
        let t0 = Utc.timestamp_opt(1_000, 0).unwrap();
        let mut storage = MemoryStorage::new("mem://presets", OriginType::Bundle, t0)
            .with_resource(
                "paintoppresets",
                Resource::from_file("a.kpp", b"one".to_vec()),
                t0,
            );
        storage.put_resource(
            "paintoppresets",
            Resource::from_file("a.kpp", b"two".to_vec()),
            t0,
        );

        let items: Vec<ResourceEntry> = storage
            .resources("paintoppresets")
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].resource.as_ref().unwrap().content, b"two");
        assert_eq!(storage.resources("brushes").unwrap().count(), 0);

        assert!(storage.remove_resource("paintoppresets", "a.kpp"));
        assert!(!storage.remove_resource("paintoppresets", "a.kpp"));
    }

    #[test]
    fn test_memory_storage_tags() {
        let t0 = Utc.timestamp_opt(1_000, 0).unwrap();
        let storage = MemoryStorage::new("mem://tags", OriginType::AdobeBrushLibrary, t0)
            .with_tag(Tag::new("brushes", "soft", "Soft"));
        let tags: Vec<TagEntry> = storage
            .tags("brushes")
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].url(), "soft");
        assert_eq!(storage.origin_type(), OriginType::AdobeBrushLibrary);
    }
}
