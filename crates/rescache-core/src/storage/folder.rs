//! Folder storage
//!
//! A directory laid out as `<root>/<resource_type>/<file>`, with tag
//! definitions under `<root>/tags/<resource_type>/*.yml`.

use super::{
    modified_time, OriginType, Resource, ResourceEntry, ResourceIter, ResourceStorage, Tag,
    TagEntry, TagIter, TAGS_DIR,
};
use crate::error::{ResCacheError, Result};
use crate::registry::ResourceTypeRegistry;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// File system folder storage
pub struct FolderStorage {
    root: PathBuf,
    location: String,
    registry: ResourceTypeRegistry,
}

impl FolderStorage {
    /// Create new folder storage rooted at `root`
    pub fn new(root: impl AsRef<Path>, registry: ResourceTypeRegistry) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            location: root.to_string_lossy().to_string(),
            root,
            registry,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn walk(dir: PathBuf) -> impl Iterator<Item = walkdir::Result<DirEntry>> {
        WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
    }
}

impl ResourceStorage for FolderStorage {
    fn location(&self) -> &str {
        &self.location
    }

    fn timestamp(&self) -> DateTime<Utc> {
        modified_time(&self.root)
    }

    fn origin_type(&self) -> OriginType {
        OriginType::Folder
    }

    fn resources(&self, resource_type: &str) -> Result<ResourceIter<'_>> {
        let dir = self.root.join(resource_type);
        if !dir.is_dir() {
            return Ok(Box::new(std::iter::empty()));
        }

        let resource_type = resource_type.to_string();
        let iter = Self::walk(dir).filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };
            if !entry.file_type().is_file() {
                return None;
            }

            let filename = entry.file_name().to_string_lossy().to_string();
            if !self.registry.matches(&resource_type, &filename) {
                return None;
            }

            let last_modified = modified_time(entry.path());
            let item = match std::fs::read(entry.path()) {
                Ok(content) => ResourceEntry::new(
                    &resource_type,
                    Resource::from_file(&filename, content),
                    last_modified,
                ),
                Err(e) => {
                    tracing::warn!("Could not load resource {:?}: {}", entry.path(), e);
                    ResourceEntry::unloaded(&resource_type, &filename, last_modified)
                }
            };
            Some(Ok(item))
        });

        Ok(Box::new(iter))
    }

    fn tags(&self, resource_type: &str) -> Result<TagIter<'_>> {
        let dir = self.root.join(TAGS_DIR).join(resource_type);
        if !dir.is_dir() {
            return Ok(Box::new(std::iter::empty()));
        }

        let resource_type = resource_type.to_string();
        let iter = Self::walk(dir).filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };
            if !entry.file_type().is_file() || !is_tag_definition(entry.path()) {
                return None;
            }

            let path = entry.path();
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            let location = format!(
                "{}/{}/{}",
                TAGS_DIR,
                resource_type,
                entry.file_name().to_string_lossy()
            );

            let parsed = std::fs::read_to_string(path)
                .map_err(ResCacheError::from)
                .and_then(|text| Tag::from_yaml(&text, &resource_type, &stem));
            Some(parsed.map(|tag| TagEntry::new(location, tag)))
        });

        Ok(Box::new(iter))
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn is_tag_definition(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml") | Some("yaml")
    )
}
