//! Bundle storage
//!
//! A zip archive with the same internal layout as a folder storage. Bundles
//! are atomic: every entry shares the archive's modification time.

use super::{
    modified_time, OriginType, Resource, ResourceEntry, ResourceIter, ResourceStorage, Tag,
    TagEntry, TagIter, TAGS_DIR,
};
use crate::error::{ResCacheError, Result};
use crate::registry::ResourceTypeRegistry;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// File extensions recognised as bundles
pub const BUNDLE_EXTENSIONS: &[&str] = &["bundle", "zip"];

/// Zip archive storage
pub struct BundleStorage {
    path: PathBuf,
    location: String,
    registry: ResourceTypeRegistry,
}

impl BundleStorage {
    /// Create new bundle storage for the archive at `path`
    pub fn new(path: impl AsRef<Path>, registry: ResourceTypeRegistry) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            location: path.to_string_lossy().to_string(),
            path,
            registry,
        }
    }

    /// Whether `path` looks like a bundle file
    pub fn is_bundle(path: &Path) -> bool {
        path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| BUNDLE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                .unwrap_or(false)
    }

    fn open(&self) -> Result<ZipArchive<File>> {
        Ok(ZipArchive::new(File::open(&self.path)?)?)
    }

    /// Sorted names of the file entries directly under `dir/`
    fn entries_in(archive: &ZipArchive<File>, dir: &str) -> Vec<String> {
        let prefix = format!("{}/", dir);
        let mut names: Vec<String> = archive
            .file_names()
            .filter(|name| {
                name.strip_prefix(&prefix)
                    .map(|rest| !rest.is_empty() && !rest.contains('/') && !rest.starts_with('.'))
                    .unwrap_or(false)
            })
            .map(str::to_string)
            .collect();
        names.sort();
        names
    }
}

impl ResourceStorage for BundleStorage {
    fn location(&self) -> &str {
        &self.location
    }

    fn timestamp(&self) -> DateTime<Utc> {
        modified_time(&self.path)
    }

    fn origin_type(&self) -> OriginType {
        OriginType::Bundle
    }

    fn resources(&self, resource_type: &str) -> Result<ResourceIter<'_>> {
        let archive = self.open()?;
        let names: Vec<String> = Self::entries_in(&archive, resource_type)
            .into_iter()
            .filter(|name| self.registry.matches(resource_type, file_name(name)))
            .collect();

        Ok(Box::new(BundleEntries {
            archive,
            names: names.into_iter(),
            resource_type: resource_type.to_string(),
            last_modified: self.timestamp(),
        }))
    }

    fn tags(&self, resource_type: &str) -> Result<TagIter<'_>> {
        let mut archive = self.open()?;
        let dir = format!("{}/{}", TAGS_DIR, resource_type);
        let names: Vec<String> = Self::entries_in(&archive, &dir)
            .into_iter()
            .filter(|name| name.ends_with(".yml") || name.ends_with(".yaml"))
            .collect();

        let resource_type = resource_type.to_string();
        let iter = names.into_iter().map(move |name| -> Result<TagEntry> {
            let text = read_entry(&mut archive, &name)?;
            let text = String::from_utf8(text).map_err(|e| {
                ResCacheError::Config(format!("Tag definition {} is not UTF-8: {}", name, e))
            })?;
            let stem = file_name(&name)
                .rsplit_once('.')
                .map(|(stem, _)| stem.to_string())
                .unwrap_or_default();
            let tag = Tag::from_yaml(&text, &resource_type, &stem)?;
            Ok(TagEntry::new(name, tag))
        });

        Ok(Box::new(iter))
    }
}

/// Lazily reads resource entries out of an open archive
struct BundleEntries {
    archive: ZipArchive<File>,
    names: std::vec::IntoIter<String>,
    resource_type: String,
    last_modified: DateTime<Utc>,
}

impl Iterator for BundleEntries {
    type Item = Result<ResourceEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let name = self.names.next()?;
        let filename = file_name(&name).to_string();
        let entry = match read_entry(&mut self.archive, &name) {
            Ok(content) => ResourceEntry::new(
                &self.resource_type,
                Resource::from_file(&filename, content),
                self.last_modified,
            ),
            Err(e) => {
                tracing::warn!("Could not load resource {} from bundle: {}", name, e);
                ResourceEntry::unloaded(&self.resource_type, &filename, self.last_modified)
            }
        };
        Some(Ok(entry))
    }
}

fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> Result<Vec<u8>> {
    let mut file = archive.by_name(name)?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    Ok(buffer)
}

fn file_name(entry: &str) -> &str {
    entry.rsplit('/').next().unwrap_or(entry)
}
