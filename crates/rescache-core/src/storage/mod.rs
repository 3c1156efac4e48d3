//! Resource storage abstraction
//!
//! A storage is a configured origin of resources:
//! - Folders (edited file by file, scanned per resource)
//! - Bundles (zip archives, treated as atomic units)
//! - Brush and style libraries (opaque single-file containers)
//!
//! Each storage implements the ResourceStorage trait, exposing lazy,
//! forward-only enumerators of its resources and tags. A scan consumes an
//! enumerator once; a re-scan asks the storage for a fresh one.

use crate::error::{ResCacheError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::SystemTime;

pub mod bundle;
pub mod folder;
pub mod memory;

pub use bundle::BundleStorage;
pub use folder::FolderStorage;
pub use memory::MemoryStorage;

/// Directory (inside a storage) holding tag definitions
pub const TAGS_DIR: &str = "tags";

/// Kind of storage a resource came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OriginType {
    Unknown = 0,
    Folder = 1,
    Bundle = 2,
    AdobeBrushLibrary = 3,
    AdobeStyleLibrary = 4,
}

impl OriginType {
    /// All origin types, in lookup-table order
    pub const ALL: [OriginType; 5] = [
        OriginType::Unknown,
        OriginType::Folder,
        OriginType::Bundle,
        OriginType::AdobeBrushLibrary,
        OriginType::AdobeStyleLibrary,
    ];

    /// Row id in the `origin_types` table
    pub fn id(self) -> i64 {
        self as i64
    }

    pub fn name(self) -> &'static str {
        match self {
            OriginType::Unknown => "UNKNOWN",
            OriginType::Folder => "FOLDER",
            OriginType::Bundle => "BUNDLE",
            OriginType::AdobeBrushLibrary => "ADOBE_BRUSH_LIBRARY",
            OriginType::AdobeStyleLibrary => "ADOBE_STYLE_LIBRARY",
        }
    }

    /// Origin type for a stored id; unknown ids map to `Unknown`
    pub fn from_id(id: i64) -> Self {
        Self::ALL
            .into_iter()
            .find(|t| t.id() == id)
            .unwrap_or(OriginType::Unknown)
    }

    /// Folders are scanned per resource; everything else is an atomic archive
    pub fn is_folder(self) -> bool {
        self == OriginType::Folder
    }
}

impl std::fmt::Display for OriginType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Hash resource content using SHA-256
pub fn hash_content(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// A loaded resource
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// Display name (file stem for file-based storages)
    pub name: String,

    /// File name, unique per resource type
    pub filename: String,

    /// Raw file content
    pub content: Vec<u8>,

    /// Encoded preview image
    pub thumbnail: Vec<u8>,

    /// Whether the loader could make sense of the content
    pub valid: bool,
}

impl Resource {
    /// Create new resource; empty content is treated as invalid
    pub fn new(name: String, filename: String, content: Vec<u8>) -> Self {
        let valid = !content.is_empty();
        Self {
            name,
            filename,
            content,
            thumbnail: Vec::new(),
            valid,
        }
    }

    /// Build a resource from a file name and its bytes
    ///
    /// PNG files double as their own thumbnail.
    pub fn from_file(filename: &str, content: Vec<u8>) -> Self {
        let name = Path::new(filename)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| filename.to_string());
        let is_png = filename.to_lowercase().ends_with(".png");
        let thumbnail = if is_png { content.clone() } else { Vec::new() };
        Self::new(name, filename.to_string(), content).with_thumbnail(thumbnail)
    }

    pub fn with_thumbnail(mut self, thumbnail: Vec<u8>) -> Self {
        self.thumbnail = thumbnail;
        self
    }

    pub fn invalid(mut self) -> Self {
        self.valid = false;
        self
    }

    /// Content checksum stored with each version
    pub fn checksum(&self) -> String {
        hash_content(&self.content)
    }
}

/// One item yielded by a resource enumerator
#[derive(Debug, Clone)]
pub struct ResourceEntry {
    /// File name of the resource
    pub filename: String,

    /// Path of the resource relative to the storage root
    pub location: String,

    /// Resource type the entry was enumerated for
    pub resource_type: String,

    /// Last modification time of the resource
    pub last_modified: DateTime<Utc>,

    /// Loaded resource; `None` if the loader failed
    pub resource: Option<Resource>,
}

impl ResourceEntry {
    /// Create an entry for a loaded resource stored at `<resource_type>/<filename>`
    pub fn new(resource_type: &str, resource: Resource, last_modified: DateTime<Utc>) -> Self {
        Self {
            filename: resource.filename.clone(),
            location: format!("{}/{}", resource_type, resource.filename),
            resource_type: resource_type.to_string(),
            last_modified,
            resource: Some(resource),
        }
    }

    /// Create an entry whose resource could not be loaded
    pub fn unloaded(resource_type: &str, filename: &str, last_modified: DateTime<Utc>) -> Self {
        Self {
            filename: filename.to_string(),
            location: format!("{}/{}", resource_type, filename),
            resource_type: resource_type.to_string(),
            last_modified,
            resource: None,
        }
    }
}

/// A tag with the resources it applies to when first created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Natural key, together with the resource type
    pub url: String,

    pub name: String,

    #[serde(default)]
    pub comment: String,

    #[serde(default)]
    pub resource_type: String,

    /// File names of the resources the tag is applied to while indexing
    #[serde(default)]
    pub default_resources: Vec<String>,
}

impl Tag {
    pub fn new(resource_type: &str, url: &str, name: &str) -> Self {
        Self {
            url: url.to_string(),
            name: name.to_string(),
            comment: String::new(),
            resource_type: resource_type.to_string(),
            default_resources: Vec::new(),
        }
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }

    pub fn with_default_resources(mut self, resources: &[&str]) -> Self {
        self.default_resources = resources.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Parse a YAML tag definition
    ///
    /// `url` and `name` fall back to `fallback` (the definition's file stem)
    /// when absent; the resource type always comes from where the
    /// definition was found.
    pub fn from_yaml(text: &str, resource_type: &str, fallback: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct TagFile {
            url: Option<String>,
            name: Option<String>,
            #[serde(default)]
            comment: String,
            #[serde(default)]
            default_resources: Vec<String>,
        }

        let file: TagFile = serde_yaml::from_str(text)?;
        let url = file.url.unwrap_or_else(|| fallback.to_string());
        if url.trim().is_empty() {
            return Err(ResCacheError::Config(format!(
                "Tag definition {} has an empty url",
                fallback
            )));
        }
        Ok(Self {
            name: file.name.unwrap_or_else(|| url.clone()),
            url,
            comment: file.comment,
            resource_type: resource_type.to_string(),
            default_resources: file.default_resources,
        })
    }
}

/// One item yielded by a tag enumerator
#[derive(Debug, Clone)]
pub struct TagEntry {
    /// Where the definition was found, relative to the storage root
    pub location: String,
    pub tag: Tag,
}

impl TagEntry {
    pub fn new(location: String, tag: Tag) -> Self {
        Self { location, tag }
    }

    pub fn url(&self) -> &str {
        &self.tag.url
    }

    pub fn name(&self) -> &str {
        &self.tag.name
    }

    pub fn comment(&self) -> &str {
        &self.tag.comment
    }
}

/// Lazy, forward-only resource enumerator
pub type ResourceIter<'a> = Box<dyn Iterator<Item = Result<ResourceEntry>> + 'a>;

/// Lazy, forward-only tag enumerator
pub type TagIter<'a> = Box<dyn Iterator<Item = Result<TagEntry>> + 'a>;

/// Resource storage trait - all resource origins must implement this
pub trait ResourceStorage {
    /// Natural key of the storage (path or identifier)
    fn location(&self) -> &str;

    /// Last modification time of the storage as a whole
    fn timestamp(&self) -> DateTime<Utc>;

    fn origin_type(&self) -> OriginType;

    /// Enumerate the resources of one type
    fn resources(&self, resource_type: &str) -> Result<ResourceIter<'_>>;

    /// Enumerate the tag definitions of one type
    fn tags(&self, resource_type: &str) -> Result<TagIter<'_>>;
}

/// Modification time of a filesystem entry, or the epoch if unavailable
pub(crate) fn modified_time(path: &Path) -> DateTime<Utc> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| DateTime::<Utc>::from(SystemTime::UNIX_EPOCH))
}
