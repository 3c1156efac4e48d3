//! Configuration management

use crate::error::{ResCacheError, Result};
use crate::registry::ResourceTypeRegistry;
use crate::storage::{BundleStorage, FolderStorage, ResourceStorage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable overriding the cache directory
pub const CACHE_DIR_ENV: &str = "RESCACHE_CACHE_DIR";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Directory holding the cache database
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Storages kept in sync with the cache
    #[serde(default)]
    pub storages: Vec<StorageConfig>,

    /// Resource types and their file patterns, replacing the defaults when set
    #[serde(default)]
    pub resource_types: BTreeMap<String, Vec<String>>,
}

/// Kind of a configured storage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Folder,
    Bundle,
}

/// Per-storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Folder path or bundle file
    pub location: PathBuf,

    #[serde(default)]
    pub kind: StorageKind,

    /// Shipped with the application rather than installed by the user
    #[serde(default)]
    pub pre_installed: bool,
}

impl StorageConfig {
    /// Guess the storage kind from what is on disk
    pub fn detect(location: impl AsRef<Path>) -> Self {
        let location = location.as_ref().to_path_buf();
        let kind = if BundleStorage::is_bundle(&location) {
            StorageKind::Bundle
        } else {
            StorageKind::Folder
        };
        Self {
            location,
            kind,
            pre_installed: false,
        }
    }

    /// Location string the cache uses as the storage key
    pub fn key(&self) -> String {
        self.location.to_string_lossy().to_string()
    }

    /// Open the storage
    pub fn open(&self, registry: &ResourceTypeRegistry) -> Box<dyn ResourceStorage> {
        match self.kind {
            StorageKind::Folder => Box::new(FolderStorage::new(&self.location, registry.clone())),
            StorageKind::Bundle => Box::new(BundleStorage::new(&self.location, registry.clone())),
        }
    }
}

impl Config {
    /// Load config from default path
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load config from `path`; a missing file gives the default config
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_yaml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CONFIG_DIR_NAME)
            .join("config.yml")
    }

    /// Cache directory: environment, then config, then the platform default
    pub fn cache_location(&self) -> PathBuf {
        std::env::var_os(CACHE_DIR_ENV)
            .map(PathBuf::from)
            .or_else(|| self.cache_dir.clone())
            .unwrap_or_else(crate::Database::default_location)
    }

    /// Build the resource type registry
    pub fn registry(&self) -> Result<ResourceTypeRegistry> {
        if self.resource_types.is_empty() {
            return Ok(ResourceTypeRegistry::with_defaults());
        }

        let mut registry = ResourceTypeRegistry::new();
        for (name, patterns) in &self.resource_types {
            if name.trim().is_empty() {
                return Err(ResCacheError::Config(
                    "Resource type names must not be empty".to_string(),
                ));
            }
            let patterns: Vec<&str> = patterns.iter().map(String::as_str).collect();
            registry.register(name, &patterns)?;
        }
        Ok(registry)
    }

    /// Add a storage unless its location is already configured
    pub fn add_storage(&mut self, storage: StorageConfig) -> bool {
        if self.storages.iter().any(|s| s.location == storage.location) {
            return false;
        }
        self.storages.push(storage);
        true
    }

    /// Remove a storage by location
    pub fn remove_storage(&mut self, location: &Path) -> bool {
        let before = self.storages.len();
        self.storages.retain(|s| s.location != location);
        self.storages.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_default() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_from(&temp.path().join("nope.yml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.registry().unwrap().len(), ResourceTypeRegistry::with_defaults().len());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("conf").join("config.yml");

        let mut config = Config {
            cache_dir: Some(temp.path().join("cache")),
            ..Default::default()
        };
        assert!(config.add_storage(StorageConfig {
            location: PathBuf::from("/res/krita.bundle"),
            kind: StorageKind::Bundle,
            pre_installed: true,
        }));
        assert!(!config.add_storage(StorageConfig::detect("/res/krita.bundle")));
        config
            .resource_types
            .insert("brushes".to_string(), vec!["*.gbr".to_string()]);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        let registry = loaded.registry().unwrap();
        assert_eq!(registry.resource_types(), vec!["brushes".to_string()]);
    }

    #[test]
    fn test_parse_minimal_yaml() {
        let config: Config =
            serde_yaml::from_str("storages:\n  - location: /home/me/resources\n").unwrap();
        assert_eq!(config.storages[0].kind, StorageKind::Folder);
        assert!(!config.storages[0].pre_installed);
        assert_eq!(config.storages[0].key(), "/home/me/resources");
    }

    #[test]
    fn test_remove_storage() {
        let mut config = Config::default();
        config.add_storage(StorageConfig::detect("/a"));
        assert!(config.remove_storage(Path::new("/a")));
        assert!(!config.remove_storage(Path::new("/a")));
    }

    #[test]
    fn test_bad_pattern_is_an_error() {
        let mut config = Config::default();
        config
            .resource_types
            .insert("brushes".to_string(), vec!["[".to_string()]);
        assert!(config.registry().is_err());
    }
}
