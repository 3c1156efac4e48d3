//! Resource type registry
//!
//! The set of resource types the embedding application knows how to load,
//! each with the file patterns that identify its files inside a storage.
//! The registry seeds the `resource_types` lookup table and drives full
//! storage re-scans.

use crate::error::Result;
use glob::Pattern;
use std::collections::BTreeMap;

/// Default resource types and their file patterns
const DEFAULT_TYPES: &[(&str, &[&str])] = &[
    ("brushes", &["*.gbr", "*.gih", "*.abr", "*.png", "*.svg"]),
    ("gradients", &["*.ggr", "*.svg", "*.kgr"]),
    ("paintoppresets", &["*.kpp"]),
    ("palettes", &["*.gpl", "*.kpl", "*.act", "*.aco", "*.colors", "*.xml", "*.sbz"]),
    ("patterns", &["*.pat", "*.jpg", "*.gif", "*.png", "*.tif", "*.tiff", "*.bmp"]),
    ("workspaces", &["*.kws"]),
];

/// Registry of known resource types
#[derive(Debug, Clone, Default)]
pub struct ResourceTypeRegistry {
    types: BTreeMap<String, Vec<Pattern>>,
}

impl ResourceTypeRegistry {
    /// Create new empty registry
    pub fn new() -> Self {
        Self {
            types: BTreeMap::new(),
        }
    }

    /// Create registry with the default resource types
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for (name, patterns) in DEFAULT_TYPES {
            let patterns = patterns
                .iter()
                .filter_map(|p| Pattern::new(p).ok())
                .collect();
            registry.types.insert(name.to_string(), patterns);
        }
        registry
    }

    /// Register a resource type with its file patterns
    pub fn register(&mut self, name: &str, patterns: &[&str]) -> Result<()> {
        let patterns = patterns
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.types.insert(name.to_string(), patterns);
        Ok(())
    }

    /// Registered type names, sorted
    pub fn resource_types(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Whether `filename` belongs to `resource_type`.
    ///
    /// Types registered without patterns accept every file.
    pub fn matches(&self, resource_type: &str, filename: &str) -> bool {
        match self.types.get(resource_type) {
            Some(patterns) if patterns.is_empty() => true,
            Some(patterns) => {
                let lower = filename.to_lowercase();
                patterns.iter().any(|p| p.matches(&lower))
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
