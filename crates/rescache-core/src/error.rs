//! Error types for rescache

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using ResCacheError
pub type Result<T> = std::result::Result<T, ResCacheError>;

/// Error type alias for convenience
pub type Error = ResCacheError;

/// Exit codes for CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NOT_FOUND: i32 = 2;
    pub const INVALID_INPUT: i32 = 3;
    pub const INIT_FAILED: i32 = 4;
}

/// Main error type for rescache
#[derive(Debug, Error)]
pub enum ResCacheError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Walk directory error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Could not create cache directory {}: {source}", path.display())]
    CacheDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not open resource cache database {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Could not create table {table}: {source}")]
    CreateTable {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Could not create index {index}: {source}")]
    CreateIndex {
        index: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Could not fill lookup table {table}: {source}")]
    Seed {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Storage not found: {0}")]
    StorageNotFound(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Tag not found: {0}")]
    TagNotFound(String),

    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Glob pattern error: {0}")]
    GlobPattern(#[from] glob::PatternError),
}

impl ResCacheError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::StorageNotFound(_) | Self::ResourceNotFound(_) | Self::TagNotFound(_) => {
                exit_codes::NOT_FOUND
            }
            Self::InvalidResource(_) | Self::UnknownResourceType(_) | Self::Config(_) => {
                exit_codes::INVALID_INPUT
            }
            Self::CacheDirectory { .. }
            | Self::Open { .. }
            | Self::CreateTable { .. }
            | Self::CreateIndex { .. }
            | Self::Seed { .. } => exit_codes::INIT_FAILED,
            _ => exit_codes::GENERAL_ERROR,
        }
    }

    /// Whether this error happened while bringing the cache up
    pub fn is_initialization(&self) -> bool {
        self.exit_code() == exit_codes::INIT_FAILED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            ResCacheError::StorageNotFound("x".into()).exit_code(),
            exit_codes::NOT_FOUND
        );
        assert_eq!(
            ResCacheError::InvalidResource("x".into()).exit_code(),
            exit_codes::INVALID_INPUT
        );
        let err = ResCacheError::Seed {
            table: "origin_types",
            source: rusqlite::Error::QueryReturnedNoRows,
        };
        assert!(err.is_initialization());
        assert!(err.to_string().contains("origin_types"));
    }
}
