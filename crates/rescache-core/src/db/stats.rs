//! Cache statistics

use super::Database;
use crate::error::Result;

/// Cache stats
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub storage_count: usize,
    pub resource_count: usize,
    pub version_count: usize,
    pub deleted_count: usize,
    pub tag_count: usize,
    pub link_count: usize,
}

impl Database {
    /// Get cache statistics
    pub fn get_stats(&self) -> Result<CacheStats> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        Ok(CacheStats {
            storage_count: count("SELECT COUNT(*) FROM storages")?,
            resource_count: count("SELECT COUNT(*) FROM resources")?,
            version_count: count("SELECT COUNT(*) FROM versioned_resources")?,
            deleted_count: count("SELECT COUNT(*) FROM versioned_resources WHERE deleted = 1")?,
            tag_count: count("SELECT COUNT(*) FROM tags WHERE active = 1")?,
            link_count: count("SELECT COUNT(*) FROM resource_tags")?,
        })
    }

    /// Vacuum the database
    pub fn vacuum(&self) -> Result<()> {
        self.conn.execute("VACUUM", [])?;
        Ok(())
    }
}
