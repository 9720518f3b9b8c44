//! Storage layer for Citeline
//!
//! Two SQLite-backed indexes (vectors and entity graph) plus the JSON file
//! joining them by chunk id.

pub mod database;
pub mod graph_store;
pub mod mapping;
pub mod vector_store;

use crate::config::{expand_path, StorageConfig};
use crate::error::{CitelineError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use database::{Database, DbConn, DbPool};
pub use graph_store::{GraphPath, GraphStats, GraphStore, SqliteGraphStore};
pub use mapping::PointMapping;
pub use vector_store::{
    ChunkPayload, CollectionInfo, ScoredPoint, SqliteVectorStore, VectorPoint, VectorStore,
};

/// Storage manager that opens both index stores from configuration
#[derive(Clone)]
pub struct StorageManager {
    pub vector_store: Arc<dyn VectorStore>,
    pub graph_store: Arc<dyn GraphStore>,
    vector_path: PathBuf,
    graph_path: PathBuf,
    mapping_path: PathBuf,
}

impl StorageManager {
    /// Open (creating if needed) the stores named in `config`
    pub fn open(config: &StorageConfig) -> Result<Self> {
        let vector_path = expand_path(&config.vector_db)?;
        let graph_path = expand_path(&config.graph_db)?;
        let mapping_path = expand_path(&config.mapping_path)?;

        let vector_store = Arc::new(SqliteVectorStore::open(&vector_path)?);
        let graph_store = Arc::new(SqliteGraphStore::open(&graph_path)?);

        tracing::debug!(
            "Opened stores: vectors={:?} graph={:?} mapping={:?}",
            vector_path,
            graph_path,
            mapping_path
        );

        Ok(Self {
            vector_store,
            graph_store,
            vector_path,
            graph_path,
            mapping_path,
        })
    }

    pub fn mapping_path(&self) -> &Path {
        &self.mapping_path
    }

    /// Load the chunk -> point mapping (empty when the file is missing)
    pub fn load_mapping(&self) -> Result<PointMapping> {
        PointMapping::load(&self.mapping_path)
    }

    /// Combined statistics for `collection`
    pub fn stats(&self, collection: &str) -> Result<StorageStats> {
        let points = match self.vector_store.count(collection) {
            Ok(n) => Some(n),
            Err(CitelineError::CollectionNotFound { .. }) => None,
            Err(e) => return Err(e),
        };

        Ok(StorageStats {
            collection: collection.to_string(),
            points,
            graph: self.graph_store.stats()?,
            mapping_entries: self.load_mapping()?.len(),
            vector_db_size: file_size(&self.vector_path)?,
            graph_db_size: file_size(&self.graph_path)?,
        })
    }
}

fn file_size(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Ok(0);
    }
    Ok(std::fs::metadata(path)
        .map_err(|e| CitelineError::io(e, format!("Failed to get file metadata: {:?}", path)))?
        .len())
}

/// Combined storage statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct StorageStats {
    pub collection: String,
    /// `None` when the collection has not been built yet
    pub points: Option<usize>,
    pub graph: GraphStats,
    pub mapping_entries: usize,
    pub vector_db_size: u64,
    pub graph_db_size: u64,
}

impl StorageStats {
    /// Get total storage size
    pub fn total_size(&self) -> u64 {
        self.vector_db_size + self.graph_db_size
    }

    /// Format size as human-readable string
    pub fn format_size(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
