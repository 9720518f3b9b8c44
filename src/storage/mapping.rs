//! Persisted chunk_id -> point_id join table
//!
//! Written once by the index build, read by retrieval to re-fetch chunks the
//! graph discovered. Stored as a flat JSON object of strings.

use crate::error::{CitelineError, Result};
use crate::ids::PointId;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PointMapping {
    entries: BTreeMap<String, PointId>,
}

impl PointMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the mapping; a missing file yields an empty mapping
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(
                "Mapping file {:?} not found; expanded chunks cannot be re-fetched",
                path
            );
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| CitelineError::io(e, format!("Failed to read mapping: {:?}", path)))?;
        let raw: BTreeMap<String, String> = serde_json::from_str(&content)
            .map_err(|e| CitelineError::json(e, format!("Invalid mapping file: {:?}", path)))?;

        let mut entries = BTreeMap::new();
        for (chunk_id, point_id) in raw {
            let parsed = point_id.parse::<PointId>().map_err(|e| {
                CitelineError::Config(format!(
                    "Invalid point id {} for chunk {} in {:?}: {}",
                    point_id, chunk_id, path, e
                ))
            })?;
            entries.insert(chunk_id, parsed);
        }

        tracing::debug!("Loaded {} mapping entries from {:?}", entries.len(), path);

        Ok(Self { entries })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CitelineError::io(e, format!("Failed to create mapping directory: {:?}", parent))
                })?;
            }
        }

        let raw: BTreeMap<&str, String> = self
            .entries
            .iter()
            .map(|(chunk_id, point_id)| (chunk_id.as_str(), point_id.to_string()))
            .collect();
        let content = serde_json::to_string_pretty(&raw)
            .map_err(|e| CitelineError::json(e, "Failed to encode mapping"))?;

        std::fs::write(path, content)
            .map_err(|e| CitelineError::io(e, format!("Failed to write mapping: {:?}", path)))
    }

    pub fn insert(&mut self, chunk_id: impl Into<String>, point_id: PointId) {
        self.entries.insert(chunk_id.into(), point_id);
    }

    pub fn get(&self, chunk_id: &str) -> Option<PointId> {
        self.entries.get(chunk_id).copied()
    }

    /// Reverse lookup
    pub fn chunk_for_point(&self, point_id: &PointId) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, p)| *p == point_id)
            .map(|(c, _)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
