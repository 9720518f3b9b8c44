//! Provenance tracking for evidence packs

use crate::error::{CitelineError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Everything needed to reproduce one retrieval
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Vector store location
    pub vector_db: String,

    pub collection: String,

    /// Graph store location
    pub graph_db: String,

    pub mapping_path: PathBuf,

    /// Embedding model identity used for the query vector
    pub embedding_model: String,

    pub top_k: usize,
    pub hop_k: usize,

    /// Per-query ceiling on graph path records
    pub max_paths: usize,

    /// Seed chunk ids in rank order
    pub seed_chunk_ids: Vec<String>,

    /// Expansion frontier, deduplicated in discovery order (including ids
    /// the mapping could not resolve)
    pub expanded_chunk_ids: Vec<String>,

    /// Every document seen, with its best-effort source year
    pub doc_years: BTreeMap<String, Option<u16>>,
}

/// Best-effort source year from a document id: first 19xx/20xx token
#[derive(Debug, Clone)]
pub struct SourceYear {
    pattern: Regex,
}

impl SourceYear {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(r"(19|20)\d{2}")
            .map_err(|e| CitelineError::Config(format!("Invalid year pattern: {}", e)))?;
        Ok(Self { pattern })
    }

    pub fn extract(&self, doc_id: &str) -> Option<u16> {
        self.pattern
            .find(doc_id)
            .and_then(|m| m.as_str().parse().ok())
    }
}
