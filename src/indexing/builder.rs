//! Batch index build: documents -> chunks -> vectors + entity graph

use crate::config::{Config, IndexingConfig};
use crate::embedding::EmbeddingProvider;
use crate::entities::EntityExtractor;
use crate::error::{CitelineError, Result};
use crate::ids::{self, PointId};
use crate::indexing::chunk_text;
use crate::storage::{
    ChunkPayload, GraphStats, GraphStore, PointMapping, StorageManager, VectorPoint, VectorStore,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Knobs for one build run
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub docs_dir: PathBuf,
    pub doc_extension: String,
    pub chunk_size: usize,
    pub collection: String,
    pub batch_size: usize,
    pub mapping_path: PathBuf,
}

impl BuildOptions {
    pub fn from_config(config: &Config) -> Result<Self> {
        let IndexingConfig {
            docs_dir,
            doc_extension,
            chunk_size,
            collection,
        } = &config.indexing;

        Ok(Self {
            docs_dir: crate::config::expand_path(docs_dir)?,
            doc_extension: doc_extension.clone(),
            chunk_size: *chunk_size,
            collection: collection.clone(),
            batch_size: config.embedding.batch_size,
            mapping_path: crate::config::expand_path(&config.storage.mapping_path)?,
        })
    }
}

/// Summary of a finished build
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub documents: usize,
    pub chunks: usize,
    pub mentions: usize,
    pub collection: String,
    pub dimension: usize,
    pub embedding_model: String,
    pub extractor_version: String,
    pub mapping_path: PathBuf,
    pub mapping_entries: usize,
    pub graph: GraphStats,
    pub elapsed_ms: u128,
}

/// A chunk awaiting embedding
#[derive(Debug, Clone)]
struct PendingChunk {
    doc_id: String,
    chunk_id: String,
    point_id: PointId,
    text: String,
}

/// Builds the vector and graph indexes for a corpus
///
/// Runs with exclusive write access to both stores; any single chunk
/// failure aborts the build.
pub struct IndexBuilder {
    embedder: Arc<dyn EmbeddingProvider>,
    extractor: Arc<dyn EntityExtractor>,
    vector_store: Arc<dyn VectorStore>,
    graph_store: Arc<dyn GraphStore>,
    options: BuildOptions,
}

impl IndexBuilder {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        extractor: Arc<dyn EntityExtractor>,
        vector_store: Arc<dyn VectorStore>,
        graph_store: Arc<dyn GraphStore>,
        options: BuildOptions,
    ) -> Self {
        Self {
            embedder,
            extractor,
            vector_store,
            graph_store,
            options,
        }
    }

    pub fn from_storage(
        storage: &StorageManager,
        embedder: Arc<dyn EmbeddingProvider>,
        extractor: Arc<dyn EntityExtractor>,
        options: BuildOptions,
    ) -> Self {
        Self::new(
            embedder,
            extractor,
            storage.vector_store.clone(),
            storage.graph_store.clone(),
            options,
        )
    }

    /// Index every document under the configured directory
    pub fn build(&self) -> Result<BuildReport> {
        let started = Instant::now();
        let opts = &self.options;

        let documents = discover_documents(&opts.docs_dir, &opts.doc_extension)?;
        tracing::info!(
            "Indexing {} documents from {:?}",
            documents.len(),
            opts.docs_dir
        );

        let chunks = self.chunk_documents(&documents)?;
        if chunks.is_empty() {
            return Err(CitelineError::EmptyCorpus {
                dir: opts.docs_dir.clone(),
                extension: opts.doc_extension.clone(),
            });
        }

        let dimension = self.embedder.dimension();
        self.vector_store
            .ensure_collection(&opts.collection, dimension)?;

        self.write_vectors(&chunks)?;
        let mentions = self.write_graph(&chunks)?;

        // Merge so chunks indexed by earlier runs stay re-fetchable
        let mut mapping = PointMapping::load(&opts.mapping_path)?;
        for chunk in &chunks {
            mapping.insert(chunk.chunk_id.clone(), chunk.point_id);
        }
        mapping.save(&opts.mapping_path)?;

        let report = BuildReport {
            documents: documents.len(),
            chunks: chunks.len(),
            mentions,
            collection: opts.collection.clone(),
            dimension,
            embedding_model: self.embedder.model_name().to_string(),
            extractor_version: self.extractor.version().to_string(),
            mapping_path: opts.mapping_path.clone(),
            mapping_entries: mapping.len(),
            graph: self.graph_store.stats()?,
            elapsed_ms: started.elapsed().as_millis(),
        };

        tracing::info!(
            "Indexed {} chunks from {} documents into {} ({} mentions) in {}ms",
            report.chunks,
            report.documents,
            report.collection,
            report.mentions,
            report.elapsed_ms
        );

        Ok(report)
    }

    fn chunk_documents(&self, documents: &[PathBuf]) -> Result<Vec<PendingChunk>> {
        let mut pending = Vec::new();

        for path in documents {
            let doc_id = document_id(path)?;
            let text = std::fs::read_to_string(path).map_err(|e| {
                CitelineError::MalformedDocument {
                    path: path.clone(),
                    reason: e.to_string(),
                }
            })?;

            let chunks = chunk_text(&text, self.options.chunk_size);
            if chunks.is_empty() {
                tracing::warn!("Document {:?} has no text; skipping", path);
                continue;
            }

            tracing::debug!("{}: {} chunks", doc_id, chunks.len());

            for (position, text) in chunks.into_iter().enumerate() {
                let chunk_id = ids::chunk_id(&doc_id, position, &text);
                pending.push(PendingChunk {
                    doc_id: doc_id.clone(),
                    point_id: ids::point_id(&chunk_id),
                    chunk_id,
                    text,
                });
            }
        }

        Ok(pending)
    }

    fn write_vectors(&self, chunks: &[PendingChunk]) -> Result<()> {
        let batch_size = self.options.batch_size.max(1);

        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts)?;

            if vectors.len() != batch.len() {
                return Err(CitelineError::ChunkIndexing {
                    chunk_id: batch[0].chunk_id.clone(),
                    reason: format!(
                        "Embedding backend returned {} vectors for {} chunks",
                        vectors.len(),
                        batch.len()
                    ),
                });
            }

            let points: Vec<VectorPoint> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| VectorPoint {
                    id: chunk.point_id,
                    vector,
                    payload: ChunkPayload {
                        doc_id: chunk.doc_id.clone(),
                        chunk_id: chunk.chunk_id.clone(),
                        point_id: chunk.point_id,
                        text: chunk.text.clone(),
                    },
                })
                .collect();

            self.vector_store
                .upsert(&self.options.collection, &points)?;
            tracing::debug!("Upserted {} points", points.len());
        }

        Ok(())
    }

    fn write_graph(&self, chunks: &[PendingChunk]) -> Result<usize> {
        let mut mentions = 0;

        for chunk in chunks {
            let entities = self.extractor.extract(&chunk.text);
            self.graph_store
                .record_chunk(&chunk.chunk_id, &chunk.doc_id, &entities)
                .map_err(|e| CitelineError::ChunkIndexing {
                    chunk_id: chunk.chunk_id.clone(),
                    reason: e.to_string(),
                })?;
            mentions += entities.len();
        }

        Ok(mentions)
    }
}

/// Documents directly under `dir` with the given extension, sorted by path
pub fn discover_documents(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let empty = || CitelineError::EmptyCorpus {
        dir: dir.to_path_buf(),
        extension: extension.to_string(),
    };

    if !dir.is_dir() {
        return Err(empty());
    }

    let entries = std::fs::read_dir(dir)
        .map_err(|e| CitelineError::io(e, format!("Failed to read docs directory: {:?}", dir)))?;

    let mut documents = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| CitelineError::io(e, "Failed to read docs directory entry"))?
            .path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(extension) {
            documents.push(path);
        }
    }

    if documents.is_empty() {
        return Err(empty());
    }

    documents.sort();
    Ok(documents)
}

/// Document id is the file stem
fn document_id(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| CitelineError::MalformedDocument {
            path: path.to_path_buf(),
            reason: "File name is not valid UTF-8".to_string(),
        })
}
