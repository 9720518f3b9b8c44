//! Hybrid retrieval: vector seed -> graph expansion -> re-fetch

use crate::config::{Config, RetrievalConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::{CitelineError, Result};
use crate::ids::EvidenceRef;
use crate::retrieval::{
    deduplicate_chunk_ids, EvidenceChunk, EvidencePack, PathRecord, Provenance, SourceYear,
};
use crate::storage::{
    ChunkPayload, GraphPath, GraphStore, PointMapping, StorageManager, VectorStore,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Retriever over the vector and graph indexes
#[derive(Clone)]
pub struct HybridRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    graph_store: Arc<dyn GraphStore>,
    collection: String,
    mapping_path: PathBuf,
    config: RetrievalConfig,
    traversal_slots: Arc<Semaphore>,
    years: SourceYear,
}

impl HybridRetriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
        graph_store: Arc<dyn GraphStore>,
        collection: impl Into<String>,
        mapping_path: PathBuf,
        config: RetrievalConfig,
    ) -> Result<Self> {
        let slots = config.max_concurrent_traversals.max(1);
        Ok(Self {
            embedder,
            vector_store,
            graph_store,
            collection: collection.into(),
            mapping_path,
            traversal_slots: Arc::new(Semaphore::new(slots)),
            config,
            years: SourceYear::new()?,
        })
    }

    pub fn from_config(
        config: &Config,
        storage: &StorageManager,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        Self::new(
            embedder,
            storage.vector_store.clone(),
            storage.graph_store.clone(),
            config.indexing.collection.clone(),
            storage.mapping_path().to_path_buf(),
            config.retrieval.clone(),
        )
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Retrieve with the configured deadline
    pub async fn retrieve_with_deadline(&self, query: &str) -> Result<EvidencePack> {
        let timeout = Duration::from_millis(self.config.request_timeout_ms);
        self.retrieve_with_timeout(query, timeout).await
    }

    /// Retrieve, failing whole if `timeout` elapses first
    pub async fn retrieve_with_timeout(
        &self,
        query: &str,
        timeout: Duration,
    ) -> Result<EvidencePack> {
        match tokio::time::timeout(timeout, self.retrieve(query)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Retrieval timed out after {:?}", timeout);
                Err(CitelineError::Timeout {
                    after_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Build the evidence pack for `query`
    pub async fn retrieve(&self, query: &str) -> Result<EvidencePack> {
        let seeds = self.vector_seed(query).await?;
        tracing::debug!("{} seed chunks for query", seeds.len());

        let seed_chunk_ids: Vec<String> =
            seeds.iter().map(|c| c.chunk_id.clone()).collect();

        let paths = self.expand(&seed_chunk_ids).await?;
        let graph_paths: Vec<PathRecord> = paths
            .into_iter()
            .enumerate()
            .map(|(i, path)| PathRecord {
                evidence_id: EvidenceRef::Path(i),
                path,
            })
            .collect();

        let frontier = deduplicate_chunk_ids(
            graph_paths
                .iter()
                .map(|p| p.path.related_chunk_id.clone()),
        );

        let expanded = self.fetch_expanded(&frontier).await?;

        let mut doc_years = BTreeMap::new();
        for chunk in seeds.iter().chain(expanded.iter()) {
            doc_years.insert(chunk.doc_id.clone(), chunk.source_year);
        }

        let provenance = Provenance {
            vector_db: self.vector_store.location(),
            collection: self.collection.clone(),
            graph_db: self.graph_store.location(),
            mapping_path: self.mapping_path.clone(),
            embedding_model: self.embedder.model_name().to_string(),
            top_k: self.config.top_k,
            hop_k: self.config.hop_k,
            max_paths: self.config.max_paths,
            seed_chunk_ids,
            expanded_chunk_ids: frontier,
            doc_years,
        };

        tracing::info!(
            "Retrieved {} seed, {} expanded chunks ({} paths)",
            seeds.len(),
            expanded.len(),
            graph_paths.len()
        );

        Ok(EvidencePack::new(query, seeds, expanded, graph_paths, provenance))
    }

    /// Embed the query and take the top_k nearest chunks
    ///
    /// A blank query has no seeds; the collection must still exist.
    async fn vector_seed(&self, query: &str) -> Result<Vec<EvidenceChunk>> {
        let embedder = self.embedder.clone();
        let store = self.vector_store.clone();
        let collection = self.collection.clone();
        let top_k = self.config.top_k;
        let query = query.to_string();

        let hits = run_blocking(move || {
            if query.trim().is_empty() {
                tracing::debug!("Blank query, skipping vector search");
                return match store.collection(&collection)? {
                    Some(_) => Ok(Vec::new()),
                    None => Err(CitelineError::CollectionNotFound { name: collection }),
                };
            }
            let vector = embedder.embed(&query)?;
            store.query(&collection, &vector, top_k)
        })
        .await?;

        Ok(hits
            .into_iter()
            .map(|hit| {
                self.evidence_chunk(
                    EvidenceRef::Seed(hit.payload.chunk_id.clone()),
                    hit.payload,
                    Some(hit.score),
                )
            })
            .collect())
    }

    /// One traversal per seed, bounded by the semaphore and merged in seed
    /// order so path indices do not depend on scheduling
    async fn expand(&self, seed_chunk_ids: &[String]) -> Result<Vec<GraphPath>> {
        let max_paths = self.config.max_paths;
        let hop_k = self.config.hop_k;
        if hop_k == 0 || max_paths == 0 {
            return Ok(Vec::new());
        }

        let mut handles = Vec::with_capacity(seed_chunk_ids.len());
        for chunk_id in seed_chunk_ids {
            let permit = self
                .traversal_slots
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| CitelineError::GraphStore(format!("Traversal pool closed: {}", e)))?;
            let graph = self.graph_store.clone();
            let chunk_id = chunk_id.clone();

            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                graph.expand(&chunk_id, hop_k, max_paths)
            }));
        }

        let mut paths = Vec::new();
        for handle in handles {
            let seed_paths = handle.await.map_err(join_error)??;
            paths.extend(seed_paths);
        }
        paths.truncate(max_paths);

        Ok(paths)
    }

    /// Resolve the frontier through the mapping and fetch payloads
    ///
    /// Ids missing from the mapping, or whose point is gone, are dropped.
    async fn fetch_expanded(&self, frontier: &[String]) -> Result<Vec<EvidenceChunk>> {
        if frontier.is_empty() {
            return Ok(Vec::new());
        }

        let store = self.vector_store.clone();
        let collection = self.collection.clone();
        let mapping_path = self.mapping_path.clone();
        let frontier = frontier.to_vec();

        let points = run_blocking(move || {
            let mapping = PointMapping::load(&mapping_path)?;
            let point_ids: Vec<_> = frontier.iter().filter_map(|id| mapping.get(id)).collect();
            let skipped = frontier.len() - point_ids.len();
            if skipped > 0 {
                tracing::debug!("{} frontier chunks not in mapping", skipped);
            }
            if point_ids.is_empty() {
                return Ok(Vec::new());
            }
            store.retrieve(&collection, &point_ids)
        })
        .await?;

        Ok(points
            .into_iter()
            .map(|point| {
                self.evidence_chunk(
                    EvidenceRef::Expanded(point.payload.chunk_id.clone()),
                    point.payload,
                    None,
                )
            })
            .collect())
    }

    fn evidence_chunk(
        &self,
        evidence_id: EvidenceRef,
        payload: ChunkPayload,
        score: Option<f32>,
    ) -> EvidenceChunk {
        EvidenceChunk {
            evidence_id,
            source_year: self.years.extract(&payload.doc_id),
            chunk_id: payload.chunk_id,
            doc_id: payload.doc_id,
            score,
            text: payload.text,
        }
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(join_error)?
}

fn join_error(e: tokio::task::JoinError) -> CitelineError {
    CitelineError::Other(anyhow::anyhow!("Retrieval task failed: {}", e))
}
