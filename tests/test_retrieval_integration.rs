//! End-to-end retrieval tests: build a small corpus, then query it

use citeline::config::{RetrievalConfig, StorageConfig};
use citeline::embedding::{EmbeddingProvider, HashingEmbedder};
use citeline::entities::{EntityExtractor, EntityRuleTable, KeywordExtractor};
use citeline::error::CitelineError;
use citeline::ids::{self, EvidenceRef};
use citeline::indexing::{BuildOptions, IndexBuilder};
use citeline::retrieval::{EvidenceRecord, HybridRetriever};
use citeline::storage::StorageManager;
use citeline::verify::{Claim, FundamentalsSection, ResearchDraft, Verifier};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const RULES: &str = r#"
version = "test-1"

[[rule]]
type = "Company"
names = ["Acme", "Globex"]

[[rule]]
type = "Segment"
names = ["Cloud", "Devices"]

[[rule]]
type = "Risk"
names = ["tariffs"]
"#;

const COLLECTION: &str = "filings_chunks";
const DIM: usize = 64;

struct Corpus {
    temp: TempDir,
    storage: StorageManager,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Corpus {
    fn build(docs: &[(&str, &str)]) -> Self {
        let temp = TempDir::new().unwrap();
        let docs_dir = temp.path().join("docs");
        std::fs::create_dir_all(&docs_dir).unwrap();
        for (name, text) in docs {
            std::fs::write(docs_dir.join(format!("{}.txt", name)), text).unwrap();
        }

        let storage = StorageManager::open(&StorageConfig {
            vector_db: temp.path().join("vectors.sqlite"),
            graph_db: temp.path().join("graph.sqlite"),
            mapping_path: temp.path().join("mapping.json"),
        })
        .unwrap();

        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbedder::new(DIM).unwrap());
        let extractor: Arc<dyn EntityExtractor> =
            Arc::new(KeywordExtractor::new(EntityRuleTable::from_toml(RULES).unwrap()));

        let options = BuildOptions {
            docs_dir,
            doc_extension: "txt".to_string(),
            chunk_size: 900,
            collection: COLLECTION.to_string(),
            batch_size: 8,
            mapping_path: temp.path().join("mapping.json"),
        };
        IndexBuilder::from_storage(&storage, embedder.clone(), extractor, options)
            .build()
            .unwrap();

        Self {
            temp,
            storage,
            embedder,
        }
    }

    fn retriever(&self, top_k: usize, hop_k: usize) -> HybridRetriever {
        self.retriever_with(RetrievalConfig {
            top_k,
            hop_k,
            ..RetrievalConfig::default()
        })
    }

    fn retriever_with(&self, config: RetrievalConfig) -> HybridRetriever {
        HybridRetriever::new(
            self.embedder.clone(),
            self.storage.vector_store.clone(),
            self.storage.graph_store.clone(),
            COLLECTION,
            self.storage.mapping_path().to_path_buf(),
            config,
        )
        .unwrap()
    }
}

fn shared_entity_corpus() -> Corpus {
    Corpus::build(&[
        ("acme_10k_2022", "Acme cloud revenue expanded sharply."),
        ("acme_10k_2023", "Acme devices shipments declined."),
    ])
}

#[tokio::test]
async fn test_shared_entity_reaches_other_document() {
    let corpus = shared_entity_corpus();
    let pack = corpus
        .retriever(1, 1)
        .retrieve("cloud revenue expanded sharply")
        .await
        .unwrap();

    assert_eq!(pack.seed_chunks().len(), 1);
    let seed = &pack.seed_chunks()[0];
    assert_eq!(seed.doc_id, "acme_10k_2022");
    assert_eq!(seed.source_year, Some(2022));
    assert!(seed.score.is_some());

    assert!(pack
        .graph_paths()
        .iter()
        .any(|p| ids::doc_id_of(&p.path.related_chunk_id) == Some("acme_10k_2023")));

    let expanded_docs: Vec<&str> = pack
        .expanded_chunks()
        .iter()
        .map(|c| c.doc_id.as_str())
        .collect();
    assert!(expanded_docs.contains(&"acme_10k_2023"));
    assert!(pack.expanded_chunks().iter().all(|c| c.score.is_none()));

    let years = &pack.provenance().doc_years;
    assert_eq!(years.get("acme_10k_2022"), Some(&Some(2022)));
    assert_eq!(years.get("acme_10k_2023"), Some(&Some(2023)));
}

#[tokio::test]
async fn test_no_shared_entities_gives_no_expansion() {
    let corpus = Corpus::build(&[
        ("acme_2022", "Acme announced quarterly results."),
        ("globex_2023", "Globex announced annual results."),
    ]);
    assert_eq!(corpus.storage.graph_store.stats().unwrap().co_occurrence_edges, 0);

    let pack = corpus
        .retriever(2, 2)
        .retrieve("quarterly results")
        .await
        .unwrap();

    assert_eq!(pack.seed_chunks().len(), 2);
    assert!(pack.graph_paths().is_empty());
    assert!(pack.expanded_chunks().is_empty());

    let json = serde_json::to_value(&pack).unwrap();
    assert_eq!(json["expanded_chunks"], serde_json::json!([]));
}

#[tokio::test]
async fn test_chunk_without_entities_is_still_a_seed() {
    let corpus = Corpus::build(&[
        ("acme_2022", "Acme cloud revenue expanded sharply."),
        ("acme_2023", "Acme cloud bookings slowed."),
        ("memo_2024", "Board meeting minutes were approved without comment."),
    ]);
    let pack = corpus
        .retriever(1, 2)
        .retrieve("board meeting minutes approved")
        .await
        .unwrap();

    assert_eq!(pack.seed_chunks().len(), 1);
    assert_eq!(pack.seed_chunks()[0].doc_id, "memo_2024");
    assert!(pack.graph_paths().is_empty());
    assert!(pack.expanded_chunks().is_empty());
    assert_eq!(pack.provenance().doc_years.get("memo_2024"), Some(&Some(2024)));
}

#[tokio::test]
async fn test_blank_query_gives_empty_pack() {
    let corpus = shared_entity_corpus();
    let retriever = corpus.retriever(2, 1);

    for query in ["", "   "] {
        let pack = retriever.retrieve(query).await.unwrap();
        assert!(pack.seed_chunks().is_empty());
        assert!(pack.graph_paths().is_empty());
        assert_eq!(pack.provenance().collection, COLLECTION);

        let json = serde_json::to_value(&pack).unwrap();
        assert_eq!(json["expanded_chunks"], serde_json::json!([]));
    }
}

#[tokio::test]
async fn test_missing_mapping_drops_expanded_chunks() {
    let corpus = shared_entity_corpus();
    std::fs::remove_file(corpus.temp.path().join("mapping.json")).unwrap();

    let pack = corpus
        .retriever(1, 1)
        .retrieve("cloud revenue expanded sharply")
        .await
        .unwrap();

    assert_eq!(pack.seed_chunks().len(), 1);
    assert!(!pack.graph_paths().is_empty());
    assert!(pack.expanded_chunks().is_empty());
    assert!(!pack.provenance().expanded_chunk_ids.is_empty());
}

#[tokio::test]
async fn test_empty_collection_gives_empty_pack() {
    let corpus = shared_entity_corpus();
    corpus
        .storage
        .vector_store
        .ensure_collection("empty_chunks", DIM)
        .unwrap();

    let retriever = HybridRetriever::new(
        corpus.embedder.clone(),
        corpus.storage.vector_store.clone(),
        corpus.storage.graph_store.clone(),
        "empty_chunks",
        corpus.storage.mapping_path().to_path_buf(),
        RetrievalConfig::default(),
    )
    .unwrap();

    let pack = retriever.retrieve("anything at all").await.unwrap();
    assert!(pack.is_empty());
    assert!(pack.graph_paths().is_empty());
    assert!(pack.evidence_ids().is_empty());

    let json = serde_json::to_value(&pack).unwrap();
    assert_eq!(json["expanded_chunks"], serde_json::json!([]));
}

#[tokio::test]
async fn test_missing_collection_is_an_error() {
    let corpus = shared_entity_corpus();
    let retriever = HybridRetriever::new(
        corpus.embedder.clone(),
        corpus.storage.vector_store.clone(),
        corpus.storage.graph_store.clone(),
        "never_built",
        corpus.storage.mapping_path().to_path_buf(),
        RetrievalConfig::default(),
    )
    .unwrap();

    let err = retriever.retrieve("cloud").await.unwrap_err();
    assert!(matches!(err, CitelineError::CollectionNotFound { .. }));
}

#[tokio::test]
async fn test_every_evidence_id_resolves() {
    let corpus = Corpus::build(&[
        ("acme_2021", "Acme cloud margins improved on tariffs relief."),
        ("acme_2022", "Acme devices and cloud both grew."),
        ("globex_2022", "Globex devices faced tariffs."),
        ("globex_2023", "Globex cloud launch slipped."),
    ]);
    let pack = corpus
        .retriever(2, 2)
        .retrieve("cloud margins tariffs")
        .await
        .unwrap();

    let refs = pack.evidence_ids();
    assert!(!refs.is_empty());
    for reference in &refs {
        let record = pack.resolve(reference);
        assert!(record.is_some(), "dangling reference {}", reference);
        match (reference, record.unwrap()) {
            (EvidenceRef::Seed(id), EvidenceRecord::Seed(chunk))
            | (EvidenceRef::Expanded(id), EvidenceRecord::Expanded(chunk)) => {
                assert_eq!(&chunk.chunk_id, id);
            }
            (EvidenceRef::Path(i), EvidenceRecord::Path(path)) => {
                assert_eq!(path.evidence_id, EvidenceRef::Path(*i));
            }
            (reference, record) => panic!("{} resolved to {:?}", reference, record),
        }
    }

    // Path references are positional
    for (i, path) in pack.graph_paths().iter().enumerate() {
        assert_eq!(path.evidence_id.to_string(), format!("path:{}", i));
    }

    // Seeds come back in descending score order
    let scores: Vec<f32> = pack.seed_chunks().iter().filter_map(|c| c.score).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn test_ordering_is_reproducible() {
    let corpus = Corpus::build(&[
        ("acme_2021", "Acme cloud margins improved on tariffs relief."),
        ("acme_2022", "Acme devices and cloud both grew."),
        ("globex_2022", "Globex devices faced tariffs."),
        ("globex_2023", "Globex cloud launch slipped."),
    ]);

    let serial = corpus.retriever_with(RetrievalConfig {
        top_k: 3,
        hop_k: 2,
        max_concurrent_traversals: 1,
        ..RetrievalConfig::default()
    });
    let parallel = corpus.retriever_with(RetrievalConfig {
        top_k: 3,
        hop_k: 2,
        max_concurrent_traversals: 8,
        ..RetrievalConfig::default()
    });

    let first = serial.retrieve("devices tariffs").await.unwrap();
    let second = serial.retrieve("devices tariffs").await.unwrap();
    let third = parallel.retrieve("devices tariffs").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first, third);
    assert!(!first.graph_paths().is_empty());
}

#[tokio::test]
async fn test_max_paths_caps_the_whole_query() {
    let corpus = Corpus::build(&[
        ("acme_2021", "Acme cloud margins improved on tariffs relief."),
        ("acme_2022", "Acme devices and cloud both grew."),
        ("globex_2022", "Globex devices faced tariffs."),
        ("globex_2023", "Globex cloud launch slipped."),
    ]);
    let retriever = corpus.retriever_with(RetrievalConfig {
        top_k: 4,
        hop_k: 5,
        max_paths: 3,
        ..RetrievalConfig::default()
    });

    let pack = retriever.retrieve("cloud devices tariffs").await.unwrap();
    assert_eq!(pack.graph_paths().len(), 3);
    assert_eq!(pack.provenance().max_paths, 3);
}

#[tokio::test]
async fn test_hop_zero_skips_graph() {
    let corpus = shared_entity_corpus();
    let pack = corpus
        .retriever(2, 0)
        .retrieve("cloud revenue")
        .await
        .unwrap();

    assert_eq!(pack.seed_chunks().len(), 2);
    assert!(pack.graph_paths().is_empty());
    assert!(pack.expanded_chunks().is_empty());
}

#[tokio::test]
async fn test_generous_timeout_returns_pack() {
    let corpus = shared_entity_corpus();
    let pack = corpus
        .retriever(1, 1)
        .retrieve_with_timeout("cloud revenue", Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(pack.query(), "cloud revenue");
}

#[tokio::test]
async fn test_pack_backs_verifier_sources() {
    let corpus = shared_entity_corpus();
    let pack = corpus
        .retriever(1, 1)
        .retrieve("cloud revenue expanded sharply")
        .await
        .unwrap();

    let seed_ref = pack.seed_chunks()[0].evidence_id.to_string();
    let draft = ResearchDraft {
        ticker: "ACME".to_string(),
        fundamentals: Some(FundamentalsSection {
            drivers: vec![
                Claim::new("Cloud revenue expanded").cite(seed_ref.clone()),
                Claim::new("Graph link").cite("path:0"),
            ],
            ..FundamentalsSection::default()
        }),
        valuation: None,
    };

    let verifier = Verifier::with_sources(std::slice::from_ref(&pack), &[]);
    let report = verifier.verify(&draft);
    assert!(report.passed, "issues: {:?}", report.issues);
    assert_eq!(report.evidence_count, 2);

    // A pack round-tripped through JSON backs the same references
    let reloaded: citeline::retrieval::EvidencePack =
        serde_json::from_str(&serde_json::to_string(&pack).unwrap()).unwrap();
    assert_eq!(reloaded, pack);

    let mut dangling = draft.clone();
    if let Some(f) = dangling.fundamentals.as_mut() {
        f.risks.push(Claim::new("Made up").cite("exp:acme_10k_2099:0:0000000000"));
    }
    let report = Verifier::with_sources(&[reloaded], &[]).verify(&dangling);
    assert!(!report.passed);
    assert_eq!(
        report.issues,
        vec!["Fundamentals: Risk #1 cites unresolved evidence 'exp:acme_10k_2099:0:0000000000'."]
    );
}
