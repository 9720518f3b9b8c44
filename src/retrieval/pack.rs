//! Evidence pack: the citable result of one retrieval

use crate::ids::EvidenceRef;
use crate::retrieval::Provenance;
use crate::storage::GraphPath;
use serde::{Deserialize, Serialize};

/// Seed or expanded chunk record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceChunk {
    pub evidence_id: EvidenceRef,
    pub chunk_id: String,
    pub doc_id: String,
    pub source_year: Option<u16>,
    /// Similarity score; seeds only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    pub text: String,
}

/// Graph traversal record with its `path:<n>` reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathRecord {
    pub evidence_id: EvidenceRef,
    #[serde(flatten)]
    pub path: GraphPath,
}

/// Record a reference resolves to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvidenceRecord<'a> {
    Seed(&'a EvidenceChunk),
    Expanded(&'a EvidenceChunk),
    Path(&'a PathRecord),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidencePack {
    query: String,
    seed_chunks: Vec<EvidenceChunk>,
    /// Always serialized, possibly empty
    #[serde(default)]
    expanded_chunks: Vec<EvidenceChunk>,
    graph_paths: Vec<PathRecord>,
    provenance: Provenance,
}

impl EvidencePack {
    pub fn new(
        query: impl Into<String>,
        seed_chunks: Vec<EvidenceChunk>,
        expanded_chunks: Vec<EvidenceChunk>,
        graph_paths: Vec<PathRecord>,
        provenance: Provenance,
    ) -> Self {
        Self {
            query: query.into(),
            seed_chunks,
            expanded_chunks,
            graph_paths,
            provenance,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Seeds in vector rank order
    pub fn seed_chunks(&self) -> &[EvidenceChunk] {
        &self.seed_chunks
    }

    /// Expanded chunks in first-discovery order
    pub fn expanded_chunks(&self) -> &[EvidenceChunk] {
        &self.expanded_chunks
    }

    pub fn graph_paths(&self) -> &[PathRecord] {
        &self.graph_paths
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Look up the record `reference` names within this pack
    pub fn resolve(&self, reference: &EvidenceRef) -> Option<EvidenceRecord<'_>> {
        match reference {
            EvidenceRef::Seed(_) => self
                .seed_chunks
                .iter()
                .find(|c| &c.evidence_id == reference)
                .map(EvidenceRecord::Seed),
            EvidenceRef::Expanded(_) => self
                .expanded_chunks
                .iter()
                .find(|c| &c.evidence_id == reference)
                .map(EvidenceRecord::Expanded),
            EvidenceRef::Path(index) => self
                .graph_paths
                .get(*index)
                .filter(|p| &p.evidence_id == reference)
                .map(EvidenceRecord::Path),
            EvidenceRef::Sql(_) => None,
        }
    }

    /// Every reference minted by this pack: seeds, paths, then expanded
    pub fn evidence_ids(&self) -> Vec<EvidenceRef> {
        self.seed_chunks
            .iter()
            .map(|c| c.evidence_id.clone())
            .chain(self.graph_paths.iter().map(|p| p.evidence_id.clone()))
            .chain(self.expanded_chunks.iter().map(|c| c.evidence_id.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.seed_chunks.is_empty() && self.expanded_chunks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EntityType;

    fn chunk(reference: EvidenceRef, score: Option<f32>) -> EvidenceChunk {
        let chunk_id = reference.chunk_id().unwrap().to_string();
        EvidenceChunk {
            evidence_id: reference,
            doc_id: "aapl_10k_2024".to_string(),
            chunk_id,
            source_year: Some(2024),
            score,
            text: "Services net sales increased".to_string(),
        }
    }

    fn sample_pack() -> EvidencePack {
        let path = PathRecord {
            evidence_id: EvidenceRef::Path(0),
            path: GraphPath {
                seed_entity_type: EntityType::Segment,
                seed_entity: "Services".to_string(),
                neighbor_type: EntityType::Company,
                neighbor: "Apple".to_string(),
                related_chunk_id: "aapl_10k_2024:1:bbbbbbbbbb".to_string(),
            },
        };
        EvidencePack::new(
            "services growth",
            vec![chunk(
                EvidenceRef::Seed("aapl_10k_2024:0:aaaaaaaaaa".into()),
                Some(0.8),
            )],
            vec![chunk(
                EvidenceRef::Expanded("aapl_10k_2024:1:bbbbbbbbbb".into()),
                None,
            )],
            vec![path],
            Provenance::default(),
        )
    }

    #[test]
    fn test_resolve_every_minted_id() {
        let pack = sample_pack();
        let ids = pack.evidence_ids();
        assert_eq!(ids.len(), 3);
        for id in &ids {
            assert!(pack.resolve(id).is_some(), "dangling {}", id);
        }
    }

    #[test]
    fn test_resolve_unknown() {
        let pack = sample_pack();
        assert!(pack.resolve(&EvidenceRef::Path(7)).is_none());
        assert!(pack
            .resolve(&EvidenceRef::Seed("aapl_10k_2024:1:bbbbbbbbbb".into()))
            .is_none());
        assert!(pack.resolve(&EvidenceRef::Sql("abc".into())).is_none());
    }

    #[test]
    fn test_external_shape() {
        let json = serde_json::to_value(sample_pack()).unwrap();

        assert_eq!(json["query"], "services growth");
        assert_eq!(
            json["seed_chunks"][0]["evidence_id"],
            "seed:aapl_10k_2024:0:aaaaaaaaaa"
        );
        assert!(json["seed_chunks"][0]["score"].is_number());
        assert!(json["expanded_chunks"][0].get("score").is_none());
        assert_eq!(json["graph_paths"][0]["evidence_id"], "path:0");
        assert_eq!(json["graph_paths"][0]["seed_entity_type"], "Segment");
        assert_eq!(json["graph_paths"][0]["neighbor"], "Apple");
    }

    #[test]
    fn test_expanded_key_present_when_empty() {
        let pack = EvidencePack::new("q", vec![], vec![], vec![], Provenance::default());
        let json = serde_json::to_value(&pack).unwrap();
        assert_eq!(json["expanded_chunks"], serde_json::json!([]));
        assert!(pack.is_empty());
    }

    #[test]
    fn test_json_roundtrip() {
        let pack = sample_pack();
        let text = serde_json::to_string(&pack).unwrap();
        let back: EvidencePack = serde_json::from_str(&text).unwrap();
        assert_eq!(back, pack);
    }
}
