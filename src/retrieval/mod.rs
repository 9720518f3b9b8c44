//! Retrieval system
//!
//! A query is embedded and matched against the vector index (seed chunks),
//! the seeds' entities are walked through the co-occurrence graph (paths),
//! and the chunks those paths reach are fetched back from the vector index
//! (expanded chunks). The result is an `EvidencePack` whose every record
//! carries a citable `EvidenceRef`.

mod deduplication;
mod hybrid;
mod pack;
mod provenance;

pub use deduplication::deduplicate_chunk_ids;
pub use hybrid::HybridRetriever;
pub use pack::{EvidenceChunk, EvidencePack, EvidenceRecord, PathRecord};
pub use provenance::{Provenance, SourceYear};
