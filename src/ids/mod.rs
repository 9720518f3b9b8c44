//! Deterministic identifiers for chunks, vector points and SQL evidence
//!
//! - `chunk_id`: `<doc_id>:<position>:<short content hash>`, human traceable
//!   and stable while the chunk text is unchanged
//! - point id: name-based UUID (v5, URL namespace) of the chunk id, which
//!   satisfies vector stores that only accept UUID or integer keys
//! - SQL evidence id: `sql:<hash of the exact query text>`

mod evidence_ref;

pub use evidence_ref::{EvidenceRef, EvidenceRefError};

use uuid::Uuid;

/// Vector store point identifier
pub type PointId = Uuid;

/// Hex characters of content hash kept in a chunk id
pub const CHUNK_HASH_LEN: usize = 10;

/// Hex characters of query hash kept in a SQL evidence id
pub const SQL_HASH_LEN: usize = 12;

/// Short hex fingerprint of `content` (BLAKE3, truncated to `len` hex chars)
pub fn short_hash(content: &str, len: usize) -> String {
    let hex = blake3::hash(content.as_bytes()).to_hex();
    let hex = hex.as_str();
    hex[..len.min(hex.len())].to_string()
}

/// Build the chunk id for the chunk at `position` within `doc_id`
pub fn chunk_id(doc_id: &str, position: usize, content: &str) -> String {
    format!(
        "{}:{}:{}",
        doc_id,
        position,
        short_hash(content, CHUNK_HASH_LEN)
    )
}

/// Map a chunk id onto its vector store point id
///
/// Same chunk id always yields the same UUID, across processes and across
/// any implementation of RFC 4122 v5 with the URL namespace.
pub fn point_id(chunk_id: &str) -> PointId {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, chunk_id.as_bytes())
}

/// Citation id for a SQL query; identical query text gives an identical id
pub fn sql_evidence_id(query: &str) -> String {
    EvidenceRef::Sql(short_hash(query, SQL_HASH_LEN)).to_string()
}

/// Recover the document id from a chunk id (everything before the last two
/// `:`-separated components)
pub fn doc_id_of(chunk_id: &str) -> Option<&str> {
    let mut parts = chunk_id.rsplitn(3, ':');
    let _hash = parts.next()?;
    let position = parts.next()?;
    position.parse::<usize>().ok()?;
    parts.next()
}
