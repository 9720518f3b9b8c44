//! Index build
//!
//! Turns a directory of plain-text filings into the dual index: one vector
//! point per chunk and a graph of chunk/entity mentions with entity
//! co-occurrence edges.

mod builder;
mod chunker;

pub use builder::{discover_documents, BuildOptions, BuildReport, IndexBuilder};
pub use chunker::{chunk_text, normalize_whitespace};
