//! Citeline - citable evidence retrieval for equity research
//!
//! Filing text is chunked, embedded and indexed twice: as vectors for
//! similarity search and as an entity co-occurrence graph. A query seeds on
//! the nearest chunks, expands through the graph, and returns an evidence
//! pack in which every record carries a stable citation id. Structured facts
//! come from a guarded read-only SQL tool with deterministic citation ids,
//! and a verifier checks that synthesized claims cite their evidence.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod entities;
pub mod error;
pub mod ids;
pub mod indexing;
pub mod retrieval;
pub mod sql;
pub mod storage;
pub mod verify;

pub use error::{CitelineError, Result};
