//! Citable evidence references (`seed:`, `exp:`, `path:`, `sql:`)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvidenceRefError {
    #[error("Evidence reference has no kind prefix: {0}")]
    MissingKind(String),

    #[error("Unknown evidence reference kind '{kind}' in {raw}")]
    UnknownKind { kind: String, raw: String },

    #[error("Evidence reference has an empty target: {0}")]
    EmptyTarget(String),

    #[error("Path evidence reference needs a numeric index: {0}")]
    BadPathIndex(String),
}

/// A reference tying a synthesized claim to one retrievable record
///
/// Serialized as its string form, e.g. `seed:aapl_10k_2024:0:3f9a1c2b7e`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EvidenceRef {
    /// Chunk returned by vector similarity search
    Seed(String),
    /// Chunk reached through graph expansion
    Expanded(String),
    /// Graph traversal record, by position in the pack
    Path(usize),
    /// SQL result, by query hash
    Sql(String),
}

impl EvidenceRef {
    pub const SEED: &'static str = "seed";
    pub const EXPANDED: &'static str = "exp";
    pub const PATH: &'static str = "path";
    pub const SQL: &'static str = "sql";

    pub fn kind(&self) -> &'static str {
        match self {
            EvidenceRef::Seed(_) => Self::SEED,
            EvidenceRef::Expanded(_) => Self::EXPANDED,
            EvidenceRef::Path(_) => Self::PATH,
            EvidenceRef::Sql(_) => Self::SQL,
        }
    }

    /// Chunk id for `seed:`/`exp:` references
    pub fn chunk_id(&self) -> Option<&str> {
        match self {
            EvidenceRef::Seed(id) | EvidenceRef::Expanded(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for EvidenceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvidenceRef::Seed(id) | EvidenceRef::Expanded(id) | EvidenceRef::Sql(id) => {
                write!(f, "{}:{}", self.kind(), id)
            }
            EvidenceRef::Path(index) => write!(f, "{}:{}", self.kind(), index),
        }
    }
}

impl FromStr for EvidenceRef {
    type Err = EvidenceRefError;

    // Chunk ids contain ':' themselves, so only the first separator splits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, target) = s
            .split_once(':')
            .ok_or_else(|| EvidenceRefError::MissingKind(s.to_string()))?;

        if target.is_empty() {
            return Err(EvidenceRefError::EmptyTarget(s.to_string()));
        }

        match kind {
            Self::SEED => Ok(EvidenceRef::Seed(target.to_string())),
            Self::EXPANDED => Ok(EvidenceRef::Expanded(target.to_string())),
            Self::SQL => Ok(EvidenceRef::Sql(target.to_string())),
            Self::PATH => target
                .parse()
                .map(EvidenceRef::Path)
                .map_err(|_| EvidenceRefError::BadPathIndex(s.to_string())),
            other => Err(EvidenceRefError::UnknownKind {
                kind: other.to_string(),
                raw: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for EvidenceRef {
    type Error = EvidenceRefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EvidenceRef> for String {
    fn from(value: EvidenceRef) -> Self {
        value.to_string()
    }
}
