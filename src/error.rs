use crate::embedding::EmbeddingError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Citeline
#[derive(Error, Debug)]
pub enum CitelineError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// The corpus directory produced no documents
    #[error("No documents with extension '{extension}' found in {dir}")]
    EmptyCorpus { dir: PathBuf, extension: String },

    /// A source document could not be read or normalized
    #[error("Malformed document {path}: {reason}")]
    MalformedDocument { path: PathBuf, reason: String },

    /// A single chunk failed extraction or graph write; the build is aborted
    #[error("Failed to index chunk {chunk_id}: {reason}")]
    ChunkIndexing { chunk_id: String, reason: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool errors
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// The configured vector collection does not exist
    #[error("Vector collection not found: {name}")]
    CollectionNotFound { name: String },

    /// Vector store contract violations (dimension mismatch, corrupt rows)
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// Graph store failures
    #[error("Graph store error: {0}")]
    GraphStore(String),

    /// Embedding backend errors
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// A query was refused by the read-only SQL guard
    #[error("SQL query rejected: {0}")]
    SqlRejected(String),

    /// Retrieval exceeded its deadline; no partial pack is returned
    #[error("Retrieval timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl CitelineError {
    pub(crate) fn io(source: std::io::Error, context: impl Into<String>) -> Self {
        Self::Io {
            source,
            context: context.into(),
        }
    }

    pub(crate) fn json(source: serde_json::Error, context: impl Into<String>) -> Self {
        Self::Json {
            source,
            context: context.into(),
        }
    }
}

impl From<r2d2::Error> for CitelineError {
    fn from(e: r2d2::Error) -> Self {
        Self::Pool(e.to_string())
    }
}

/// Result type for Citeline operations
pub type Result<T> = std::result::Result<T, CitelineError>;
