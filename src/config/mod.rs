//! Configuration management for Citeline
//!
//! Loaded from TOML, overridden by `CITELINE_SECTION__KEY` environment
//! variables and optional named profiles, then validated as a whole.

use crate::error::{CitelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub indexing: IndexingConfig,
    pub retrieval: RetrievalConfig,
    pub sql: SqlConfig,
    #[serde(default)]
    pub entities: EntityRulesConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Where the dual index and the chunk -> point mapping live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub vector_db: PathBuf,
    pub graph_db: PathBuf,
    pub mapping_path: PathBuf,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "fastembed" or "hashing"
    pub backend: String,
    pub model: String,
    /// Only used by the hashing backend; fastembed reports its own
    pub dimension: usize,
    pub batch_size: usize,
}

/// Index build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    pub docs_dir: PathBuf,
    pub doc_extension: String,
    /// Chunk window in characters
    pub chunk_size: usize,
    pub collection: String,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Nearest-neighbor seeds per query
    pub top_k: usize,
    /// Co-occurring neighbors explored per seed entity
    pub hop_k: usize,
    /// Ceiling on graph path records per query
    pub max_paths: usize,
    /// Graph traversals allowed in flight at once
    pub max_concurrent_traversals: usize,
    pub request_timeout_ms: u64,
}

/// Read-only SQL evidence tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlConfig {
    pub db_path: PathBuf,
    pub allowed_tables: Vec<String>,
    pub max_limit: usize,
}

/// Entity rule table location; `None` uses the built-in table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityRulesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_file: Option<PathBuf>,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hop_k: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CitelineError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| CitelineError::io(e, format!("Failed to read config file: {:?}", path)))?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CitelineError::io(e, format!("Failed to create config directory: {:?}", parent))
            })?;
        }
        std::fs::write(path, content)
            .map_err(|e| CitelineError::io(e, format!("Failed to write config file: {:?}", path)))?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| CitelineError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(top_k) = overrides.top_k {
            self.retrieval.top_k = top_k;
        }
        if let Some(hop_k) = overrides.hop_k {
            self.retrieval.hop_k = hop_k;
        }
        if let Some(backend) = overrides.embedding_backend {
            self.embedding.backend = backend;
        }
        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: CITELINE_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    /// Apply `CITELINE_`-prefixed overrides from any key/value source
    pub fn apply_overrides<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix("CITELINE_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "RETRIEVAL__TOP_K" => self.retrieval.top_k = parse_value(path, value)?,
            "RETRIEVAL__HOP_K" => self.retrieval.hop_k = parse_value(path, value)?,
            "RETRIEVAL__MAX_PATHS" => self.retrieval.max_paths = parse_value(path, value)?,
            "RETRIEVAL__REQUEST_TIMEOUT_MS" => {
                self.retrieval.request_timeout_ms = parse_value(path, value)?
            }
            "EMBEDDING__BACKEND" => self.embedding.backend = value.to_string(),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "INDEXING__DOCS_DIR" => self.indexing.docs_dir = PathBuf::from(value),
            "INDEXING__CHUNK_SIZE" => self.indexing.chunk_size = parse_value(path, value)?,
            "INDEXING__COLLECTION" => self.indexing.collection = value.to_string(),
            "SQL__DB_PATH" => self.sql.db_path = PathBuf::from(value),
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CitelineError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("citeline").join("config.toml"))
    }
}

fn parse_value<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| CitelineError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

/// Expand a leading `~/` against the home directory
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| CitelineError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| CitelineError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = PathBuf::from("~/.citeline");

        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                vector_db: data_dir.join("vectors.sqlite"),
                graph_db: data_dir.join("graph.sqlite"),
                mapping_path: data_dir.join("chunkid_to_pointid.json"),
            },
            embedding: EmbeddingConfig {
                backend: "fastembed".to_string(),
                model: "all-MiniLM-L6-v2".to_string(),
                dimension: 384,
                batch_size: 32,
            },
            indexing: IndexingConfig {
                docs_dir: PathBuf::from("data/docs"),
                doc_extension: "txt".to_string(),
                chunk_size: 900,
                collection: "filings_chunks".to_string(),
            },
            retrieval: RetrievalConfig::default(),
            sql: SqlConfig {
                db_path: PathBuf::from("research.db"),
                allowed_tables: [
                    "prices_daily",
                    "fundamentals",
                    "fundamentals_quarterly",
                    "ratios_ttm",
                    "events",
                    "ticker_meta",
                ]
                .iter()
                .map(|t| t.to_string())
                .collect(),
                max_limit: 200,
            },
            entities: EntityRulesConfig::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            hop_k: 2,
            max_paths: 200,
            max_concurrent_traversals: 4,
            request_timeout_ms: 30_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let mut config = Config::default();
        config.retrieval.top_k = 9;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.retrieval.top_k, 9);
        assert_eq!(loaded.indexing.collection, "filings_chunks");
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load(Path::new("/nonexistent/citeline.toml"));
        assert!(matches!(result, Err(CitelineError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(vec![
            ("CITELINE_RETRIEVAL__HOP_K".to_string(), "1".to_string()),
            ("CITELINE_EMBEDDING__BACKEND".to_string(), "hashing".to_string()),
            ("CITELINE_RETRIEVAL__TOP_K".to_string(), "not-a-number".to_string()),
            ("UNRELATED".to_string(), "x".to_string()),
        ]);
        assert_eq!(config.retrieval.hop_k, 1);
        assert_eq!(config.embedding.backend, "hashing");
        assert_eq!(config.retrieval.top_k, 5);
    }

    #[test]
    fn test_profile() {
        let mut config = Config::default();
        config.profiles.insert(
            "deep".to_string(),
            ProfileOverrides {
                top_k: Some(10),
                hop_k: Some(4),
                ..Default::default()
            },
        );
        config.apply_profile("deep").unwrap();
        assert_eq!(config.retrieval.top_k, 10);
        assert_eq!(config.retrieval.hop_k, 4);
        assert!(config.apply_profile("missing").is_err());
    }

    #[test]
    fn test_expand_path_passthrough() {
        let p = expand_path(Path::new("/tmp/x.sqlite")).unwrap();
        assert_eq!(p, PathBuf::from("/tmp/x.sqlite"));
    }
}
