use crate::config::{Config, SCHEMA_VERSION};
use crate::error::{CitelineError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, reporting every violation at once
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_indexing(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_sql(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CitelineError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        let paths = [
            ("storage.vector_db", &config.storage.vector_db),
            ("storage.graph_db", &config.storage.graph_db),
            ("storage.mapping_path", &config.storage.mapping_path),
        ];

        for (key, path) in paths {
            if path.as_os_str().is_empty() {
                errors.push(ValidationError::new(key, "Path cannot be empty"));
            }
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let backend = &config.embedding.backend;
        if backend != "fastembed" && backend != "hashing" {
            errors.push(ValidationError::new(
                "embedding.backend",
                format!("Backend must be 'fastembed' or 'hashing', got '{}'", backend),
            ));
        }

        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Dimension must be greater than 0",
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }
    }

    fn validate_indexing(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.indexing.chunk_size == 0 {
            errors.push(ValidationError::new(
                "indexing.chunk_size",
                "Chunk size must be greater than 0",
            ));
        }

        if config.indexing.collection.trim().is_empty() {
            errors.push(ValidationError::new(
                "indexing.collection",
                "Collection name cannot be empty",
            ));
        }

        if config.indexing.doc_extension.trim().is_empty() {
            errors.push(ValidationError::new(
                "indexing.doc_extension",
                "Document extension cannot be empty",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if retrieval.top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.top_k",
                "top_k must be greater than 0",
            ));
        }

        if retrieval.max_paths == 0 {
            errors.push(ValidationError::new(
                "retrieval.max_paths",
                "max_paths must be greater than 0",
            ));
        }

        if retrieval.max_concurrent_traversals == 0 {
            errors.push(ValidationError::new(
                "retrieval.max_concurrent_traversals",
                "At least one concurrent traversal is required",
            ));
        }

        if retrieval.request_timeout_ms == 0 {
            errors.push(ValidationError::new(
                "retrieval.request_timeout_ms",
                "Timeout must be greater than 0",
            ));
        }
    }

    fn validate_sql(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.sql.max_limit == 0 {
            errors.push(ValidationError::new(
                "sql.max_limit",
                "max_limit must be greater than 0",
            ));
        }

        if config.sql.allowed_tables.is_empty() {
            errors.push(ValidationError::new(
                "sql.allowed_tables",
                "At least one table must be allow-listed",
            ));
        }
    }
}
