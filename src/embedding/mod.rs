//! Embedding generation
//!
//! - `EmbeddingProvider` trait for abstraction
//! - `FastEmbedProvider` for local model embedding (all-MiniLM-L6-v2, 384-dim)
//! - `HashingEmbedder`, a deterministic feature-hashing backend for offline
//!   runs and tests
//!
//! Every provider returns unit-length vectors so cosine similarity reduces to
//! a dot product.

mod hashing;
mod provider;

pub use hashing::HashingEmbedder;
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};

use crate::config::EmbeddingConfig;
use std::sync::Arc;

/// Scale `vector` to unit length in place; zero vectors are left untouched
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity of two vectors of equal length
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a <= f32::EPSILON || mag_b <= f32::EPSILON {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

/// Build the provider selected by `embedding.backend`
pub fn provider_from_config(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    match config.backend.as_str() {
        "fastembed" => Ok(Arc::new(FastEmbedProvider::new(&config.model)?)),
        "hashing" => Ok(Arc::new(HashingEmbedder::new(config.dimension)?)),
        other => Err(EmbeddingError::InitializationError(format!(
            "Unknown embedding backend: {}. Supported: fastembed, hashing",
            other
        ))),
    }
}
