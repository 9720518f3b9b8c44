//! Deterministic feature-hashing embedder
//!
//! Each lowercase alphanumeric token is hashed with BLAKE3 into one of
//! `dimension` buckets with a +/-1 sign; the bucket counts are then
//! normalized. Texts sharing vocabulary land close together, which is enough
//! for offline retrieval and for tests that must not download a model.

use super::{normalize, EmbeddingError, EmbeddingProvider};

pub struct HashingEmbedder {
    dimension: usize,
    model_name: String,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self, EmbeddingError> {
        if dimension == 0 {
            return Err(EmbeddingError::InitializationError(
                "Hashing embedder dimension must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            dimension,
            model_name: format!("hashing-{}", dimension),
        })
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let hash = blake3::hash(token.as_bytes());
        let bytes = hash.as_bytes();
        let mut index = [0u8; 8];
        index.copy_from_slice(&bytes[..8]);
        let bucket = (u64::from_le_bytes(index) % self.dimension as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        (bucket, sign)
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        let lower = trimmed.to_lowercase();
        let mut tokens: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        // Punctuation-only text still gets a stable, non-zero vector.
        if tokens.is_empty() {
            tokens.push(&lower);
        }

        let mut vector = vec![0.0f32; self.dimension];
        for token in tokens {
            let (bucket, sign) = self.bucket(token);
            vector[bucket] += sign;
        }

        // Colliding signs can cancel out exactly; fall back to the whole text.
        if vector.iter().all(|x| *x == 0.0) {
            let (bucket, _) = self.bucket(&lower);
            vector[bucket] = 1.0;
        }

        normalize(&mut vector);
        Ok(vector)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
