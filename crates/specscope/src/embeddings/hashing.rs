//! Deterministic feature-hashing embedder
//!
//! Works offline and gives identical vectors across runs, which keeps
//! rankings reproducible in tests and in deployments without a model server.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{l2_normalize, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::index::tokenize;

/// Weight of adjacent-token bigrams relative to unigrams
const BIGRAM_WEIGHT: f32 = 0.5;

/// Hashes tokens and token bigrams into signed buckets
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(&self, feature: &str) -> (usize, f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut idx = [0u8; 8];
        idx.copy_from_slice(&digest[..8]);
        let index = (u64::from_le_bytes(idx) % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }

    /// Synchronous embedding, used by the trait and by benches
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        let tokens = tokenize(text);

        for token in &tokens {
            let (i, s) = self.bucket(token);
            v[i] += s;
        }
        for pair in tokens.windows(2) {
            let (i, s) = self.bucket(&format!("{} {}", pair[0], pair[1]));
            v[i] += s * BIGRAM_WEIGHT;
        }

        l2_normalize(&mut v);
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::embedding("Cannot embed empty text"));
        }
        Ok(self.embed_sync(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::cosine_similarity;

    #[tokio::test]
    async fn test_deterministic_and_normalized() {
        let e = HashEmbedder::new(128);
        let a = e.embed("Fire rating of doors shall be 90 minutes").await.unwrap();
        let b = e.embed("Fire rating of doors shall be 90 minutes").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 128);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_shared_terms_are_closer() {
        let e = HashEmbedder::new(256);
        let q = e.embed("door fire rating").await.unwrap();
        let near = e.embed("The fire rating for each door assembly").await.unwrap();
        let far = e.embed("Concrete slump shall not exceed four inches").await.unwrap();
        assert!(cosine_similarity(&q, &near) > cosine_similarity(&q, &far));
    }

    #[tokio::test]
    async fn test_empty_text_is_an_error() {
        let e = HashEmbedder::new(8);
        assert!(matches!(e.embed("   ").await, Err(Error::Embedding(_))));
    }
}
