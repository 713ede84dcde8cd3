//! Deterministic token-hashing embedder
//!
//! Each lowercase word token is hashed into a signed bucket and the result
//! is L2-normalised. Texts sharing vocabulary land close together, which is
//! enough for local runs and tests without a network provider.

use super::Embedder;
use crate::error::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Hashing embedder with a fixed output dimension
pub struct HashEmbedder {
    dimension: usize,
    token: Regex,
}

impl HashEmbedder {
    /// Create an embedder producing `dimension`-length vectors
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::Config("embedding dimension must be positive".to_string()));
        }
        let token = Regex::new(r"[\p{L}\p{N}']+")
            .map_err(|e| Error::Config(format!("invalid token pattern: {e}")))?;
        Ok(Self { dimension, token })
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let h = hasher.finish();
        let index = (h % self.dimension as u64) as usize;
        let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        let mut tokens = 0usize;
        for m in self.token.find_iter(text) {
            let token = m.as_str().to_lowercase();
            let (index, sign) = self.bucket(&token);
            vector[index] += sign;
            tokens += 1;
        }
        if tokens == 0 {
            return Err(Error::Embedding("cannot embed text without tokens".to_string()));
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hash"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::embed_checked;
    use crate::memory::cosine_similarity;

    #[tokio::test]
    async fn test_deterministic_output() {
        let embedder = HashEmbedder::new(64).unwrap();
        let a = embedder.embed("Side project about learning").await.unwrap();
        let b = embedder.embed("side PROJECT about learning").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_scores_higher() {
        let embedder = HashEmbedder::new(256).unwrap();
        let query = embedder.embed("time machine project").await.unwrap();
        let related = embedder.embed("building a time machine").await.unwrap();
        let unrelated = embedder.embed("gardening on sunday morning").await.unwrap();
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_empty_text_fails() {
        let embedder = HashEmbedder::new(8).unwrap();
        assert!(matches!(embedder.embed("  ...  ").await, Err(Error::Embedding(_))));
    }

    #[tokio::test]
    async fn test_embed_checked_rejects_dimension_mismatch() {
        let embedder = HashEmbedder::new(8).unwrap();
        assert!(embed_checked(&embedder, "hello", 8).await.is_ok());
        let err = embed_checked(&embedder, "hello", 1536).await.unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[test]
    fn test_output_is_unit_length() {
        let embedder = HashEmbedder::new(32).unwrap();
        let v = tokio_test::block_on(embedder.embed("walked by the sea at sunset")).unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(HashEmbedder::new(0).is_err());
    }
}
