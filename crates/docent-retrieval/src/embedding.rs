//! Embedding service trait and the feature-hashing embedder.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::errors::{Result, RetrievalError};
use crate::normalize::l2_normalize;
use crate::terms::term_frequencies;

/// Trait for embedding text into vectors.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text (default: calls `embed` with one item).
    async fn embed_single(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::Embedding("empty result".into()))
    }

    /// Whether the service is ready for inference.
    fn is_ready(&self) -> bool;

    /// Output embedding dimensions.
    fn dimensions(&self) -> usize;
}

/// Bag-of-words embedder using the hashing trick.
///
/// Each term is hashed with SHA-256; the first eight bytes pick a bucket
/// and the ninth byte picks a sign. Buckets accumulate `1 + ln(tf)` and the
/// result is L2-normalized, so cosine similarity approximates weighted
/// term overlap. Deterministic across runs and platforms.
pub struct HashingEmbedder {
    dims: usize,
    ready: AtomicBool,
}

impl HashingEmbedder {
    /// Create an embedder producing `dims`-dimensional vectors.
    pub fn new(dims: usize) -> Self {
        Self {
            dims: dims.max(1),
            ready: AtomicBool::new(true),
        }
    }

    /// Toggle readiness. A service that is not ready fails every call.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    fn bucket(&self, term: &str) -> (usize, f32) {
        let hash = Sha256::digest(term.as_bytes());
        let mut idx = [0u8; 8];
        idx.copy_from_slice(&hash[..8]);
        let bucket = (u64::from_le_bytes(idx) % self.dims as u64) as usize;
        let sign = if hash[8] & 1 == 0 { 1.0 } else { -1.0 };
        (bucket, sign)
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for (term, count) in term_frequencies(text) {
            let (bucket, sign) = self.bucket(&term);
            let weight = 1.0 + (count as f32).ln();
            v[bucket] += sign * weight;
        }
        l2_normalize(&mut v);
        v
    }
}

#[async_trait]
impl EmbeddingService for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if !self.is_ready() {
            return Err(RetrievalError::Embedding("embedder not ready".into()));
        }
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{cosine_similarity, l2_norm};

    #[tokio::test]
    async fn single_returns_correct_dims() {
        let svc = HashingEmbedder::new(128);
        let v = svc.embed_single("revenue growth").await.unwrap();
        assert_eq!(v.len(), 128);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn batch_correct_count() {
        let svc = HashingEmbedder::new(64);
        let texts = vec!["a b".to_string(), "cc dd".to_string(), "ee".to_string()];
        let results = svc.embed(&texts).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn deterministic_same_input() {
        let svc = HashingEmbedder::new(256);
        let a = svc.embed_single("hello world").await.unwrap();
        let b = svc.embed_single("hello world").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn shared_terms_score_higher() {
        let svc = HashingEmbedder::new(256);
        let q = svc.embed_single("quarterly revenue").await.unwrap();
        let near = svc
            .embed_single("revenue rose this quarterly period")
            .await
            .unwrap();
        let far = svc.embed_single("penguins nest on ice").await.unwrap();
        assert!(cosine_similarity(&q, &near) > cosine_similarity(&q, &far));
    }

    #[tokio::test]
    async fn text_without_terms_is_zero_vector() {
        let svc = HashingEmbedder::new(16);
        let v = svc.embed_single("a, the; of").await.unwrap();
        assert!(l2_norm(&v) < f32::EPSILON);
    }

    #[tokio::test]
    async fn not_ready_returns_error() {
        let svc = HashingEmbedder::new(16);
        svc.set_ready(false);
        let result = svc.embed_single("x").await;
        assert!(matches!(result, Err(RetrievalError::Embedding(_))));
    }
}
