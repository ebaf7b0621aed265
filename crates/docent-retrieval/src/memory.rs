//! In-process retrieval index.
//!
//! Brute-force cosine KNN over [`EmbeddingService`] vectors plus a
//! TF-IDF keyword scorer over the same chunks. Suitable for the handful of
//! documents a reading session works with.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, instrument};

use crate::chunk::{Chunk, chunk_pages};
use crate::client::RetrievalClient;
use crate::embedding::EmbeddingService;
use crate::errors::{Result, RetrievalError};
use crate::normalize::cosine_similarity;
use crate::terms::{term_frequencies, terms};
use crate::types::{ChunkLocation, SearchResult};

struct IndexedChunk {
    chunk: Chunk,
    vector: Vec<f32>,
    tf: HashMap<String, u32>,
}

struct IndexedDocument {
    fingerprint: String,
    chunks: Vec<IndexedChunk>,
}

/// [`RetrievalClient`] backed by an in-memory index.
pub struct InMemoryRetrievalClient {
    embedder: Arc<dyn EmbeddingService>,
    chunk_tokens: usize,
    docs: RwLock<HashMap<String, IndexedDocument>>,
}

impl InMemoryRetrievalClient {
    /// Create an empty index chunking at `chunk_tokens` estimated tokens.
    pub fn new(embedder: Arc<dyn EmbeddingService>, chunk_tokens: usize) -> Self {
        Self {
            embedder,
            chunk_tokens,
            docs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of indexed documents.
    pub fn document_count(&self) -> usize {
        self.docs.read().len()
    }

    /// Number of indexed chunks across all documents.
    pub fn chunk_count(&self) -> usize {
        self.docs.read().values().map(|d| d.chunks.len()).sum()
    }

    /// Drop a document from the index. Returns whether it was present.
    pub fn remove(&self, document_id: &str) -> bool {
        self.docs.write().remove(document_id).is_some()
    }

    /// Rank `(document_id, chunk, score)` triples, best first. Ties break
    /// on document ID then chunk index so results are deterministic.
    fn top_k(mut scored: Vec<(String, &Chunk, f64)>, k: usize) -> Vec<SearchResult> {
        scored.sort_by(|a, b| {
            b.2.total_cmp(&a.2)
                .then_with(|| a.0.cmp(&b.0))
                .then_with(|| a.1.index.cmp(&b.1.index))
        });
        scored
            .into_iter()
            .take(k)
            .map(|(document_id, chunk, score)| SearchResult {
                text: chunk.text.clone(),
                relevance_score: score,
                document_id,
                location: ChunkLocation {
                    pages: vec![chunk.page],
                    char_range: Some((chunk.start, chunk.end)),
                },
            })
            .collect()
    }
}

#[async_trait]
impl RetrievalClient for InMemoryRetrievalClient {
    #[instrument(skip_all, fields(document_id = %document_id, pages = pages.len()))]
    async fn ingest(&self, document_id: &str, pages: &[String], fingerprint: &str) -> Result<()> {
        let chunks = chunk_pages(pages, self.chunk_tokens);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder
                .embed(&texts)
                .await
                .map_err(|e| RetrievalError::Ingest {
                    document_id: document_id.to_string(),
                    message: e.to_string(),
                })?
        };
        if vectors.len() != chunks.len() {
            return Err(RetrievalError::Ingest {
                document_id: document_id.to_string(),
                message: format!("{} vectors for {} chunks", vectors.len(), chunks.len()),
            });
        }

        let indexed: Vec<IndexedChunk> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexedChunk {
                tf: term_frequencies(&chunk.text),
                chunk,
                vector,
            })
            .collect();
        debug!(document_id, chunks = indexed.len(), "document indexed");
        let _ = self.docs.write().insert(
            document_id.to_string(),
            IndexedDocument {
                fingerprint: fingerprint.to_string(),
                chunks: indexed,
            },
        );
        Ok(())
    }

    async fn is_indexed(&self, document_id: &str, fingerprint: &str) -> Result<bool> {
        Ok(self
            .docs
            .read()
            .get(document_id)
            .is_some_and(|d| d.fingerprint == fingerprint))
    }

    #[instrument(skip_all, fields(k = k))]
    async fn query(&self, text: &str, k: usize) -> Result<Vec<SearchResult>> {
        let q = self.embedder.embed_single(text).await?;
        let docs = self.docs.read();
        let scored: Vec<(String, &Chunk, f64)> = docs
            .iter()
            .flat_map(|(id, doc)| {
                doc.chunks
                    .iter()
                    .map(|c| (id.clone(), &c.chunk, f64::from(cosine_similarity(&q, &c.vector))))
            })
            .filter(|(_, _, score)| *score > 0.0)
            .collect();
        Ok(Self::top_k(scored, k))
    }

    #[instrument(skip_all, fields(k = k))]
    async fn keyword_query(&self, text: &str, k: usize) -> Result<Vec<SearchResult>> {
        let query_terms: HashSet<String> = terms(text).into_iter().collect();
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }
        let docs = self.docs.read();
        let total = docs.values().map(|d| d.chunks.len()).sum::<usize>();
        let idf: HashMap<&str, f64> = query_terms
            .iter()
            .map(|t| {
                let df = docs
                    .values()
                    .flat_map(|d| &d.chunks)
                    .filter(|c| c.tf.contains_key(t))
                    .count();
                (t.as_str(), (1.0 + total as f64 / (df.max(1) as f64)).ln())
            })
            .collect();

        let scored: Vec<(String, &Chunk, f64)> = docs
            .iter()
            .flat_map(|(id, doc)| {
                doc.chunks.iter().map(|c| {
                    let score: f64 = idf
                        .iter()
                        .map(|(t, w)| f64::from(c.tf.get(*t).copied().unwrap_or(0)) * w)
                        .sum();
                    (id.clone(), &c.chunk, score)
                })
            })
            .filter(|(_, _, score)| *score > 0.0)
            .collect();
        Ok(Self::top_k(scored, k))
    }
}
