//! The retrieval seam used by the context pipeline.

use async_trait::async_trait;

use crate::errors::Result;
use crate::types::SearchResult;

/// Embedding/retrieval backend.
///
/// Scores are backend-specific; callers normalize each result list before
/// mixing semantic and keyword hits.
#[async_trait]
pub trait RetrievalClient: Send + Sync {
    /// Index (or re-index) a document's pages, replacing any previous
    /// entry for `document_id`.
    async fn ingest(&self, document_id: &str, pages: &[String], fingerprint: &str) -> Result<()>;

    /// Whether `document_id` is indexed at exactly `fingerprint`.
    async fn is_indexed(&self, document_id: &str, fingerprint: &str) -> Result<bool>;

    /// Nearest neighbours of `text`, best first, at most `k`.
    async fn query(&self, text: &str, k: usize) -> Result<Vec<SearchResult>>;

    /// Keyword matches of `text`, best first, at most `k`.
    async fn keyword_query(&self, text: &str, k: usize) -> Result<Vec<SearchResult>>;
}
