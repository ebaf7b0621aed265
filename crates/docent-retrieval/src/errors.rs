//! Retrieval errors.

use thiserror::Error;

/// Failure of the embedding/retrieval backend.
///
/// Cloneable so test doubles can hand out the same scripted failure on
/// every call.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RetrievalError {
    /// Backend unreachable or refusing requests.
    #[error("retrieval backend unavailable: {0}")]
    Unavailable(String),
    /// Backend did not answer in time.
    #[error("retrieval timed out after {after_ms}ms")]
    Timeout {
        /// Elapsed time before giving up.
        after_ms: u64,
    },
    /// A document could not be ingested.
    #[error("failed to index document {document_id}: {message}")]
    Ingest {
        /// Document that failed.
        document_id: String,
        /// Backend message.
        message: String,
    },
    /// The embedding model failed or is not loaded.
    #[error("embedding failed: {0}")]
    Embedding(String),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, RetrievalError>;
