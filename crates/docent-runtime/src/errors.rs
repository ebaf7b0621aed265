//! Runtime error types.

use docent_core::ErrorKind;
use docent_retrieval::RetrievalError;

/// Source text could not be read.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    /// The document could not be read right now.
    #[error("document {document_id} unavailable: {message}")]
    Unavailable {
        /// Document ID.
        document_id: String,
        /// Underlying cause.
        message: String,
    },

    /// A requested page does not exist.
    #[error("page {page} out of range for document {document_id} ({page_count} pages)")]
    PageOutOfRange {
        /// Document ID.
        document_id: String,
        /// 1-based page that was requested.
        page: u32,
        /// Pages the document has.
        page_count: u32,
    },

    /// Reading the backing file failed.
    #[error("failed to read {path}: {message}")]
    Io {
        /// File path.
        path: String,
        /// I/O error text.
        message: String,
    },
}

impl ExtractionError {
    /// Whether a second attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::PageOutOfRange { .. })
    }
}

/// Context cache storage failure. Always absorbed by the cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backing store rejected the operation.
    #[error("cache storage error: {0}")]
    Storage(String),

    /// A stored entry could not be decoded.
    #[error("corrupt cache entry {key}: {message}")]
    Corrupt {
        /// Storage key of the entry.
        key: String,
        /// Decode error.
        message: String,
    },
}

impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

/// Failure of one context pipeline run. Aborts the turn.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A required document could not be extracted.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Ingestion or search failed.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// An attachment or active document names no catalogued document.
    #[error("unknown document: {0}")]
    UnknownDocument(String),

    /// The turn was cancelled between stages.
    #[error("context building cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Tag recorded on the transcript and the turn stream.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Extraction(_) | Self::UnknownDocument(_) => ErrorKind::Extraction,
            Self::Retrieval(_) => ErrorKind::Retrieval,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Errors returned synchronously by the orchestrator API.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// No session with this ID.
    #[error("Session not found: {0}")]
    UnknownSession(String),

    /// The process-wide generation limit is reached.
    #[error("Server busy: {max} turns already in flight")]
    ServerBusy {
        /// Configured limit.
        max: usize,
    },
}

impl RuntimeError {
    /// Error category string for logs and callers.
    pub fn category(&self) -> &str {
        match self {
            Self::UnknownSession(_) => "session_not_found",
            Self::ServerBusy { .. } => "server_busy",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_is_not_retryable() {
        let e = ExtractionError::PageOutOfRange {
            document_id: "d".into(),
            page: 9,
            page_count: 3,
        };
        assert!(!e.is_retryable());
        assert!(
            ExtractionError::Unavailable {
                document_id: "d".into(),
                message: "locked".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn pipeline_error_kinds() {
        assert_eq!(
            PipelineError::Retrieval(RetrievalError::Timeout { after_ms: 10 }).kind(),
            ErrorKind::Retrieval
        );
        assert_eq!(
            PipelineError::UnknownDocument("x".into()).kind(),
            ErrorKind::Extraction
        );
        assert_eq!(PipelineError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn retrieval_message_passes_through() {
        let e = PipelineError::from(RetrievalError::Timeout { after_ms: 250 });
        assert_eq!(e.to_string(), "retrieval timed out after 250ms");
    }

    #[test]
    fn runtime_error_categories() {
        assert_eq!(
            RuntimeError::UnknownSession("s".into()).category(),
            "session_not_found"
        );
        assert_eq!(RuntimeError::ServerBusy { max: 2 }.category(), "server_busy");
    }
}
