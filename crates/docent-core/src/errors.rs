//! Error tags shared across crates.
//!
//! Each crate owns its own `thiserror` enum. When a turn fails, the
//! failure is reduced to an [`ErrorKind`] tag plus a user-facing message so
//! transcripts, session state and the turn event stream can match on the
//! kind instead of on message text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of a turn failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Document text could not be read.
    Extraction,
    /// Embedding/search backend unavailable, timed out, or failed to ingest.
    Retrieval,
    /// Network or model failure while generating.
    Streaming,
    /// The turn was superseded or aborted.
    Cancelled,
    /// Unknown session or capacity exhausted.
    Session,
}

impl ErrorKind {
    /// Stable string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Extraction => "extraction",
            Self::Retrieval => "retrieval",
            Self::Streaming => "streaming",
            Self::Cancelled => "cancelled",
            Self::Session => "session",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded turn failure, kept as the session's `last_error`.
#[derive(Clone, Debug, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{kind}: {message}")]
pub struct TurnFailure {
    /// Failure category.
    pub kind: ErrorKind,
    /// User-facing description.
    pub message: String,
    /// When the failure was recorded.
    pub at: DateTime<Utc>,
}

impl TurnFailure {
    /// Record a failure now.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            at: Utc::now(),
        }
    }
}
