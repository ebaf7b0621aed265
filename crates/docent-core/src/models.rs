//! Document context model.
//!
//! A [`DocumentContext`] is one retrieved or selected piece of document
//! text, ready to be placed in a prompt. Its `metadata.checksum` is the
//! SHA-256 of `content`: two contexts with the same checksum are
//! interchangeable and never both appear in one bundle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ids::ContextId;

// ─────────────────────────────────────────────────────────────────────────────
// ContextType
// ─────────────────────────────────────────────────────────────────────────────

/// How a context was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContextType {
    /// The whole text of a document.
    FullDocument,
    /// One or more whole pages.
    PageRange,
    /// Text the user selected by hand.
    TextSelection,
    /// A retrieval chunk with no page attribution.
    SemanticChunk,
    /// A document named inline with `@Title`.
    Reference,
}

impl ContextType {
    /// Wire name (camelCase), also used in cache keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullDocument => "fullDocument",
            Self::PageRange => "pageRange",
            Self::TextSelection => "textSelection",
            Self::SemanticChunk => "semanticChunk",
            Self::Reference => "reference",
        }
    }

    /// Whether contexts of this type are produced by extraction and may be cached.
    ///
    /// Selections come from the user and chunks from the retrieval client,
    /// so neither has anything to reuse.
    pub fn is_cacheable(self) -> bool {
        matches!(self, Self::FullDocument | Self::PageRange | Self::Reference)
    }
}

impl std::fmt::Display for ContextType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Metadata
// ─────────────────────────────────────────────────────────────────────────────

/// A selection rectangle in page coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectionRect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

/// Extraction metadata attached to every context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextMetadata {
    /// 1-based page numbers the content came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_numbers: Option<Vec<u32>>,
    /// On-page rectangles of a manual selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_bounds: Option<Vec<SelectionRect>>,
    /// Half-open byte range `[start, end)` within the document text with pages
    /// joined by a blank line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_range: Option<(usize, usize)>,
    /// Free-form label of the extractor (`"text"`, `"selection"`, `"retrieval"`).
    pub extraction_method: String,
    /// Estimated token count of `content`.
    pub token_count: usize,
    /// SHA-256 of `content`, lowercase hex.
    pub checksum: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// DocumentContext
// ─────────────────────────────────────────────────────────────────────────────

/// One retrieved or selected piece of document text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentContext {
    /// Unique context ID.
    pub id: ContextId,
    /// Owning document.
    pub document_id: String,
    /// Display title of the owning document.
    pub document_title: String,
    /// How the context was obtained.
    pub context_type: ContextType,
    /// Extracted text.
    pub content: String,
    /// Extraction metadata.
    pub metadata: ContextMetadata,
    /// When the content was extracted.
    pub extracted_at: DateTime<Utc>,
}

impl DocumentContext {
    /// Build a context, computing the checksum from `content`.
    pub fn new(
        document_id: impl Into<String>,
        document_title: impl Into<String>,
        context_type: ContextType,
        content: impl Into<String>,
        extraction_method: impl Into<String>,
        token_count: usize,
    ) -> Self {
        let content = content.into();
        let checksum = content_checksum(&content);
        Self {
            id: ContextId::new(),
            document_id: document_id.into(),
            document_title: document_title.into(),
            context_type,
            content,
            metadata: ContextMetadata {
                page_numbers: None,
                selection_bounds: None,
                character_range: None,
                extraction_method: extraction_method.into(),
                token_count,
                checksum,
            },
            extracted_at: Utc::now(),
        }
    }

    /// Attach page numbers.
    #[must_use]
    pub fn with_pages(mut self, pages: Vec<u32>) -> Self {
        self.metadata.page_numbers = Some(pages);
        self
    }

    /// Attach selection rectangles.
    #[must_use]
    pub fn with_selection_bounds(mut self, bounds: Vec<SelectionRect>) -> Self {
        self.metadata.selection_bounds = Some(bounds);
        self
    }

    /// Attach a character range.
    #[must_use]
    pub fn with_character_range(mut self, start: usize, end: usize) -> Self {
        self.metadata.character_range = Some((start, end));
        self
    }

    /// Override the extraction timestamp.
    #[must_use]
    pub fn with_extracted_at(mut self, at: DateTime<Utc>) -> Self {
        self.extracted_at = at;
        self
    }

    /// Estimated tokens of this context.
    pub fn token_count(&self) -> usize {
        self.metadata.token_count
    }

    /// Content checksum.
    pub fn checksum(&self) -> &str {
        &self.metadata.checksum
    }

    /// True when both contexts belong to the same document and their
    /// character ranges intersect. Contexts without a range never overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        if self.document_id != other.document_id {
            return false;
        }
        match (self.metadata.character_range, other.metadata.character_range) {
            (Some((a_start, a_end)), Some((b_start, b_end))) => a_start < b_end && b_start < a_end,
            _ => false,
        }
    }

    /// Elapsed time since extraction, measured against `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.extracted_at)
    }
}

/// SHA-256 of `text` as lowercase hex.
pub fn content_checksum(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
