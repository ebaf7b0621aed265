//! Retrieval result types.

use serde::{Deserialize, Serialize};

/// Where a chunk sits inside its document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkLocation {
    /// 1-based pages the chunk covers. Empty when unknown.
    pub pages: Vec<u32>,
    /// Half-open byte range within the page-joined document text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_range: Option<(usize, usize)>,
}

/// One ranked hit from a semantic or keyword query.
///
/// Transient: produced per query, never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Chunk text.
    pub text: String,
    /// Backend score; higher is better. Scale depends on the query kind.
    pub relevance_score: f64,
    /// Owning document.
    pub document_id: String,
    /// Position inside the document.
    pub location: ChunkLocation,
}

/// Separator placed between pages when they are joined into one text.
///
/// Byte ranges in [`ChunkLocation::char_range`] are offsets into the pages
/// joined with this separator.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Join pages the same way the index computes offsets.
pub fn join_pages(pages: &[String]) -> String {
    pages.join(PAGE_SEPARATOR)
}
