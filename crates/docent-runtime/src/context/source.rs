//! Document sources and the catalog of known documents.
//!
//! A [`DocumentSource`] is anything that can hand out page text. The
//! pipeline never reads files itself: attachments, `@Title` references and
//! the active document are all resolved through the [`DocumentCatalog`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use docent_core::content_checksum;
use parking_lot::RwLock;

use crate::errors::ExtractionError;

/// Form feed, the page break of plain-text exports.
const PAGE_BREAK: char = '\x0c';

/// Which part of a document to extract.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExtractScope {
    /// Every page.
    All,
    /// The given 1-based pages, in the given order.
    Pages(Vec<u32>),
}

/// A readable document.
#[cfg_attr(test, mockall::automock)]
pub trait DocumentSource: Send + Sync {
    /// Stable document ID.
    fn document_id(&self) -> String;

    /// Display title, also matched by `@Title` references.
    fn title(&self) -> String;

    /// Number of pages.
    fn page_count(&self) -> u32;

    /// Cheap checksum of the underlying bytes. Changes whenever extraction
    /// would produce different text.
    fn fingerprint(&self) -> String;

    /// Extract page text for `scope`, one string per page.
    fn extract(&self, scope: &ExtractScope) -> Result<Vec<String>, ExtractionError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// TextDocument
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory document made of plain-text pages.
#[derive(Clone, Debug)]
pub struct TextDocument {
    id: String,
    title: String,
    pages: Vec<String>,
    fingerprint: String,
}

impl TextDocument {
    /// Build from pages.
    pub fn new(id: impl Into<String>, title: impl Into<String>, pages: Vec<String>) -> Self {
        let fingerprint = content_checksum(&pages.join(&PAGE_BREAK.to_string()));
        Self {
            id: id.into(),
            title: title.into(),
            pages,
            fingerprint,
        }
    }

    /// Build from text with pages separated by form feeds.
    pub fn from_text(id: impl Into<String>, title: impl Into<String>, text: &str) -> Self {
        let mut pages: Vec<String> = text.split(PAGE_BREAK).map(str::to_owned).collect();
        if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
            let _ = pages.pop();
        }
        Self::new(id, title, pages)
    }

    /// Read a text file. The file name is both ID and title.
    pub fn load(path: &Path) -> Result<Self, ExtractionError> {
        let text = std::fs::read_to_string(path).map_err(|e| ExtractionError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self::from_text(name.clone(), name, &text))
    }

    /// All pages.
    pub fn pages(&self) -> &[String] {
        &self.pages
    }
}

impl DocumentSource for TextDocument {
    fn document_id(&self) -> String {
        self.id.clone()
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn fingerprint(&self) -> String {
        self.fingerprint.clone()
    }

    fn extract(&self, scope: &ExtractScope) -> Result<Vec<String>, ExtractionError> {
        match scope {
            ExtractScope::All => Ok(self.pages.clone()),
            ExtractScope::Pages(pages) => pages
                .iter()
                .map(|&page| {
                    page.checked_sub(1)
                        .and_then(|i| self.pages.get(i as usize))
                        .cloned()
                        .ok_or_else(|| ExtractionError::PageOutOfRange {
                            document_id: self.id.clone(),
                            page,
                            page_count: self.page_count(),
                        })
                })
                .collect(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DocumentCatalog
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct CatalogInner {
    order: Vec<String>,
    by_id: HashMap<String, Arc<dyn DocumentSource>>,
}

/// Registry of documents the pipeline may read, in registration order.
///
/// Internally synchronized; share it behind an `Arc`.
#[derive(Default)]
pub struct DocumentCatalog {
    inner: RwLock<CatalogInner>,
}

impl DocumentCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document, replacing any previous one with the same ID.
    pub fn insert(&self, source: Arc<dyn DocumentSource>) {
        let id = source.document_id();
        let mut inner = self.inner.write();
        if inner.by_id.insert(id.clone(), source).is_none() {
            inner.order.push(id);
        }
    }

    /// Look up by ID.
    pub fn get(&self, document_id: &str) -> Option<Arc<dyn DocumentSource>> {
        self.inner.read().by_id.get(document_id).cloned()
    }

    /// Case-insensitive exact title lookup. The first registered match wins.
    pub fn find_by_title(&self, title: &str) -> Option<Arc<dyn DocumentSource>> {
        let wanted = title.to_lowercase();
        self.entries()
            .into_iter()
            .find(|s| s.title().to_lowercase() == wanted)
    }

    /// Every document, in registration order.
    pub fn entries(&self) -> Vec<Arc<dyn DocumentSource>> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.by_id.get(id).cloned())
            .collect()
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for DocumentCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCatalog")
            .field("documents", &self.inner.read().order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn doc() -> TextDocument {
        TextDocument::new(
            "report",
            "Report.pdf",
            vec!["one".into(), "two".into(), "three".into()],
        )
    }

    #[test]
    fn extract_selected_pages_in_order() {
        let pages = doc().extract(&ExtractScope::Pages(vec![3, 1])).unwrap();
        assert_eq!(pages, vec!["three".to_string(), "one".to_string()]);
    }

    #[test]
    fn extract_rejects_page_zero_and_overflow() {
        assert_matches!(
            doc().extract(&ExtractScope::Pages(vec![0])),
            Err(ExtractionError::PageOutOfRange { page: 0, .. })
        );
        assert_matches!(
            doc().extract(&ExtractScope::Pages(vec![4])),
            Err(ExtractionError::PageOutOfRange { page_count: 3, .. })
        );
    }

    #[test]
    fn from_text_splits_on_form_feed() {
        let d = TextDocument::from_text("d", "D", "first\x0csecond\x0c");
        assert_eq!(d.pages(), &["first".to_string(), "second".to_string()]);
        assert_eq!(d.page_count(), 2);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = TextDocument::new("d", "D", vec!["x".into()]);
        let b = TextDocument::new("d", "D", vec!["x".into()]);
        let c = TextDocument::new("d", "D", vec!["y".into()]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn load_reads_file_and_names_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "p1\x0cp2").unwrap();
        let d = TextDocument::load(&path).unwrap();
        assert_eq!(d.document_id(), "notes.txt");
        assert_eq!(d.title(), "notes.txt");
        assert_eq!(d.page_count(), 2);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert_matches!(
            TextDocument::load(&dir.path().join("absent.txt")),
            Err(ExtractionError::Io { .. })
        );
    }

    #[test]
    fn catalog_keeps_order_and_finds_titles() {
        let catalog = DocumentCatalog::new();
        catalog.insert(Arc::new(TextDocument::new("b", "Beta", vec![])));
        catalog.insert(Arc::new(TextDocument::new("a", "Alpha", vec![])));
        catalog.insert(Arc::new(TextDocument::new("b", "Beta v2", vec![])));

        let ids: Vec<String> = catalog.entries().iter().map(|s| s.document_id()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.find_by_title("ALPHA").unwrap().document_id(), "a");
        assert_eq!(catalog.get("b").unwrap().title(), "Beta v2");
        assert!(catalog.find_by_title("Beta").is_none());
    }
}
