//! Context management service.
//!
//! Turns a document plus a request into a [`DocumentContext`], consulting
//! the shared [`ContextCache`] for extractable types first.

use std::sync::Arc;

use chrono::Utc;
use docent_core::{ContextType, DocumentContext, SelectionRect};
use docent_retrieval::join_pages;
use tracing::{debug, instrument, warn};

use crate::context::cache::ContextCache;
use crate::context::cache_store::{CacheEntry, CacheKey};
use crate::context::source::{DocumentSource, ExtractScope};
use crate::context::token_estimator::estimate_tokens;
use crate::errors::ExtractionError;

/// What to build a context from.
#[derive(Clone, Debug, PartialEq)]
pub enum ContextRequest {
    /// Every page.
    FullDocument,
    /// The given 1-based pages.
    Pages(Vec<u32>),
    /// Whole document named by an `@Title` reference.
    Reference,
    /// Text the user selected.
    Selection {
        /// Selected text.
        text: String,
        /// Pages the selection spans.
        pages: Option<Vec<u32>>,
        /// On-page rectangles.
        bounds: Option<Vec<SelectionRect>>,
        /// Byte range in the page-joined text.
        char_range: Option<(usize, usize)>,
    },
}

/// Creates, caches and measures contexts.
pub struct ContextService {
    cache: Arc<ContextCache>,
}

impl ContextService {
    /// Service backed by `cache`.
    pub fn new(cache: Arc<ContextCache>) -> Self {
        Self { cache }
    }

    /// The shared cache.
    pub fn cache(&self) -> &Arc<ContextCache> {
        &self.cache
    }

    /// Build a context for `source`.
    ///
    /// Extractable types return a cached context when one is fresh for the
    /// source's current fingerprint; otherwise the source is extracted and
    /// the cache entry overwritten.
    #[instrument(skip_all, fields(document_id = %source.document_id(), request = request.label()))]
    pub async fn create_context(
        &self,
        source: &dyn DocumentSource,
        request: &ContextRequest,
    ) -> Result<DocumentContext, ExtractionError> {
        let (context_type, scope, key) = match request {
            ContextRequest::Selection {
                text,
                pages,
                bounds,
                char_range,
            } => {
                return Ok(selection_context(
                    source,
                    text,
                    pages.as_deref(),
                    bounds.as_deref(),
                    *char_range,
                ));
            }
            ContextRequest::FullDocument => (
                ContextType::FullDocument,
                ExtractScope::All,
                CacheKey::document(source.document_id(), ContextType::FullDocument),
            ),
            ContextRequest::Reference => (
                ContextType::Reference,
                ExtractScope::All,
                CacheKey::document(source.document_id(), ContextType::Reference),
            ),
            ContextRequest::Pages(pages) => (
                ContextType::PageRange,
                ExtractScope::Pages(pages.clone()),
                CacheKey::pages(source.document_id(), pages.clone()),
            ),
        };

        let fingerprint = source.fingerprint();
        if let Some(entry) = self.cache.get(&key, &fingerprint, Utc::now()).await {
            debug!("context cache hit");
            return Ok(entry.context.clone());
        }

        let pages = extract_with_retry(source, &scope)?;
        let content = join_pages(&pages);
        let page_numbers = match scope {
            ExtractScope::All => (1..=source.page_count()).collect(),
            ExtractScope::Pages(pages) => pages,
        };
        let tokens = estimate_tokens(&content);
        let mut context = DocumentContext::new(
            source.document_id(),
            source.title(),
            context_type,
            content,
            "text",
            tokens,
        )
        .with_pages(page_numbers);
        if context_type != ContextType::PageRange {
            let len = context.content.len();
            context = context.with_character_range(0, len);
        }

        self.cache.put(
            key,
            CacheEntry {
                context: context.clone(),
                source_fingerprint: fingerprint,
            },
        );
        debug!(tokens = context.token_count(), "context extracted");
        Ok(context)
    }
}

impl ContextRequest {
    fn label(&self) -> &'static str {
        match self {
            Self::FullDocument => "full_document",
            Self::Pages(_) => "pages",
            Self::Reference => "reference",
            Self::Selection { .. } => "selection",
        }
    }
}

fn selection_context(
    source: &dyn DocumentSource,
    text: &str,
    pages: Option<&[u32]>,
    bounds: Option<&[SelectionRect]>,
    char_range: Option<(usize, usize)>,
) -> DocumentContext {
    let mut context = DocumentContext::new(
        source.document_id(),
        source.title(),
        ContextType::TextSelection,
        text,
        "selection",
        estimate_tokens(text),
    );
    if let Some(pages) = pages {
        context = context.with_pages(pages.to_vec());
    }
    if let Some(bounds) = bounds {
        context = context.with_selection_bounds(bounds.to_vec());
    }
    if let Some((start, end)) = char_range {
        context = context.with_character_range(start, end);
    }
    context
}

/// Extract `scope` from `source`, retrying once when the failure is
/// transient.
pub fn extract_with_retry(
    source: &dyn DocumentSource,
    scope: &ExtractScope,
) -> Result<Vec<String>, ExtractionError> {
    match source.extract(scope) {
        Err(e) if e.is_retryable() => {
            warn!(document_id = %source.document_id(), error = %e, "extraction failed, retrying once");
            source.extract(scope)
        }
        other => other,
    }
}
