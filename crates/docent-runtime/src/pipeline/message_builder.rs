//! Message builder: the per-turn context pipeline.
//!
//! Stages, strictly in order:
//!
//! 1. Resolve `@Title` references into `reference` contexts.
//! 2. Turn attachments into `textSelection` contexts.
//! 3. Make sure the active document is indexed.
//! 4. Run the semantic and keyword queries, normalize and merge them.
//! 5. Deduplicate candidates by checksum and overlapping range.
//! 6. Admit explicit contexts, then fill the rest of the budget greedily.
//! 7. Format the prompt.
//!
//! Any failure aborts the whole build; there is no partial-context
//! fallback. The cancellation token is checked at every stage boundary and
//! raced against every suspension point, so a cancelled build never
//! returns a prompt.

use std::future::Future;
use std::sync::Arc;

use docent_core::{ChatContextBundle, ContextType, DocumentContext, SelectionRect};
use docent_retrieval::{RetrievalClient, SearchResult, min_max_normalize};
use docent_settings::PipelineSettings;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::context::service::{ContextRequest, ContextService, extract_with_retry};
use crate::context::source::{DocumentCatalog, ExtractScope};
use crate::context::token_estimator::estimate_tokens;
use crate::errors::PipelineError;
use crate::pipeline::formatter::format_prompt;
use crate::pipeline::references::resolve_references;
use crate::pipeline::selection::{ScoredContext, dedup_candidates, fit_pinned, optimize_for_budget};

/// Pipeline tuning.
#[derive(Clone, Debug, PartialEq)]
pub struct BuilderConfig {
    /// Maximum estimated context tokens per prompt.
    pub token_limit: usize,
    /// Results requested from the semantic query.
    pub semantic_top_k: usize,
    /// Results requested from the keyword query.
    pub keyword_top_k: usize,
    /// Bonus for candidates from documents not yet selected.
    pub diversity_bonus: f64,
}

impl From<&PipelineSettings> for BuilderConfig {
    fn from(s: &PipelineSettings) -> Self {
        Self {
            token_limit: s.token_limit,
            semantic_top_k: s.semantic_top_k,
            keyword_top_k: s.keyword_top_k,
            diversity_bonus: s.diversity_bonus,
        }
    }
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self::from(&PipelineSettings::default())
    }
}

/// Text the user attached to a turn by hand.
#[derive(Clone, Debug, PartialEq)]
pub struct Attachment {
    /// Document the text was selected in.
    pub document_id: String,
    /// Selected text.
    pub text: String,
    /// Pages the selection spans.
    pub pages: Option<Vec<u32>>,
    /// On-page rectangles.
    pub bounds: Option<Vec<SelectionRect>>,
    /// Byte range in the page-joined document text.
    pub char_range: Option<(usize, usize)>,
}

impl Attachment {
    /// Selection of `text` in `document_id`.
    pub fn selection(document_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            text: text.into(),
            pages: None,
            bounds: None,
            char_range: None,
        }
    }

    /// Record the pages the selection spans.
    #[must_use]
    pub fn with_pages(mut self, pages: Vec<u32>) -> Self {
        self.pages = Some(pages);
        self
    }

    /// Record the selection's byte range.
    #[must_use]
    pub fn with_char_range(mut self, start: usize, end: usize) -> Self {
        self.char_range = Some((start, end));
        self
    }
}

/// Everything one build needs besides the bundle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TurnInput {
    /// Raw user text.
    pub text: String,
    /// Hand-selected text, in selection order.
    pub attachments: Vec<Attachment>,
    /// Document currently open, if any.
    pub active_document_id: Option<String>,
}

/// Result of a successful build.
#[derive(Clone, Debug, PartialEq)]
pub struct BuiltPrompt {
    /// Formatted prompt sent as the user message.
    pub prompt: String,
    /// Contexts the prompt contains, in bundle order.
    pub contexts: Vec<DocumentContext>,
    /// Estimated tokens of `contexts`.
    pub used_tokens: usize,
}

/// Runs the context pipeline.
pub struct MessageBuilder {
    catalog: Arc<DocumentCatalog>,
    service: Arc<ContextService>,
    retrieval: Arc<dyn RetrievalClient>,
    config: BuilderConfig,
}

impl MessageBuilder {
    /// Builder over explicitly passed collaborators.
    pub fn new(
        catalog: Arc<DocumentCatalog>,
        service: Arc<ContextService>,
        retrieval: Arc<dyn RetrievalClient>,
        config: BuilderConfig,
    ) -> Self {
        Self {
            catalog,
            service,
            retrieval,
            config,
        }
    }

    /// Document catalog.
    pub fn catalog(&self) -> &Arc<DocumentCatalog> {
        &self.catalog
    }

    /// Pipeline tuning.
    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Run every stage and fill `bundle`.
    ///
    /// Contexts already in `bundle` are kept ahead of this turn's explicit
    /// contexts. On error `bundle` may hold a partial result; callers that
    /// need it untouched build into a copy.
    #[instrument(skip_all, fields(session_id = %bundle.session_id()))]
    pub async fn build(
        &self,
        bundle: &mut ChatContextBundle,
        input: &TurnInput,
        cancel: &CancellationToken,
    ) -> Result<BuiltPrompt, PipelineError> {
        let mut pinned: Vec<DocumentContext> = bundle.contexts().to_vec();

        // 1. references
        checkpoint(cancel)?;
        let resolved = resolve_references(&input.text, &self.catalog);
        for source in &resolved.documents {
            let ctx = race(cancel, async {
                self.service
                    .create_context(source.as_ref(), &ContextRequest::Reference)
                    .await
                    .map_err(PipelineError::from)
            })
            .await?;
            pinned.push(ctx);
        }
        debug!(references = resolved.documents.len(), "references resolved");

        // 2. attachments
        checkpoint(cancel)?;
        for attachment in &input.attachments {
            let source = self
                .catalog
                .get(&attachment.document_id)
                .ok_or_else(|| PipelineError::UnknownDocument(attachment.document_id.clone()))?;
            let request = ContextRequest::Selection {
                text: attachment.text.clone(),
                pages: attachment.pages.clone(),
                bounds: attachment.bounds.clone(),
                char_range: attachment.char_range,
            };
            pinned.push(self.service.create_context(source.as_ref(), &request).await?);
        }
        debug!(attachments = input.attachments.len(), "attachments merged");

        // 3. active document
        checkpoint(cancel)?;
        if let Some(document_id) = &input.active_document_id {
            race(cancel, self.register_active(document_id)).await?;
        }

        // 4. retrieval
        checkpoint(cancel)?;
        let candidates = race(cancel, self.retrieve(&input.text)).await?;

        // 5. dedup
        checkpoint(cancel)?;
        let candidates = dedup_candidates(candidates, &pinned);

        // 6. selection
        checkpoint(cancel)?;
        let limit = self.config.token_limit;
        let (admitted, used) = fit_pinned(pinned, limit);
        let chosen = optimize_for_budget(candidates, limit - used, self.config.diversity_bonus);
        bundle.reset();
        for ctx in admitted.into_iter().chain(chosen) {
            let _ = bundle.add(ctx);
        }

        // 7. format
        checkpoint(cancel)?;
        let query = resolved.render(|id| {
            bundle
                .contexts()
                .iter()
                .any(|c| c.context_type == ContextType::Reference && c.document_id == id)
        });
        let prompt = format_prompt(bundle.contexts(), &query);
        debug!(
            contexts = bundle.len(),
            tokens = bundle.token_count(),
            limit,
            "context built"
        );
        Ok(BuiltPrompt {
            prompt,
            contexts: bundle.contexts().to_vec(),
            used_tokens: bundle.token_count(),
        })
    }

    async fn register_active(&self, document_id: &str) -> Result<(), PipelineError> {
        let source = self
            .catalog
            .get(document_id)
            .ok_or_else(|| PipelineError::UnknownDocument(document_id.to_string()))?;
        let fingerprint = source.fingerprint();
        if self.retrieval.is_indexed(document_id, &fingerprint).await? {
            return Ok(());
        }
        let pages = extract_with_retry(source.as_ref(), &ExtractScope::All)?;
        self.retrieval
            .ingest(document_id, &pages, &fingerprint)
            .await?;
        debug!(document_id, pages = pages.len(), "active document ingested");
        Ok(())
    }

    async fn retrieve(&self, text: &str) -> Result<Vec<ScoredContext>, PipelineError> {
        let (mut semantic, mut keyword) = tokio::try_join!(
            self.retrieval.query(text, self.config.semantic_top_k),
            self.retrieval.keyword_query(text, self.config.keyword_top_k),
        )?;
        min_max_normalize(&mut semantic);
        min_max_normalize(&mut keyword);
        debug!(
            semantic = semantic.len(),
            keyword = keyword.len(),
            "retrieval done"
        );
        Ok(semantic
            .into_iter()
            .chain(keyword)
            .map(|r| self.candidate(r))
            .collect())
    }

    fn candidate(&self, result: SearchResult) -> ScoredContext {
        let title = self
            .catalog
            .get(&result.document_id)
            .map_or_else(|| result.document_id.clone(), |s| s.title());
        let context_type = if result.location.pages.is_empty() {
            ContextType::SemanticChunk
        } else {
            ContextType::PageRange
        };
        let tokens = estimate_tokens(&result.text);
        let mut context = DocumentContext::new(
            result.document_id,
            title,
            context_type,
            result.text,
            "retrieval",
            tokens,
        );
        if !result.location.pages.is_empty() {
            context = context.with_pages(result.location.pages);
        }
        if let Some((start, end)) = result.location.char_range {
            context = context.with_character_range(start, end);
        }
        ScoredContext::new(context, result.relevance_score)
    }
}

fn checkpoint(cancel: &CancellationToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

async fn race<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, PipelineError>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(PipelineError::Cancelled),
        result = fut => result,
    }
}
