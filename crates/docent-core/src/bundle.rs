//! Session-scoped context accumulator.
//!
//! The bundle keeps contexts in insertion order (the order the user
//! selected them) and refuses a context whose checksum is already present.
//! It is cleared at the start of every turn; the active-document pointer
//! survives the reset.

use serde::Serialize;

use crate::ids::SessionId;
use crate::models::DocumentContext;

/// Per-session list of contexts plus the active-document pointer.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatContextBundle {
    session_id: SessionId,
    contexts: Vec<DocumentContext>,
    active_document_id: Option<String>,
}

impl ChatContextBundle {
    /// Create an empty bundle for a session.
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            contexts: Vec::new(),
            active_document_id: None,
        }
    }

    /// Owning session.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Append a context. Returns `false` (and drops it) if a context with
    /// the same checksum is already present.
    pub fn add(&mut self, context: DocumentContext) -> bool {
        if self.contains_checksum(context.checksum()) {
            return false;
        }
        self.contexts.push(context);
        true
    }

    /// Whether any held context has this checksum.
    pub fn contains_checksum(&self, checksum: &str) -> bool {
        self.contexts.iter().any(|c| c.checksum() == checksum)
    }

    /// Drop every context. Keeps the active document.
    pub fn reset(&mut self) {
        self.contexts.clear();
    }

    /// Contexts in insertion order.
    pub fn contexts(&self) -> &[DocumentContext] {
        &self.contexts
    }

    /// Number of contexts.
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Whether the bundle holds no contexts.
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Sum of the held contexts' token counts.
    pub fn token_count(&self) -> usize {
        self.contexts.iter().map(DocumentContext::token_count).sum()
    }

    /// Currently open document, if any.
    pub fn active_document_id(&self) -> Option<&str> {
        self.active_document_id.as_deref()
    }

    /// Point the bundle at an open document (or none).
    pub fn set_active_document(&mut self, document_id: Option<String>) {
        self.active_document_id = document_id;
    }

    /// Document IDs in order of first appearance.
    pub fn document_order(&self) -> Vec<&str> {
        let mut order: Vec<&str> = Vec::new();
        for c in &self.contexts {
            if !order.contains(&c.document_id.as_str()) {
                order.push(&c.document_id);
            }
        }
        order
    }
}
