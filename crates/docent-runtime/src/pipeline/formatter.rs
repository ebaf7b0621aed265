//! Deterministic prompt layout.
//!
//! ```text
//! === Document: Report.pdf ===
//! Pages 2:
//! <content>
//!
//! ---
//! User Query: summarize page 2
//! ```
//!
//! Documents appear in the order their first context was added; contexts
//! inside a document keep insertion order. Scores play no part, so the same
//! bundle always yields the same bytes.

use docent_core::{ContextType, DocumentContext};

/// Separator between the document blocks and the query.
pub const QUERY_DELIMITER: &str = "---";

/// Render `contexts` and the user query as one prompt.
pub fn format_prompt(contexts: &[DocumentContext], query: &str) -> String {
    let mut groups: Vec<(&str, &str, Vec<&DocumentContext>)> = Vec::new();
    for ctx in contexts {
        match groups.iter_mut().find(|(id, _, _)| *id == ctx.document_id) {
            Some((_, _, members)) => members.push(ctx),
            None => groups.push((ctx.document_id.as_str(), ctx.document_title.as_str(), vec![ctx])),
        }
    }

    let mut out = String::new();
    for (_, title, members) in &groups {
        out.push_str("=== Document: ");
        out.push_str(title);
        out.push_str(" ===\n");
        for ctx in members {
            out.push_str(&label(ctx));
            out.push('\n');
            out.push_str(&ctx.content);
            out.push_str("\n\n");
        }
    }
    if !groups.is_empty() {
        out.push_str(QUERY_DELIMITER);
        out.push('\n');
    }
    out.push_str("User Query: ");
    out.push_str(query);
    out
}

fn label(ctx: &DocumentContext) -> String {
    match ctx.context_type {
        ContextType::FullDocument => "Full Document Content:".to_string(),
        ContextType::PageRange => match ctx.metadata.page_numbers.as_deref() {
            Some(pages) if !pages.is_empty() => {
                let list: Vec<String> = pages.iter().map(u32::to_string).collect();
                format!("Pages {}:", list.join(","))
            }
            _ => "Relevant Section:".to_string(),
        },
        ContextType::TextSelection => "Selected Text:".to_string(),
        ContextType::SemanticChunk => "Relevant Section:".to_string(),
        ContextType::Reference => "Referenced Content:".to_string(),
    }
}
