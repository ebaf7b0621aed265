//! Inline `@Title` reference resolution.
//!
//! A reference is `@` at the start of the text or after whitespace,
//! followed by a catalogued document title (case-insensitive) that ends at
//! the end of the text or before a non-alphanumeric character. When titles
//! share a prefix the longest match wins, so `@Q3 Report` beats `@Q3`.
//! Each match becomes `[REF:<document id>]` in the rewritten text.
//! [`ResolvedReferences::render`] puts the original `@Title` back for
//! documents whose content did not make it into the prompt.

use std::sync::Arc;

use crate::context::source::{DocumentCatalog, DocumentSource};

/// Rewritten text plus the documents it names.
pub struct ResolvedReferences {
    /// Input with every reference replaced by its placeholder.
    pub text: String,
    /// Referenced documents, first mention first, without repeats.
    pub documents: Vec<Arc<dyn DocumentSource>>,
    segments: Vec<Segment>,
}

enum Segment {
    Text(String),
    Mention { document_id: String, raw: String },
}

impl ResolvedReferences {
    /// Rewritten text where only mentions accepted by `included` become
    /// placeholders; the rest keep the text the user typed.
    pub fn render(&self, included: impl Fn(&str) -> bool) -> String {
        let mut out = String::with_capacity(self.text.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Mention { document_id, raw } => {
                    if included(document_id) {
                        out.push_str(&placeholder(document_id));
                    } else {
                        out.push_str(raw);
                    }
                }
            }
        }
        out
    }
}

/// Placeholder substituted for a reference to `document_id`.
pub fn placeholder(document_id: &str) -> String {
    format!("[REF:{document_id}]")
}

/// Find and replace every `@Title` in `text`.
pub fn resolve_references(text: &str, catalog: &DocumentCatalog) -> ResolvedReferences {
    let entries: Vec<(String, Arc<dyn DocumentSource>)> = catalog
        .entries()
        .into_iter()
        .map(|s| (s.title(), s))
        .filter(|(title, _)| !title.is_empty())
        .collect();

    let mut segments = Vec::new();
    let mut plain = String::new();
    let mut documents: Vec<Arc<dyn DocumentSource>> = Vec::new();
    let mut rest = text;
    let mut prev: Option<char> = None;

    while let Some(c) = rest.chars().next() {
        if c == '@' && prev.is_none_or(char::is_whitespace) {
            let after = &rest[1..];
            if let Some((len, source)) = longest_title_match(after, &entries) {
                let id = source.document_id();
                if !plain.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut plain)));
                }
                segments.push(Segment::Mention {
                    document_id: id.clone(),
                    raw: rest[..=len].to_owned(),
                });
                if !documents.iter().any(|d| d.document_id() == id) {
                    documents.push(Arc::clone(source));
                }
                prev = after[..len].chars().next_back();
                rest = &after[len..];
                continue;
            }
        }
        plain.push(c);
        prev = Some(c);
        rest = &rest[c.len_utf8()..];
    }
    if !plain.is_empty() {
        segments.push(Segment::Text(plain));
    }

    let mut resolved = ResolvedReferences {
        text: String::new(),
        documents,
        segments,
    };
    resolved.text = resolved.render(|_| true);
    resolved
}

fn longest_title_match<'a>(
    text: &str,
    entries: &'a [(String, Arc<dyn DocumentSource>)],
) -> Option<(usize, &'a Arc<dyn DocumentSource>)> {
    entries
        .iter()
        .filter_map(|(title, source)| {
            let len = prefix_len_ignore_case(text, title)?;
            let boundary = text[len..].chars().next().is_none_or(|c| !c.is_alphanumeric());
            boundary.then_some((len, source))
        })
        .max_by_key(|(len, _)| *len)
}

/// Byte length of the prefix of `text` equal to `prefix` ignoring case.
fn prefix_len_ignore_case(text: &str, prefix: &str) -> Option<usize> {
    let mut consumed = 0;
    let mut text_chars = text.chars();
    for p in prefix.chars() {
        let t = text_chars.next()?;
        if !t.to_lowercase().eq(p.to_lowercase()) {
            return None;
        }
        consumed += t.len_utf8();
    }
    Some(consumed)
}
