//! Paragraph-boundary page chunker.
//!
//! Chunks never span pages. Within a page, paragraphs (split on `\n\n`)
//! accumulate until the next one would push the chunk past `max_chars`;
//! an oversized paragraph is hard-split at the last whitespace that fits.
//!
//! Every chunk's text is an exact slice of its page, so `[start, end)` can
//! be mapped back into the page-joined document text.

use crate::types::PAGE_SEPARATOR;

/// Approximate characters-per-token ratio.
pub const CHARS_PER_TOKEN: usize = 4;

/// One chunk of a document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// Position within the document, contiguous from 0.
    pub index: usize,
    /// 1-based page number.
    pub page: u32,
    /// Exact text slice.
    pub text: String,
    /// Byte offset of the first character in the page-joined document text.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
}

/// Split `pages` into chunks of at most `max_tokens` estimated tokens.
///
/// Empty or whitespace-only pages produce no chunks.
pub fn chunk_pages(pages: &[String], max_tokens: usize) -> Vec<Chunk> {
    let max_chars = max_tokens.max(1) * CHARS_PER_TOKEN;
    let mut chunks = Vec::new();
    let mut page_offset = 0;

    for (i, page) in pages.iter().enumerate() {
        let page_no = u32::try_from(i + 1).unwrap_or(u32::MAX);
        for (start, end) in page_spans(page, max_chars) {
            chunks.push(Chunk {
                index: chunks.len(),
                page: page_no,
                text: page[start..end].to_string(),
                start: page_offset + start,
                end: page_offset + end,
            });
        }
        page_offset += page.len() + PAGE_SEPARATOR.len();
    }
    chunks
}

/// Byte spans of one page's chunks.
fn page_spans(page: &str, max_chars: usize) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut buf: Option<(usize, usize)> = None;

    for (start, end) in paragraphs(page) {
        if end - start > max_chars {
            if let Some(span) = buf.take() {
                spans.push(span);
            }
            hard_split(page, start, end, max_chars, &mut spans);
            continue;
        }
        buf = match buf {
            Some((buf_start, _)) if end - buf_start <= max_chars => Some((buf_start, end)),
            Some(span) => {
                spans.push(span);
                Some((start, end))
            }
            None => Some((start, end)),
        };
    }
    if let Some(span) = buf {
        spans.push(span);
    }
    spans
}

/// Trimmed, non-empty paragraphs of `page` as byte spans.
fn paragraphs(page: &str) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut offset = 0;
    for piece in page.split("\n\n") {
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            let lead = piece.len() - piece.trim_start().len();
            let start = offset + lead;
            out.push((start, start + trimmed.len()));
        }
        offset += piece.len() + 2;
    }
    out
}

fn hard_split(page: &str, start: usize, end: usize, max_chars: usize, spans: &mut Vec<(usize, usize)>) {
    let mut s = start;
    while s < end {
        let remaining = &page[s..end];
        if remaining.len() <= max_chars {
            spans.push((s, end));
            break;
        }
        let mut cut = snap_to_char_boundary(remaining, max_chars);
        if let Some(ws) = remaining[..cut].rfind(char::is_whitespace) {
            if ws > 0 {
                cut = ws;
            }
        }
        if cut == 0 {
            cut = remaining.chars().next().map_or(remaining.len(), char::len_utf8);
        }
        let piece = remaining[..cut].trim_end();
        spans.push((s, s + piece.len()));
        s += cut;
        let rest = &page[s..end];
        s += rest.len() - rest.trim_start().len();
    }
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::join_pages;
    use proptest::prelude::*;

    fn pages(p: &[&str]) -> Vec<String> {
        p.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn small_page_is_one_chunk() {
        let chunks = chunk_pages(&pages(&["Hello world.\n\nSecond paragraph."]), 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello world.\n\nSecond paragraph.");
        assert_eq!(chunks[0].page, 1);
    }

    #[test]
    fn chunks_never_span_pages() {
        let chunks = chunk_pages(&pages(&["alpha", "beta"]), 100);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page, 1);
        assert_eq!(chunks[1].page, 2);
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn paragraphs_split_when_over_limit() {
        let p = format!("{}\n\n{}", "a".repeat(30), "b".repeat(30));
        let chunks = chunk_pages(&pages(&[&p]), 10);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "a".repeat(30));
        assert_eq!(chunks[1].text, "b".repeat(30));
    }

    #[test]
    fn oversized_paragraph_hard_splits_on_whitespace() {
        let p = "word ".repeat(20);
        let chunks = chunk_pages(&pages(&[p.trim()]), 2);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.len() <= 8, "{:?}", c.text);
            assert!(!c.text.starts_with(' ') && !c.text.ends_with(' '));
        }
    }

    #[test]
    fn multibyte_text_is_not_broken() {
        let p = "é".repeat(50);
        let chunks = chunk_pages(&pages(&[&p]), 3);
        let rebuilt: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rebuilt, p);
    }

    #[test]
    fn blank_pages_yield_nothing() {
        assert!(chunk_pages(&pages(&["", "  \n\n  "]), 10).is_empty());
    }

    proptest! {
        #[test]
        fn offsets_map_back_into_document(
            raw in prop::collection::vec("[a-z ]{0,60}(\n\n[a-z ]{0,60}){0,3}", 1..4),
            tokens in 1usize..20,
        ) {
            let doc = join_pages(&raw);
            for c in chunk_pages(&raw, tokens) {
                prop_assert_eq!(&doc[c.start..c.end], c.text.as_str());
                prop_assert!(!c.text.trim().is_empty());
            }
        }
    }
}
