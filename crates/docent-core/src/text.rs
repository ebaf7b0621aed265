//! Char-safe text helpers for log previews and prompt assembly.

/// Shorten `s` to at most `max_chars` characters, appending `…` when cut.
///
/// Counts Unicode scalar values, so multi-byte characters are never split.
pub fn preview(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        None => s.to_owned(),
        Some((cut, _)) => format!("{}…", &s[..cut]),
    }
}

/// Number of Unicode scalar values in `s`.
#[inline]
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_short_string_unchanged() {
        assert_eq!(preview("hello", 10), "hello");
        assert_eq!(preview("hello", 5), "hello");
    }

    #[test]
    fn preview_cuts_and_marks() {
        assert_eq!(preview("hello world", 5), "hello…");
    }

    #[test]
    fn preview_respects_multibyte() {
        assert_eq!(preview("café au lait", 4), "café…");
        assert_eq!(preview("🦀🦀🦀", 1), "🦀…");
    }

    #[test]
    fn preview_zero() {
        assert_eq!(preview("abc", 0), "…");
        assert_eq!(preview("", 0), "");
    }

    #[test]
    fn char_len_counts_scalars() {
        assert_eq!(char_len("ab—c"), 4);
    }

    #[test]
    fn squash_collapses_runs() {
        assert_eq!(squash_whitespace("  a \n\t b  "), "a b");
    }
}
