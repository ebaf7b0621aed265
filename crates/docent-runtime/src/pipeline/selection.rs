//! Candidate deduplication and budget-aware selection.

use std::collections::HashSet;

use docent_core::DocumentContext;
use tracing::{debug, warn};

/// A retrieval candidate with its normalized relevance.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredContext {
    /// Candidate context.
    pub context: DocumentContext,
    /// Relevance in `[0, 1]`; higher is better.
    pub relevance: f64,
}

impl ScoredContext {
    /// Pair a context with its relevance.
    pub fn new(context: DocumentContext, relevance: f64) -> Self {
        Self { context, relevance }
    }
}

/// Drop candidates that repeat content already chosen.
///
/// Candidates are visited best first (ties keep input order). A candidate
/// is dropped when its checksum was already seen, or when its range
/// overlaps a higher-scoring candidate or a `pinned` context of the same
/// document. Survivors are returned best first.
pub fn dedup_candidates(
    mut candidates: Vec<ScoredContext>,
    pinned: &[DocumentContext],
) -> Vec<ScoredContext> {
    candidates.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));

    let mut seen: HashSet<String> = pinned.iter().map(|c| c.checksum().to_owned()).collect();
    let mut kept: Vec<ScoredContext> = Vec::with_capacity(candidates.len());
    let total = candidates.len();
    for candidate in candidates {
        let ctx = &candidate.context;
        if seen.contains(ctx.checksum())
            || pinned.iter().any(|p| p.overlaps(ctx))
            || kept.iter().any(|k| k.context.overlaps(ctx))
        {
            continue;
        }
        let _ = seen.insert(ctx.checksum().to_owned());
        kept.push(candidate);
    }
    debug!(total, kept = kept.len(), "candidates deduplicated");
    kept
}

/// Admit explicit contexts in order while they fit `limit`.
///
/// Returns the admitted contexts and their token total. A context repeating
/// an earlier checksum, or one too large for what is left, is skipped.
pub fn fit_pinned(contexts: Vec<DocumentContext>, limit: usize) -> (Vec<DocumentContext>, usize) {
    let mut used = 0;
    let mut seen = HashSet::new();
    let mut admitted = Vec::with_capacity(contexts.len());
    for ctx in contexts {
        if !seen.insert(ctx.checksum().to_owned()) {
            continue;
        }
        if used + ctx.token_count() > limit {
            warn!(
                document_id = %ctx.document_id,
                tokens = ctx.token_count(),
                used,
                limit,
                "explicit context exceeds remaining budget, skipping"
            );
            continue;
        }
        used += ctx.token_count();
        admitted.push(ctx);
    }
    (admitted, used)
}

/// Greedy budget-aware selection with a diversity bonus.
///
/// Each step scores every remaining candidate that still fits as
/// `relevance + (document not yet covered ? diversity_bonus : 0)` and takes
/// the best, breaking ties by raw relevance and then by input position.
/// Candidates that do not fit are passed over, not treated as a stopping
/// point, so a later smaller candidate can still be admitted. Selection
/// ends when nothing left fits.
///
/// The token total of the result never exceeds `limit`.
pub fn optimize_for_budget(
    candidates: Vec<ScoredContext>,
    limit: usize,
    diversity_bonus: f64,
) -> Vec<DocumentContext> {
    let offered = candidates.len();
    let mut remaining: Vec<(usize, ScoredContext)> = candidates.into_iter().enumerate().collect();
    let mut covered: HashSet<String> = HashSet::new();
    let mut selected = Vec::new();
    let mut used = 0;

    loop {
        let final_score = |c: &ScoredContext| {
            if covered.contains(&c.context.document_id) {
                c.relevance
            } else {
                c.relevance + diversity_bonus
            }
        };
        let best = remaining
            .iter()
            .enumerate()
            .filter(|(_, (_, c))| used + c.context.token_count() <= limit)
            .max_by(|(_, (pos_a, a)), (_, (pos_b, b))| {
                final_score(a)
                    .total_cmp(&final_score(b))
                    .then_with(|| a.relevance.total_cmp(&b.relevance))
                    .then_with(|| pos_b.cmp(pos_a))
            })
            .map(|(i, _)| i);
        let Some(i) = best else { break };

        let (_, chosen) = remaining.swap_remove(i);
        used += chosen.context.token_count();
        let _ = covered.insert(chosen.context.document_id.clone());
        selected.push(chosen.context);
    }

    if selected.is_empty() && offered > 0 {
        warn!(offered, limit, "BudgetExceededWithoutFit: no candidate fits the budget");
    } else {
        debug!(
            offered,
            selected = selected.len(),
            used,
            limit,
            documents = covered.len(),
            "budget selection done"
        );
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_core::ContextType;
    use proptest::prelude::*;

    fn ctx(doc: &str, content: &str, tokens: usize) -> DocumentContext {
        DocumentContext::new(doc, doc, ContextType::SemanticChunk, content, "retrieval", tokens)
    }

    fn scored(doc: &str, content: &str, tokens: usize, relevance: f64) -> ScoredContext {
        ScoredContext::new(ctx(doc, content, tokens), relevance)
    }

    fn ranged(doc: &str, content: &str, range: (usize, usize), relevance: f64) -> ScoredContext {
        ScoredContext::new(
            ctx(doc, content, 10).with_character_range(range.0, range.1),
            relevance,
        )
    }

    #[test]
    fn dedup_drops_repeated_checksums() {
        let kept = dedup_candidates(
            vec![scored("a", "same", 1, 0.4), scored("b", "same", 1, 0.9)],
            &[],
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].context.document_id, "b");
    }

    #[test]
    fn dedup_keeps_higher_scoring_overlap() {
        let kept = dedup_candidates(
            vec![
                ranged("a", "first", (0, 100), 0.3),
                ranged("a", "second", (50, 150), 0.8),
                ranged("a", "third", (150, 200), 0.5),
                ranged("b", "fourth", (0, 100), 0.1),
            ],
            &[],
        );
        let contents: Vec<&str> = kept.iter().map(|k| k.context.content.as_str()).collect();
        assert_eq!(contents, vec!["second", "third", "fourth"]);
    }

    #[test]
    fn dedup_respects_pinned_contexts() {
        let pinned = vec![ctx("a", "pinned", 5).with_character_range(0, 40)];
        let kept = dedup_candidates(
            vec![
                scored("a", "pinned", 5, 0.9),
                ranged("a", "inside", (10, 20), 0.8),
                ranged("a", "after", (40, 60), 0.7),
            ],
            &pinned,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].context.content, "after");
    }

    #[test]
    fn fit_pinned_keeps_order_and_skips_oversized() {
        let (admitted, used) = fit_pinned(
            vec![ctx("a", "one", 30), ctx("b", "two", 80), ctx("c", "three", 20)],
            60,
        );
        let docs: Vec<&str> = admitted.iter().map(|c| c.document_id.as_str()).collect();
        assert_eq!(docs, vec!["a", "c"]);
        assert_eq!(used, 50);
    }

    #[test]
    fn later_smaller_candidate_still_fits() {
        let chosen = optimize_for_budget(
            vec![
                scored("a", "big", 90, 0.9),
                scored("a", "huge", 200, 0.8),
                scored("a", "small", 10, 0.1),
            ],
            100,
            0.0,
        );
        let contents: Vec<&str> = chosen.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["big", "small"]);
    }

    #[test]
    fn diversity_bonus_spreads_across_documents() {
        let chosen = optimize_for_budget(
            vec![
                scored("a", "a1", 500, 1.0),
                scored("a", "a2", 500, 0.95),
                scored("a", "a3", 500, 0.9),
                scored("b", "b1", 500, 0.85),
                scored("c", "c1", 500, 0.8),
            ],
            1500,
            0.2,
        );
        let contents: Vec<&str> = chosen.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["a1", "b1", "c1"]);
    }

    #[test]
    fn without_bonus_relevance_wins() {
        let chosen = optimize_for_budget(
            vec![
                scored("a", "a1", 500, 1.0),
                scored("a", "a2", 500, 0.95),
                scored("b", "b1", 500, 0.85),
            ],
            1000,
            0.0,
        );
        let contents: Vec<&str> = chosen.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["a1", "a2"]);
    }

    #[test]
    fn nothing_fits_yields_empty_selection() {
        let chosen = optimize_for_budget(vec![scored("a", "x", 50, 1.0)], 10, 0.2);
        assert!(chosen.is_empty());
    }

    #[test]
    fn ties_keep_input_order() {
        let chosen = optimize_for_budget(
            vec![scored("a", "first", 5, 0.5), scored("a", "second", 5, 0.5)],
            5,
            0.2,
        );
        assert_eq!(chosen[0].content, "first");
    }

    proptest! {
        #[test]
        fn selection_never_exceeds_budget(
            items in prop::collection::vec((0usize..4, 1usize..800, 0.0f64..1.0), 0..30),
            limit in 0usize..3000,
            bonus in 0.0f64..1.0,
        ) {
            let candidates: Vec<ScoredContext> = items
                .iter()
                .enumerate()
                .map(|(i, (doc, tokens, rel))| scored(&format!("d{doc}"), &format!("c{i}"), *tokens, *rel))
                .collect();
            let chosen = optimize_for_budget(candidates.clone(), limit, bonus);
            let used: usize = chosen.iter().map(DocumentContext::token_count).sum();
            prop_assert!(used <= limit);

            let chosen_ids: HashSet<&str> = chosen.iter().map(|c| c.content.as_str()).collect();
            for c in &candidates {
                if !chosen_ids.contains(c.context.content.as_str()) {
                    prop_assert!(used + c.context.token_count() > limit);
                }
            }
        }

        #[test]
        fn dedup_leaves_unique_checksums(
            contents in prop::collection::vec("[a-c]{1,2}", 0..20),
        ) {
            let candidates: Vec<ScoredContext> = contents
                .iter()
                .enumerate()
                .map(|(i, c)| scored("d", c, 1, i as f64 / 20.0))
                .collect();
            let kept = dedup_candidates(candidates, &[]);
            let unique: HashSet<&str> = kept.iter().map(|k| k.context.checksum()).collect();
            prop_assert_eq!(unique.len(), kept.len());
        }
    }
}
