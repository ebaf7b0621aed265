//! Vector and score normalization.

use crate::types::SearchResult;

/// Euclidean norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale a vector to unit length in place. A zero vector is left unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity of two vectors. Zero when either is a zero vector or
/// the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let denom = l2_norm(a) * l2_norm(b);
    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

/// Min-max normalize relevance scores to `[0, 1]` in place.
///
/// When every score is equal (including a single result) each becomes 1.0.
pub fn min_max_normalize(results: &mut [SearchResult]) {
    if results.is_empty() {
        return;
    }
    let min = results
        .iter()
        .map(|r| r.relevance_score)
        .fold(f64::INFINITY, f64::min);
    let max = results
        .iter()
        .map(|r| r.relevance_score)
        .fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    for r in results.iter_mut() {
        r.relevance_score = if span.abs() < f64::EPSILON {
            1.0
        } else {
            (r.relevance_score - min) / span
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkLocation;

    fn hit(score: f64) -> SearchResult {
        SearchResult {
            text: String::new(),
            relevance_score: score,
            document_id: "d".into(),
            location: ChunkLocation::default(),
        }
    }

    #[test]
    fn normalize_gives_unit_length() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_untouched() {
        let mut v = vec![0.0; 4];
        l2_normalize(&mut v);
        assert!(v.iter().all(|x| x.abs() < f32::EPSILON));
    }

    #[test]
    fn cosine_identical_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0], &[1.0, 0.0]).abs() < f32::EPSILON);
    }

    #[test]
    fn min_max_spans_unit_interval() {
        let mut hits = vec![hit(2.0), hit(4.0), hit(3.0)];
        min_max_normalize(&mut hits);
        let scores: Vec<f64> = hits.iter().map(|h| h.relevance_score).collect();
        assert_eq!(scores, vec![0.0, 1.0, 0.5]);
    }

    #[test]
    fn min_max_equal_scores_become_one() {
        let mut hits = vec![hit(0.3), hit(0.3)];
        min_max_normalize(&mut hits);
        assert!(hits.iter().all(|h| (h.relevance_score - 1.0).abs() < f64::EPSILON));

        let mut single = vec![hit(7.0)];
        min_max_normalize(&mut single);
        assert!((single[0].relevance_score - 1.0).abs() < f64::EPSILON);
    }
}
