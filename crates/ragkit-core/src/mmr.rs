//! Maximal Marginal Relevance (MMR) diversification.
//!
//! Greedy selection: at each step pick the remaining candidate with the
//! highest
//!
//! ```text
//! mmr = λ × cos(candidate, query) − (1 − λ) × max cos(candidate, selected)
//! ```
//!
//! where the redundancy term is `0` while nothing is selected. Ties go to
//! the candidate seen first. MMR decides which candidates make the cut;
//! the returned list is then re-sorted by fused score, since downstream
//! citation numbering follows that order.

use std::cmp::Ordering;

use crate::embedding::cosine_similarity;
use crate::scoring::ScoredCandidate;

pub const DEFAULT_LAMBDA: f64 = 0.7;

/// Select up to `top_k` diverse candidates, returned in fused-score order.
pub fn select(
    query_vector: &[f32],
    candidates: Vec<ScoredCandidate>,
    top_k: usize,
    lambda: f64,
) -> Vec<ScoredCandidate> {
    let mut selected = select_in_mmr_order(query_vector, candidates, top_k, lambda);
    selected.sort_by(|a, b| {
        b.fused_score()
            .partial_cmp(&a.fused_score())
            .unwrap_or(Ordering::Equal)
    });
    selected
}

/// The greedy pass alone, in the order items were picked.
pub fn select_in_mmr_order(
    query_vector: &[f32],
    candidates: Vec<ScoredCandidate>,
    top_k: usize,
    lambda: f64,
) -> Vec<ScoredCandidate> {
    let lambda = if lambda.is_nan() {
        DEFAULT_LAMBDA
    } else {
        lambda.clamp(0.0, 1.0)
    };
    let target = top_k.min(candidates.len());

    // (candidate, relevance, max similarity to anything selected so far)
    let mut remaining: Vec<(ScoredCandidate, f64, f64)> = candidates
        .into_iter()
        .map(|c| {
            let relevance = cosine_similarity(&c.candidate.embedding, query_vector) as f64;
            (c, relevance, 0.0)
        })
        .collect();
    let mut selected: Vec<ScoredCandidate> = Vec::with_capacity(target);

    while selected.len() < target && !remaining.is_empty() {
        let mut best_pos = 0;
        let mut best_mmr = f64::NEG_INFINITY;
        for (pos, (_, relevance, redundancy)) in remaining.iter().enumerate() {
            let mmr = lambda * relevance - (1.0 - lambda) * redundancy;
            if mmr > best_mmr {
                best_mmr = mmr;
                best_pos = pos;
            }
        }

        let (picked, _, _) = remaining.remove(best_pos);
        for (other, _, redundancy) in remaining.iter_mut() {
            let sim = cosine_similarity(&other.candidate.embedding, &picked.candidate.embedding)
                as f64;
            if selected.is_empty() || sim > *redundancy {
                *redundancy = sim;
            }
        }
        selected.push(picked);
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::tests::make_candidate;
    use crate::scoring::ScoreBreakdown;

    fn scored(id: &str, embedding: Vec<f32>, fused: f64) -> ScoredCandidate {
        let mut candidate = make_candidate(id, 0.0, 0.0, 0.0);
        candidate.embedding = embedding;
        ScoredCandidate {
            candidate,
            breakdown: ScoreBreakdown {
                dense: 0.0,
                lexical: 0.0,
                decay: 1.0,
                fused,
            },
        }
    }

    fn ids(v: &[ScoredCandidate]) -> Vec<&str> {
        v.iter().map(|s| s.candidate.id.as_str()).collect()
    }

    fn angled(deg: f32) -> Vec<f32> {
        let r = deg.to_radians();
        vec![r.cos(), r.sin(), 0.0]
    }

    fn near_duplicate_pool() -> Vec<ScoredCandidate> {
        // "a" at 25°, its near-duplicate at 28°, "b" on the other side at -30°.
        vec![
            scored("a", angled(25.0), 0.9),
            scored("a-dup", angled(28.0), 0.89),
            scored("b", angled(-30.0), 0.6),
        ]
    }

    #[test]
    fn test_prefers_distinct_over_near_duplicate() {
        let query = vec![1.0, 0.0, 0.0];
        let out = select_in_mmr_order(&query, near_duplicate_pool(), 2, 0.7);
        assert_eq!(ids(&out), vec!["a", "b"]);
    }

    #[test]
    fn test_lambda_one_is_pure_relevance() {
        let query = vec![1.0, 0.0, 0.0];
        let out = select_in_mmr_order(&query, near_duplicate_pool(), 2, 1.0);
        assert_eq!(ids(&out), vec!["a", "a-dup"]);
    }

    #[test]
    fn test_output_resorted_by_fused_score() {
        let query = vec![1.0, 0.0];
        // "x" is most similar to the query but has the lowest fused score.
        let cands = vec![
            scored("x", vec![1.0, 0.0], 0.2),
            scored("y", vec![0.0, 1.0], 0.8),
        ];
        let order = select_in_mmr_order(&query, cands.clone(), 2, 0.7);
        assert_eq!(ids(&order), vec!["x", "y"]);
        let out = select(&query, cands, 2, 0.7);
        assert_eq!(ids(&out), vec!["y", "x"]);
    }

    #[test]
    fn test_ties_broken_by_first_seen() {
        let query = vec![1.0, 0.0];
        let cands = vec![
            scored("first", vec![1.0, 0.0], 0.5),
            scored("second", vec![1.0, 0.0], 0.5),
        ];
        let out = select_in_mmr_order(&query, cands, 1, 0.7);
        assert_eq!(ids(&out), vec!["first"]);
    }

    #[test]
    fn test_size_is_min_of_top_k_and_len() {
        let query = vec![1.0, 0.0];
        let cands = vec![
            scored("a", vec![1.0, 0.0], 0.5),
            scored("b", vec![0.0, 1.0], 0.4),
        ];
        assert_eq!(select(&query, cands.clone(), 10, 0.7).len(), 2);
        assert_eq!(select(&query, cands.clone(), 1, 0.7).len(), 1);
        assert!(select(&query, cands, 0, 0.7).is_empty());
        assert!(select(&query, Vec::new(), 5, 0.7).is_empty());
    }

    #[test]
    fn test_redundancy_uses_closest_selected() {
        let query = vec![1.0, 0.0, 0.0];
        let cands = vec![
            scored("a", vec![1.0, 0.0, 0.0], 0.9),
            scored("b", vec![0.7, 0.714, 0.0], 0.7),
            scored("b2", vec![0.69, 0.72, 0.05], 0.69),
            scored("c", vec![0.6, 0.0, 0.8], 0.6),
        ];
        let out = select_in_mmr_order(&query, cands, 3, 0.7);
        assert_eq!(ids(&out), vec!["a", "b", "c"]);
    }
}
