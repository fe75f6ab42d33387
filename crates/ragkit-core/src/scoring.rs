//! Hybrid scorer: fuse dense similarity, lexical rank, and recency.
//!
//! # Formula
//!
//! ```text
//! fused = α × clamp01(dense) + γ × clamp01(lexical) + β × decay(age_days, half_life_days)
//! ```
//!
//! `lexical` usually arrives unbounded from the store's ranking function
//! and is capped at `1.0`; its scale is engine-specific, so the weights
//! are tuning knobs rather than fixed constants.
//!
//! The store is expected to have applied the TTL cutoff already. The
//! scorer checks it again so that a misbehaving store can never leak
//! expired chunks into results.

use std::cmp::Ordering;

use serde::Serialize;

use crate::models::Candidate;
use crate::recency::{decay, within_ttl, RecencyConfig};

/// A candidate with its fused score and the components that produced it.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub breakdown: ScoreBreakdown,
}

impl ScoredCandidate {
    pub fn fused_score(&self) -> f64 {
        self.breakdown.fused
    }
}

/// Per-component scores, all post-clamping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub dense: f64,
    pub lexical: f64,
    pub decay: f64,
    pub fused: f64,
}

/// Clamp to `[0, 1]`; NaN becomes `0`.
pub fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// Compute the fused score breakdown for one candidate.
pub fn fuse(candidate: &Candidate, config: &RecencyConfig) -> ScoreBreakdown {
    let dense = clamp01(candidate.dense);
    let lexical = clamp01(candidate.lexical);
    let decay = decay(candidate.age_days, config.half_life_days);
    let fused = config.alpha * dense + config.gamma * lexical + config.beta * decay;
    ScoreBreakdown {
        dense,
        lexical,
        decay,
        fused,
    }
}

/// Score, threshold, and sort candidates.
///
/// Drops candidates past the TTL and those with `fused < min_score`.
/// Output is sorted by fused score (desc), then dense (desc), then id.
pub fn score(
    candidates: Vec<Candidate>,
    config: &RecencyConfig,
    min_score: f64,
) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .filter(|c| within_ttl(c.age_days, config.ttl_days))
        .map(|c| {
            let breakdown = fuse(&c, config);
            ScoredCandidate {
                candidate: c,
                breakdown,
            }
        })
        .filter(|s| s.breakdown.fused >= min_score)
        .collect();

    scored.sort_by(compare_fused);
    scored
}

/// Descending fused score with deterministic tie-breaks.
pub fn compare_fused(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.breakdown
        .fused
        .partial_cmp(&a.breakdown.fused)
        .unwrap_or(Ordering::Equal)
        .then(
            b.breakdown
                .dense
                .partial_cmp(&a.breakdown.dense)
                .unwrap_or(Ordering::Equal),
        )
        .then(a.candidate.id.cmp(&b.candidate.id))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{ChunkKey, Metadata, Slot};
    use chrono::Utc;

    pub(crate) fn make_candidate(id: &str, dense: f64, lexical: f64, age_days: f64) -> Candidate {
        Candidate {
            id: id.to_string(),
            key: ChunkKey {
                namespace: "n".into(),
                slot: Slot::Staging,
                source_id: "s".into(),
                chunk_no: 0,
            },
            content: format!("content {id}"),
            embedding: vec![1.0, 0.0],
            published_at: None,
            created_at: Utc::now(),
            metadata: Metadata::new(),
            dense,
            lexical,
            age_days,
        }
    }

    fn weights(alpha: f64, beta: f64, gamma: f64) -> RecencyConfig {
        RecencyConfig {
            half_life_days: 10.0,
            ttl_days: None,
            alpha,
            beta,
            gamma,
        }
    }

    #[test]
    fn test_fuse_formula() {
        let c = make_candidate("a", 0.8, 0.5, 10.0);
        let b = fuse(&c, &weights(0.6, 0.1, 0.3));
        assert!((b.decay - 0.5).abs() < 1e-12);
        assert!((b.fused - (0.6 * 0.8 + 0.3 * 0.5 + 0.1 * 0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_lexical_and_dense_clamped() {
        let c = make_candidate("a", -0.4, 17.5, 0.0);
        let b = fuse(&c, &weights(1.0, 0.0, 1.0));
        assert_eq!(b.dense, 0.0);
        assert_eq!(b.lexical, 1.0);
        assert_eq!(b.fused, 1.0);

        let nan = make_candidate("b", f64::NAN, f64::NAN, 0.0);
        let b = fuse(&nan, &weights(1.0, 0.0, 1.0));
        assert_eq!(b.fused, 0.0);
    }

    #[test]
    fn test_score_sorts_descending() {
        let cands = vec![
            make_candidate("low", 0.1, 0.0, 0.0),
            make_candidate("high", 0.9, 0.0, 0.0),
            make_candidate("mid", 0.5, 0.0, 0.0),
        ];
        let out = score(cands, &weights(1.0, 0.0, 0.0), 0.0);
        let ids: Vec<&str> = out.iter().map(|s| s.candidate.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_min_score_threshold() {
        let cands = vec![
            make_candidate("a", 0.9, 0.0, 0.0),
            make_candidate("b", 0.2, 0.0, 0.0),
        ];
        let out = score(cands, &weights(1.0, 0.0, 0.0), 0.5);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].candidate.id, "a");

        let none = score(
            vec![make_candidate("c", 0.1, 0.0, 0.0)],
            &weights(1.0, 0.0, 0.0),
            0.5,
        );
        assert!(none.is_empty());
    }

    #[test]
    fn test_ttl_is_hard_cutoff() {
        let mut cfg = weights(1.0, 0.0, 0.0);
        cfg.ttl_days = Some(30.0);
        let cands = vec![
            make_candidate("old-perfect", 1.0, 1.0, 31.0),
            make_candidate("fresh-weak", 0.1, 0.0, 1.0),
        ];
        let out = score(cands, &cfg, 0.0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].candidate.id, "fresh-weak");
    }

    #[test]
    fn test_recency_breaks_similarity_tie() {
        let cands = vec![
            make_candidate("old", 0.7, 0.0, 60.0),
            make_candidate("new", 0.7, 0.0, 1.0),
        ];
        let out = score(cands, &weights(0.8, 0.2, 0.0), 0.0);
        assert_eq!(out[0].candidate.id, "new");
    }

    #[test]
    fn test_ties_ordered_by_id() {
        let cands = vec![
            make_candidate("b", 0.5, 0.0, 0.0),
            make_candidate("a", 0.5, 0.0, 0.0),
        ];
        let out = score(cands, &weights(1.0, 0.0, 0.0), 0.0);
        assert_eq!(out[0].candidate.id, "a");
    }
}
