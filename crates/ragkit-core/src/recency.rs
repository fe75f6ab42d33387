//! Recency model: half-life decay, TTL cutoff, and per-namespace weights.
//!
//! Recency enters retrieval twice:
//!
//! - as a **relevance signal**: `decay(age, half_life) = 0.5^(age / half_life)`,
//!   weighted by `beta` in the fused score;
//! - as a **retention policy**: chunks older than `ttl_days` are excluded
//!   before scoring, no matter how similar they are.
//!
//! Per-namespace settings live in a [`RecencyTable`] that is built once
//! from configuration and passed to retrieval explicitly.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Decay and fusion weights for one namespace.
///
/// The three weights are meant to sum to roughly `1.0` so that fused
/// scores stay comparable across namespaces; this is not enforced.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecencyConfig {
    #[serde(default = "default_half_life_days")]
    pub half_life_days: f64,
    #[serde(default)]
    pub ttl_days: Option<f64>,
    /// Dense similarity weight.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Recency decay weight.
    #[serde(default = "default_beta")]
    pub beta: f64,
    /// Lexical rank weight.
    #[serde(default = "default_gamma")]
    pub gamma: f64,
}

fn default_half_life_days() -> f64 {
    30.0
}
fn default_alpha() -> f64 {
    0.6
}
fn default_beta() -> f64 {
    0.1
}
fn default_gamma() -> f64 {
    0.3
}

impl Default for RecencyConfig {
    fn default() -> Self {
        Self {
            half_life_days: default_half_life_days(),
            ttl_days: None,
            alpha: default_alpha(),
            beta: default_beta(),
            gamma: default_gamma(),
        }
    }
}

impl RecencyConfig {
    pub fn weight_sum(&self) -> f64 {
        self.alpha + self.beta + self.gamma
    }
}

/// Per-namespace recency settings with a global fallback.
///
/// Lookup walks up the namespace path: `team/topic/sub` tries
/// `team/topic/sub`, then `team/topic`, then `team`, then the default.
#[derive(Debug, Clone, Default)]
pub struct RecencyTable {
    default: RecencyConfig,
    namespaces: HashMap<String, RecencyConfig>,
}

impl RecencyTable {
    pub fn new(default: RecencyConfig) -> Self {
        Self {
            default,
            namespaces: HashMap::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: &str, config: RecencyConfig) -> Self {
        self.insert(namespace, config);
        self
    }

    pub fn insert(&mut self, namespace: &str, config: RecencyConfig) {
        let ns = namespace.trim_matches('/');
        if !(0.5..=1.5).contains(&config.weight_sum()) {
            warn!(
                namespace = ns,
                sum = config.weight_sum(),
                "recency weights do not sum near 1.0"
            );
        }
        self.namespaces.insert(ns.to_string(), config);
    }

    pub fn default_config(&self) -> &RecencyConfig {
        &self.default
    }

    pub fn resolve(&self, namespace: &str) -> &RecencyConfig {
        let mut ns = namespace.trim_matches('/');
        loop {
            if let Some(cfg) = self.namespaces.get(ns) {
                return cfg;
            }
            match ns.rfind('/') {
                Some(pos) => ns = &ns[..pos],
                None => return &self.default,
            }
        }
    }
}

/// Half-life decay weight in `(0, 1]`.
///
/// `age_days <= 0` yields exactly `1.0`; `half_life_days <= 0` is treated
/// as `1.0`.
pub fn decay(age_days: f64, half_life_days: f64) -> f64 {
    if age_days <= 0.0 || age_days.is_nan() {
        return 1.0;
    }
    let half_life = if half_life_days > 0.0 {
        half_life_days
    } else {
        1.0
    };
    0.5f64.powf(age_days / half_life)
}

/// Whether a chunk of `age_days` survives the TTL cutoff.
pub fn within_ttl(age_days: f64, ttl_days: Option<f64>) -> bool {
    match ttl_days {
        Some(ttl) => age_days <= ttl,
        None => true,
    }
}

/// Age in fractional days, from `published_at` when known, else `created_at`.
pub fn age_days(
    published_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f64 {
    let reference = published_at.unwrap_or(created_at);
    (now - reference).num_seconds() as f64 / SECONDS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_decay_zero_age_is_one() {
        for h in [0.5, 1.0, 7.0, 365.0, 0.0, -3.0] {
            assert_eq!(decay(0.0, h), 1.0);
            assert_eq!(decay(-2.0, h), 1.0);
        }
    }

    #[test]
    fn test_decay_half_life() {
        for h in [1.0, 14.0, 90.0] {
            assert!((decay(h, h) - 0.5).abs() < 1e-12);
            assert!((decay(2.0 * h, h) - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn test_decay_strictly_decreasing() {
        let mut prev = decay(0.0, 10.0);
        for age in 1..200 {
            let d = decay(age as f64 * 0.5, 10.0);
            assert!(d < prev);
            assert!(d > 0.0);
            prev = d;
        }
    }

    #[test]
    fn test_decay_nonpositive_half_life_is_one() {
        assert_eq!(decay(3.0, 0.0), decay(3.0, 1.0));
        assert_eq!(decay(3.0, -5.0), decay(3.0, 1.0));
    }

    #[test]
    fn test_within_ttl() {
        assert!(within_ttl(1000.0, None));
        assert!(within_ttl(30.0, Some(30.0)));
        assert!(!within_ttl(30.01, Some(30.0)));
    }

    #[test]
    fn test_age_days_prefers_published_at() {
        let now = Utc::now();
        let created = now - Duration::days(1);
        let published = now - Duration::days(10);
        assert!((age_days(Some(published), created, now) - 10.0).abs() < 1e-6);
        assert!((age_days(None, created, now) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_table_resolves_ancestors() {
        let news = RecencyConfig {
            half_life_days: 3.0,
            ttl_days: Some(30.0),
            ..RecencyConfig::default()
        };
        let table = RecencyTable::default().with_namespace("news", news.clone());
        assert_eq!(table.resolve("news"), &news);
        assert_eq!(table.resolve("news/sports/football"), &news);
        assert_eq!(table.resolve("newsletter"), table.default_config());
        assert_eq!(table.resolve("docs"), &RecencyConfig::default());
    }

    #[test]
    fn test_table_most_specific_wins() {
        let outer = RecencyConfig {
            half_life_days: 100.0,
            ..RecencyConfig::default()
        };
        let inner = RecencyConfig {
            half_life_days: 1.0,
            ..RecencyConfig::default()
        };
        let table = RecencyTable::default()
            .with_namespace("a", outer)
            .with_namespace("a/b", inner);
        assert_eq!(table.resolve("a/b/c").half_life_days, 1.0);
        assert_eq!(table.resolve("a/x").half_life_days, 100.0);
    }
}
