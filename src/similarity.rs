//! Bounded name similarity.
//!
//! Scores are Jaro-Winkler over canonical names, plus a fixed boost when
//! both names start with the same token. The first token tends to carry the
//! organization's identity and survives abbreviation and branch noise.

use std::sync::Arc;

use crate::cache::{NameCache, NoNameCache};
use crate::config::SimilarityConfig;
use crate::normalize::NameNormalizer;

/// Scores two raw organization names in `[0, 1]`.
///
/// # Examples
///
/// ```
/// use groupscope::SimilarityScorer;
///
/// let scorer = SimilarityScorer::default();
/// assert_eq!(scorer.score("ACME LTDA", "Acme Logistics"), 1.0);
/// assert_eq!(scorer.score("", "Acme"), 0.0);
/// assert!(scorer.score("Acme Foods", "Acme Tools") > scorer.score("Acme Foods", "Zeta Tools"));
/// ```
#[derive(Clone)]
pub struct SimilarityScorer {
    normalizer: Arc<NameNormalizer>,
    first_token_boost: f64,
    cache: Arc<dyn NameCache>,
}

impl SimilarityScorer {
    /// Creates a scorer over the given normalizer.
    #[must_use]
    pub fn new(normalizer: Arc<NameNormalizer>, config: &SimilarityConfig) -> Self {
        Self {
            normalizer,
            first_token_boost: config.first_token_boost,
            cache: Arc::new(NoNameCache),
        }
    }

    /// Routes normalization through `cache`.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn NameCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Returns the normalizer backing this scorer.
    #[must_use]
    pub fn normalizer(&self) -> &NameNormalizer {
        &self.normalizer
    }

    /// Canonical form of `raw`, served from the cache when possible.
    #[must_use]
    pub fn normalized(&self, raw: &str) -> String {
        if let Some(hit) = self.cache.get(raw) {
            return hit;
        }
        let normalized = self.normalizer.normalize(raw);
        self.cache.insert(raw.to_string(), normalized.clone());
        normalized
    }

    /// Similarity of two raw names.
    #[must_use]
    pub fn score(&self, a: &str, b: &str) -> f64 {
        let a = self.normalized(a);
        let b = self.normalized(b);
        self.score_normalized(&a, &b)
    }

    /// Similarity of two names that are already canonical.
    #[must_use]
    pub fn score_normalized(&self, a: &str, b: &str) -> f64 {
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let base = strsim::jaro_winkler(a, b);
        let boost = match (a.split_whitespace().next(), b.split_whitespace().next()) {
            (Some(x), Some(y)) if x == y => self.first_token_boost,
            _ => 0.0,
        };
        (base + boost).clamp(0.0, 1.0)
    }
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::new(
            Arc::new(NameNormalizer::default()),
            &SimilarityConfig::default(),
        )
    }
}

impl std::fmt::Debug for SimilarityScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityScorer")
            .field("first_token_boost", &self.first_token_boost)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::cache::TtlNameCache;

    #[test]
    fn empty_inputs_score_zero() {
        let scorer = SimilarityScorer::default();
        assert_eq!(scorer.score("", "Acme"), 0.0);
        assert_eq!(scorer.score("Acme", ""), 0.0);
        // Normalizes to empty.
        assert_eq!(scorer.score("Logistics Ltda", "Acme"), 0.0);
    }

    #[test]
    fn identical_canonical_names_score_one() {
        let scorer = SimilarityScorer::default();
        assert_eq!(scorer.score("ACME LOGISTICS LTDA", "acme"), 1.0);
    }

    #[test]
    fn shared_first_token_gets_boost() {
        let scorer = SimilarityScorer::default();
        let base = strsim::jaro_winkler("acme foods", "acme tools");
        let boosted = scorer.score("Acme Foods", "Acme Tools");
        assert!((boosted - (base + 0.1).min(1.0)).abs() < 1e-9);
    }

    #[test]
    fn different_first_token_gets_no_boost() {
        let scorer = SimilarityScorer::default();
        let base = strsim::jaro_winkler("acme foods", "acne foods");
        assert!((scorer.score("Acme Foods", "Acne Foods") - base).abs() < 1e-9);
    }

    #[test]
    fn score_is_bounded() {
        let scorer = SimilarityScorer::default();
        for (a, b) in [("a", "a"), ("acme", "zzzz"), ("acme x", "acme y"), ("q", "acme")] {
            let s = scorer.score(a, b);
            assert!((0.0..=1.0).contains(&s), "{a} vs {b} = {s}");
        }
    }

    #[test]
    fn cache_is_populated() {
        let cache = Arc::new(TtlNameCache::new(16, std::time::Duration::from_secs(60)));
        let scorer = SimilarityScorer::default().with_cache(cache.clone());
        let _ = scorer.score("Beta Store 1", "Beta Store 2");
        assert_eq!(cache.get("Beta Store 1"), Some("beta store".to_string()));
    }
}
