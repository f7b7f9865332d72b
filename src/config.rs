//! Engine configuration.
//!
//! Every component reads its knobs from a plain struct with a `Default`
//! implementation. All structs deserialize with `#[serde(default)]`, so a
//! host application can supply a partial JSON document and inherit the rest.

use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{EngineResult, ValidationError};

/// Identifier canonicalization settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifierConfig {
    /// Number of leading digits forming the company-level root.
    pub root_length: usize,
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        Self { root_length: 8 }
    }
}

/// Name normalization settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Regex fragments for legal-entity suffixes, matched at the end of the name.
    pub legal_suffixes: Vec<String>,
    /// Words introducing a trailing "- <marker> <token>" branch segment.
    pub branch_markers: Vec<String>,
    /// Generic sector words dropped from the token list.
    pub stop_words: Vec<String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        let suffixes = [
            "ltda", "ltd", "llc", "inc", "corp", "corporation", "co", r"s\.?/?a", "me", "epp",
            "eireli", "mei", "gmbh", "plc",
        ];
        let stop_words = [
            "trade",
            "industry",
            "distributor",
            "carrier",
            "logistics",
            "services",
            "commercial",
            "industrial",
        ];
        Self {
            legal_suffixes: suffixes.iter().map(ToString::to_string).collect(),
            branch_markers: vec!["branch".to_string()],
            stop_words: stop_words.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Similarity scoring settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Added to the base score when both names share their first token.
    pub first_token_boost: f64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            first_token_boost: 0.1,
        }
    }
}

/// Reference resolution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Maximum records fetched by the identifier-root tier.
    pub root_fetch_limit: usize,
    /// Maximum distinct names sampled for the fuzzy tier.
    pub fuzzy_sample_cap: usize,
    /// Minimum similarity kept by the fuzzy tier.
    pub fuzzy_threshold: f64,
    /// Maximum fuzzy candidates returned.
    pub fuzzy_top_k: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            root_fetch_limit: 10,
            fuzzy_sample_cap: 1000,
            fuzzy_threshold: 0.7,
            fuzzy_top_k: 5,
        }
    }
}

/// Group discovery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Minimum distinct names a root bucket needs before it is mined.
    pub min_distinct_names: usize,
    /// Minimum share of bucket names that must contain the common token.
    pub min_token_coverage: f64,
    /// Minimum store occurrences for a lexical keyword suggestion.
    pub min_keyword_occurrences: usize,
    /// Maximum suggestions returned from one pass.
    pub max_suggestions: usize,
    /// Maximum example names attached to a suggestion.
    pub max_examples: usize,
    /// Regexes with exactly one capture group, scanned over free text.
    pub lexical_patterns: Vec<String>,
    /// Attribute names read as location fields.
    pub location_attributes: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            min_distinct_names: 3,
            min_token_coverage: 0.7,
            min_keyword_occurrences: 3,
            max_suggestions: 10,
            max_examples: 5,
            lexical_patterns: vec![
                r"(?i)\bgroup\s+(\w+)".to_string(),
                r"(?i)\bnetwork\s+(\w+)".to_string(),
                r"(?i)\b(\w+)\s+wholesaler\b".to_string(),
            ],
            location_attributes: vec!["city".to_string(), "state".to_string()],
        }
    }
}

/// Store worker pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of store workers.
    pub workers: usize,
    /// Maximum queued store jobs.
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 256,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Identifier root extraction.
    pub identifier: IdentifierConfig,
    /// Name canonicalization rules.
    pub normalizer: NormalizerConfig,
    /// Fuzzy scoring.
    pub similarity: SimilarityConfig,
    /// Reference resolution limits and thresholds.
    pub resolver: ResolverConfig,
    /// Group mining thresholds and lexical patterns.
    pub discovery: DiscoveryConfig,
    /// Store worker pool sizing.
    pub pool: PoolConfig,
    /// Applied to resolver and discovery calls made without an explicit timeout.
    #[serde(with = "optional_millis")]
    pub default_timeout: Option<Duration>,
}

impl EngineConfig {
    /// Parses a JSON document and validates it.
    pub fn from_json_str(json: &str) -> EngineResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ValidationError::config("document", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field for values the engine cannot operate with.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.identifier.root_length == 0 {
            return Err(ValidationError::config(
                "identifier.root_length",
                "must be greater than zero",
            ));
        }

        for fragment in &self.normalizer.legal_suffixes {
            Regex::new(fragment).map_err(|e| {
                ValidationError::config("normalizer.legal_suffixes", format!("'{fragment}': {e}"))
            })?;
        }
        if self.normalizer.branch_markers.iter().any(|m| m.trim().is_empty()) {
            return Err(ValidationError::config(
                "normalizer.branch_markers",
                "markers cannot be blank",
            ));
        }

        if !(0.0..=1.0).contains(&self.similarity.first_token_boost) {
            return Err(ValidationError::config(
                "similarity.first_token_boost",
                "must be within [0, 1]",
            ));
        }

        check_unit("resolver.fuzzy_threshold", self.resolver.fuzzy_threshold)?;
        check_nonzero("resolver.root_fetch_limit", self.resolver.root_fetch_limit)?;
        check_nonzero("resolver.fuzzy_sample_cap", self.resolver.fuzzy_sample_cap)?;
        check_nonzero("resolver.fuzzy_top_k", self.resolver.fuzzy_top_k)?;

        check_unit("discovery.min_token_coverage", self.discovery.min_token_coverage)?;
        check_nonzero("discovery.min_distinct_names", self.discovery.min_distinct_names)?;
        check_nonzero("discovery.max_suggestions", self.discovery.max_suggestions)?;
        for pattern in &self.discovery.lexical_patterns {
            let re = Regex::new(pattern).map_err(|e| {
                ValidationError::config("discovery.lexical_patterns", format!("'{pattern}': {e}"))
            })?;
            if re.captures_len() != 2 {
                return Err(ValidationError::config(
                    "discovery.lexical_patterns",
                    format!("'{pattern}' must have exactly one capture group"),
                ));
            }
        }

        check_nonzero("pool.workers", self.pool.workers)?;
        check_nonzero("pool.queue_capacity", self.pool.queue_capacity)?;
        Ok(())
    }
}

fn check_unit(field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::config(field, format!("{value} is outside [0, 1]")))
    }
}

fn check_nonzero(field: &str, value: usize) -> Result<(), ValidationError> {
    if value == 0 {
        Err(ValidationError::config(field, "must be greater than zero"))
    } else {
        Ok(())
    }
}

mod optional_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub(super) fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis().min(u128::from(u64::MAX)) as u64)),
            None => s.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
