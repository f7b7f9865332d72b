//! Organization name normalization.
//!
//! Produces the canonical form of a free-text organization name: lowercase,
//! without legal-entity suffixes, branch markers, trailing numerals, or
//! generic sector words. Rule order is fixed and the rules are re-applied
//! until the name stops shrinking, so normalizing a canonical name returns
//! it unchanged.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::config::NormalizerConfig;
use crate::error::ValidationError;

/// Canonicalizes organization names.
///
/// # Examples
///
/// ```
/// use groupscope::NameNormalizer;
///
/// let normalizer = NameNormalizer::default();
/// assert_eq!(normalizer.normalize("ACME LOGISTICS LTDA"), "acme");
/// assert_eq!(normalizer.normalize("Acme - Branch North"), "acme");
/// assert_eq!(normalizer.normalize(""), "");
/// ```
#[derive(Debug, Clone)]
pub struct NameNormalizer {
    suffix: Option<Regex>,
    branch: Option<Regex>,
    trailing_number: Regex,
    stop_words: HashSet<String>,
}

impl NameNormalizer {
    /// Builds a normalizer from configuration.
    pub fn new(config: &NormalizerConfig) -> Result<Self, ValidationError> {
        let suffix = if config.legal_suffixes.is_empty() {
            None
        } else {
            let alternation = config.legal_suffixes.join("|");
            let pattern = format!(r"(?i)[\s,.\-]+(?:{alternation})\.?$");
            Some(Regex::new(&pattern).map_err(|e| {
                ValidationError::config("normalizer.legal_suffixes", e.to_string())
            })?)
        };

        let markers: Vec<String> = config
            .branch_markers
            .iter()
            .map(|m| regex::escape(m.trim()))
            .filter(|m| !m.is_empty())
            .collect();
        let branch = if markers.is_empty() {
            None
        } else {
            let pattern = format!(r"(?i)\s*-\s*(?:{})\s+\S+$", markers.join("|"));
            Some(Regex::new(&pattern).map_err(|e| {
                ValidationError::config("normalizer.branch_markers", e.to_string())
            })?)
        };

        let trailing_number = Regex::new(r"\s+\d+$")
            .map_err(|e| ValidationError::config("normalizer", e.to_string()))?;

        Ok(Self {
            suffix,
            branch,
            trailing_number,
            stop_words: config
                .stop_words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .collect(),
        })
    }

    /// Returns the canonical form of `name`.
    #[must_use]
    pub fn normalize(&self, name: &str) -> String {
        let mut current = self.pass(name);
        loop {
            let next = self.pass(&current);
            if next.len() >= current.len() {
                return next;
            }
            current = next;
        }
    }

    /// Canonical form of an optional name; absent names normalize to `""`.
    #[must_use]
    pub fn normalize_opt(&self, name: Option<&str>) -> String {
        name.map(|n| self.normalize(n)).unwrap_or_default()
    }

    /// Returns true if `token` is a configured sector stop word.
    #[must_use]
    pub fn is_stop_word(&self, token: &str) -> bool {
        self.stop_words.contains(token)
    }

    fn pass(&self, name: &str) -> String {
        let mut s = name.to_lowercase().trim().to_string();

        // Suffix, branch, numeral; repeated because removing one can expose another.
        loop {
            let before = s.len();
            if let Some(re) = &self.suffix {
                s = strip_end(re, &s);
            }
            if let Some(re) = &self.branch {
                s = strip_end(re, &s);
            }
            s = strip_end(&self.trailing_number, &s);
            if s.len() == before {
                break;
            }
        }

        s.split_whitespace()
            .filter(|token| !self.stop_words.contains(*token))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn strip_end(re: &Regex, s: &str) -> String {
    re.replace(s, "").trim_end().to_string()
}

impl Default for NameNormalizer {
    fn default() -> Self {
        Self::new(&NormalizerConfig::default()).expect("default normalizer patterns compile")
    }
}

static DEFAULT_NORMALIZER: OnceLock<NameNormalizer> = OnceLock::new();

/// Normalizes `name` with the default rule set.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    DEFAULT_NORMALIZER
        .get_or_init(NameNormalizer::default)
        .normalize(name)
}
