//! Identifier canonicalization.
//!
//! Organization identifiers are hierarchical: a company-level root followed
//! by a branch suffix and check digits (e.g. `12.345.678/0001-90`). Two
//! records with the same root belong to the same business regardless of
//! punctuation or branch.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::IdentifierConfig;

/// The company-level, branch-free prefix of an organization identifier.
///
/// Always a fixed-width string of ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentifierRoot(String);

impl IdentifierRoot {
    /// Returns the root digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentifierRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IdentifierRoot {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Extracts identifier roots from raw identifier strings.
///
/// # Examples
///
/// ```
/// use groupscope::IdentifierCanonicalizer;
///
/// let canon = IdentifierCanonicalizer::default();
/// let root = canon.root(Some("12.345.678/0001-90")).unwrap();
/// assert_eq!(root.as_str(), "12345678");
/// assert!(canon.root(Some("123-45")).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifierCanonicalizer {
    root_length: usize,
}

impl IdentifierCanonicalizer {
    /// Creates a canonicalizer keeping `root_length` leading digits.
    #[must_use]
    pub fn new(root_length: usize) -> Self {
        Self {
            root_length: root_length.max(1),
        }
    }

    /// Creates a canonicalizer from configuration.
    #[must_use]
    pub fn from_config(config: &IdentifierConfig) -> Self {
        Self::new(config.root_length)
    }

    /// Returns the configured root width.
    #[must_use]
    pub const fn root_length(&self) -> usize {
        self.root_length
    }

    /// Returns the root of `raw`, or `None` when fewer than `root_length` digits remain.
    #[must_use]
    pub fn root(&self, raw: Option<&str>) -> Option<IdentifierRoot> {
        let raw = raw?;
        let digits: String = raw
            .chars()
            .filter(char::is_ascii_digit)
            .take(self.root_length)
            .collect();
        (digits.len() == self.root_length).then_some(IdentifierRoot(digits))
    }
}

impl Default for IdentifierCanonicalizer {
    fn default() -> Self {
        Self::from_config(&IdentifierConfig::default())
    }
}

/// Root of `raw` under the default root width.
#[must_use]
pub fn canonical_root(raw: &str) -> Option<IdentifierRoot> {
    IdentifierCanonicalizer::default().root(Some(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_and_branch_do_not_affect_root() {
        let a = canonical_root("12.345.678/0001-90").unwrap();
        let b = canonical_root("12345678000271").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "12345678");
    }

    #[test]
    fn short_identifiers_have_no_root() {
        assert!(canonical_root("1234567").is_none());
        assert!(canonical_root("abc").is_none());
        assert!(canonical_root("").is_none());
    }

    #[test]
    fn absent_identifier_has_no_root() {
        assert!(IdentifierCanonicalizer::default().root(None).is_none());
    }

    #[test]
    fn exactly_root_length_digits_is_a_root() {
        assert_eq!(canonical_root("9999-9999").unwrap().as_str(), "99999999");
    }

    #[test]
    fn custom_root_length() {
        let canon = IdentifierCanonicalizer::new(4);
        assert_eq!(canon.root(Some("12-34-56")).unwrap().as_str(), "1234");
        assert!(canon.root(Some("123")).is_none());
    }

    #[test]
    fn zero_root_length_is_clamped() {
        assert_eq!(IdentifierCanonicalizer::new(0).root_length(), 1);
    }

    #[test]
    fn non_ascii_digits_are_ignored() {
        // Arabic-Indic digits are not part of the identifier alphabet.
        assert!(canonical_root("١٢٣٤٥٦٧٨").is_none());
    }
}
