//! Group discovery.
//!
//! Mines records the registry could not place and proposes new group
//! definitions. Two independent passes feed one ranked list:
//!
//! - the pattern pass buckets records by identifier root and looks for a
//!   name token shared by most of a bucket's distinct names;
//! - the lexical pass scans free text for mentions such as "group zeta" and
//!   asks the store how many names carry the captured token.
//!
//! Suggestions are advisory. Nothing here writes to the registry; promoting
//! a draft is an explicit registry reload.

mod business;
mod lexical;
mod miner;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identifier::IdentifierRoot;
use crate::registry::{BusinessType, GroupDefinition};

pub use business::infer_business_type;
pub use lexical::{LexicalHit, LexicalScanner};
pub use miner::GroupMiner;

/// What a suggestion was mined from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SuggestionKey {
    /// A shared identifier root.
    Root(IdentifierRoot),
    /// A token captured from free text.
    Token(String),
}

impl fmt::Display for SuggestionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root(root) => write!(f, "root:{root}"),
            Self::Token(token) => write!(f, "token:{token}"),
        }
    }
}

/// A proposed group definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredGroupSuggestion {
    /// What the suggestion was mined from.
    pub key: SuggestionKey,
    /// Bucket size for root suggestions, store occurrences for token ones.
    pub member_count: usize,
    /// A few distinct member names.
    pub example_names: Vec<String>,
    /// Inferred line of business.
    pub business_type: BusinessType,
    /// Token shared by most member names; `None` means no common pattern.
    pub common_token: Option<String>,
    /// Definition an operator can review and promote.
    pub draft: GroupDefinition,
    /// Stable hash of `key`, hex encoded.
    pub fingerprint: String,
}

impl DiscoveredGroupSuggestion {
    pub(crate) fn new(
        key: SuggestionKey,
        member_count: usize,
        example_names: Vec<String>,
        common_token: Option<String>,
        draft: GroupDefinition,
    ) -> Self {
        let fingerprint = blake3::hash(key.to_string().as_bytes()).to_hex().to_string();
        Self {
            key,
            member_count,
            example_names,
            business_type: draft.business_type,
            common_token,
            draft,
            fingerprint,
        }
    }
}

/// Output of one discovery pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    /// Suggestions by member count, descending.
    pub suggestions: Vec<DiscoveredGroupSuggestion>,
    /// Lexical tokens dropped because their store lookup failed.
    pub dropped_candidates: Vec<String>,
    /// Lexical tokens not counted before the deadline.
    pub unfinished_candidates: Vec<String>,
    /// When the pass finished.
    pub generated_at: DateTime<Utc>,
}

impl DiscoveryReport {
    /// True when every lexical candidate was counted or dropped in time.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unfinished_candidates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::identifier::canonical_root;

    #[test]
    fn fingerprint_is_stable_and_key_specific() {
        let draft = GroupDefinition::uniform_name("Beta");
        let root = SuggestionKey::Root(canonical_root("12345678").unwrap());
        let a = DiscoveredGroupSuggestion::new(root.clone(), 5, vec![], None, draft.clone());
        let b = DiscoveredGroupSuggestion::new(root, 9, vec![], None, draft.clone());
        let c = DiscoveredGroupSuggestion::new(SuggestionKey::Token("beta".into()), 5, vec![], None, draft);
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_ne!(a.fingerprint, c.fingerprint);
        assert_eq!(a.fingerprint.len(), 64);
    }

    #[test]
    fn key_display() {
        let key = SuggestionKey::Root(canonical_root("12.345.678/0001-90").unwrap());
        assert_eq!(key.to_string(), "root:12345678");
        assert_eq!(SuggestionKey::Token("zeta".into()).to_string(), "token:zeta");
    }
}
