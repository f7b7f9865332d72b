//! Group definitions.
//!
//! A definition names a business group and declares exactly one way of
//! recognising its members. The detection rule is a tagged union, so each
//! mode carries only the fields it needs and a definition cannot declare a
//! mode without them.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Line of business of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessType {
    /// Bulk trade to other businesses.
    Wholesale,
    /// Distribution networks.
    Distributor,
    /// Stores and shops.
    Retail,
    /// Industry and factories.
    Manufacturer,
    /// Carriers and transport.
    Logistics,
    /// Pharmacies and drugstores.
    Pharmacy,
    /// Anything else.
    #[default]
    General,
}

impl fmt::Display for BusinessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Wholesale => "wholesale",
            Self::Distributor => "distributor",
            Self::Retail => "retail",
            Self::Manufacturer => "manufacturer",
            Self::Logistics => "logistics",
            Self::Pharmacy => "pharmacy",
            Self::General => "general",
        };
        f.write_str(s)
    }
}

/// How members of a group are recognised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DetectionRule {
    /// Every member shares one of the declared identifier roots.
    UniformIdentifier {
        /// Declared roots, any punctuation.
        roots: Vec<String>,
    },

    /// Members share a declared root AND their display name matches the
    /// pattern. Guards against unrelated businesses sharing a root prefix.
    IdentifiersWithNamePattern {
        /// Declared roots, any punctuation.
        roots: Vec<String>,
        /// Case-insensitive regex the display name must match.
        name_pattern: String,
    },

    /// Members carry the group name in their display name; identifiers are
    /// ignored (same brand registered independently per location).
    UniformName,

    /// Free text mentioning one of the group keywords refers to the group.
    Keyword,
}

impl DetectionRule {
    /// The mode tag of this rule.
    #[must_use]
    pub const fn mode(&self) -> DetectionMode {
        match self {
            Self::UniformIdentifier { .. } => DetectionMode::UniformIdentifier,
            Self::IdentifiersWithNamePattern { .. } => DetectionMode::IdentifiersWithNamePattern,
            Self::UniformName => DetectionMode::UniformName,
            Self::Keyword => DetectionMode::Keyword,
        }
    }
}

/// Detection mode tag without the rule's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// See [`DetectionRule::UniformIdentifier`].
    UniformIdentifier,
    /// See [`DetectionRule::IdentifiersWithNamePattern`].
    IdentifiersWithNamePattern,
    /// See [`DetectionRule::UniformName`].
    UniformName,
    /// See [`DetectionRule::Keyword`].
    Keyword,
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UniformIdentifier => "uniform_identifier",
            Self::IdentifiersWithNamePattern => "identifiers_with_name_pattern",
            Self::UniformName => "uniform_name",
            Self::Keyword => "keyword",
        };
        f.write_str(s)
    }
}

/// Known statistics of a group.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupStats {
    /// Records in the group.
    pub member_count: usize,
    /// Distinct locations among the members.
    #[serde(default)]
    pub location_count: usize,
    /// Earliest member date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<NaiveDate>,
    /// Latest member date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<NaiveDate>,
}

/// A registry entry.
///
/// # Examples
///
/// ```
/// use groupscope::{BusinessType, GroupDefinition};
///
/// let def = GroupDefinition::uniform_identifier("Acme", ["12345678"])
///     .with_keywords(["acme"])
///     .with_business_type(BusinessType::Wholesale);
/// assert_eq!(def.detection.mode().to_string(), "uniform_identifier");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDefinition {
    /// Canonical group name.
    pub name: String,
    /// How members are recognised.
    pub detection: DetectionRule,
    /// Lowercase words that identify the group in free text.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Line of business.
    #[serde(default)]
    pub business_type: BusinessType,
    /// Known statistics, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<GroupStats>,
}

impl GroupDefinition {
    /// Creates a definition with the given rule.
    #[must_use]
    pub fn new(name: impl Into<String>, detection: DetectionRule) -> Self {
        Self {
            name: name.into(),
            detection,
            keywords: Vec::new(),
            business_type: BusinessType::General,
            stats: None,
        }
    }

    /// Group recognised by identifier root alone.
    #[must_use]
    pub fn uniform_identifier<I, S>(name: impl Into<String>, roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            DetectionRule::UniformIdentifier {
                roots: roots.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// Group recognised by identifier root plus a name pattern.
    #[must_use]
    pub fn identifiers_with_name_pattern<I, S>(
        name: impl Into<String>,
        roots: I,
        name_pattern: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            DetectionRule::IdentifiersWithNamePattern {
                roots: roots.into_iter().map(Into::into).collect(),
                name_pattern: name_pattern.into(),
            },
        )
    }

    /// Group recognised by its name appearing in member names.
    #[must_use]
    pub fn uniform_name(name: impl Into<String>) -> Self {
        Self::new(name, DetectionRule::UniformName)
    }

    /// Group recognised in free text by keywords.
    #[must_use]
    pub fn keyword<I, S>(name: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, DetectionRule::Keyword).with_keywords(keywords)
    }

    /// Replaces the keywords.
    #[must_use]
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the business type.
    #[must_use]
    pub const fn with_business_type(mut self, business_type: BusinessType) -> Self {
        self.business_type = business_type;
        self
    }

    /// Attaches statistics.
    #[must_use]
    pub fn with_stats(mut self, stats: GroupStats) -> Self {
        self.stats = Some(stats);
        self
    }
}
