//! Registry construction and classification.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ValidationError;
use crate::identifier::{IdentifierCanonicalizer, IdentifierRoot};
use crate::record::EntityRecord;
use crate::registry::definition::{DetectionMode, DetectionRule, GroupDefinition};

/// What made a classification match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MatchEvidence {
    /// The record's identifier root is one of the entry's roots.
    Root(IdentifierRoot),
    /// The record's display name contains the group name.
    Name(String),
    /// The text contains one of the entry's keywords.
    Keyword(String),
    /// The text matched a lexical pattern whose token is common in the store.
    LexicalToken {
        /// Token captured by the pattern.
        token: String,
        /// Store names containing the token.
        occurrences: usize,
    },
}

/// Result of classifying one record or text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Matched group.
    pub group: Arc<GroupDefinition>,
    /// Mode of the rule that matched.
    pub mode: DetectionMode,
    /// What matched.
    pub evidence: MatchEvidence,
    /// True when the group is not in the registry but was inferred on the fly.
    #[serde(default)]
    pub provisional: bool,
}

/// An entry left out of a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    /// Position in the declared list.
    pub position: usize,
    /// Entry name, when it could be read.
    pub name: Option<String>,
    /// Why the entry was skipped.
    pub reason: String,
}

/// Summary of a registry build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryLoadReport {
    /// Entries compiled into the registry.
    pub accepted: usize,
    /// Entries left out, by position.
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Debug)]
enum EntryMatcher {
    Roots(HashSet<IdentifierRoot>),
    RootsAndPattern(HashSet<IdentifierRoot>, Regex),
    Name(String),
    Keywords(Vec<String>),
}

#[derive(Debug)]
struct CompiledEntry {
    definition: Arc<GroupDefinition>,
    matcher: EntryMatcher,
}

/// Ordered, immutable registry of group definitions.
///
/// # Examples
///
/// ```
/// use groupscope::{GroupDefinition, GroupRegistry, IdentifierCanonicalizer};
///
/// let (registry, report) = GroupRegistry::new(
///     vec![
///         GroupDefinition::uniform_identifier("Acme", ["12345678"]),
///         GroupDefinition::identifiers_with_name_pattern("Broken", ["1"], "x"),
///     ],
///     IdentifierCanonicalizer::default(),
/// );
/// assert_eq!(report.accepted, 1);
/// assert_eq!(report.skipped.len(), 1);
///
/// let hit = registry.classify_entity(Some("12.345.678/0009-01"), Some("Whatever")).unwrap();
/// assert_eq!(hit.group.name, "Acme");
/// ```
#[derive(Debug, Default)]
pub struct GroupRegistry {
    entries: Vec<CompiledEntry>,
    identifiers: IdentifierCanonicalizer,
    known_roots: HashSet<IdentifierRoot>,
    keywords: HashSet<String>,
}

impl GroupRegistry {
    /// Builds a registry, skipping entries that cannot be evaluated.
    pub fn new(
        definitions: Vec<GroupDefinition>,
        identifiers: IdentifierCanonicalizer,
    ) -> (Self, RegistryLoadReport) {
        let mut registry = Self {
            entries: Vec::with_capacity(definitions.len()),
            identifiers,
            known_roots: HashSet::new(),
            keywords: HashSet::new(),
        };
        let mut report = RegistryLoadReport::default();

        for (position, definition) in definitions.into_iter().enumerate() {
            let name = definition.name.clone();
            match registry.compile(definition) {
                Ok(entry) => registry.accept(entry),
                Err(e) => {
                    warn!(position, name = %name, error = %e, "skipping malformed registry entry");
                    report.skipped.push(SkippedEntry {
                        position,
                        name: Some(name),
                        reason: e.to_string(),
                    });
                }
            }
        }
        report.accepted = registry.entries.len();
        info!(
            accepted = report.accepted,
            skipped = report.skipped.len(),
            "group registry built"
        );
        (registry, report)
    }

    /// Empty registry.
    #[must_use]
    pub fn empty(identifiers: IdentifierCanonicalizer) -> Self {
        Self {
            identifiers,
            ..Self::default()
        }
    }

    /// Builds a registry from a JSON array of definitions.
    ///
    /// Each element is read on its own; an element that does not describe a
    /// valid definition is skipped and reported.
    ///
    /// # Errors
    /// - `InvalidRegistryDocument`: the document is not a JSON array
    pub fn from_json_str(
        json: &str,
        identifiers: IdentifierCanonicalizer,
    ) -> Result<(Self, RegistryLoadReport), ValidationError> {
        let elements: Vec<serde_json::Value> =
            serde_json::from_str(json).map_err(|e| ValidationError::InvalidRegistryDocument {
                reason: e.to_string(),
            })?;

        let mut definitions = Vec::with_capacity(elements.len());
        let mut unreadable = Vec::new();
        for (position, element) in elements.into_iter().enumerate() {
            let name = element
                .get("name")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string);
            match serde_json::from_value::<GroupDefinition>(element) {
                Ok(def) => definitions.push((position, def)),
                Err(e) => {
                    warn!(position, name = ?name, error = %e, "skipping unreadable registry entry");
                    unreadable.push(SkippedEntry {
                        position,
                        name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let positions: Vec<usize> = definitions.iter().map(|(p, _)| *p).collect();
        let (registry, mut report) = Self::new(
            definitions.into_iter().map(|(_, d)| d).collect(),
            identifiers,
        );
        // Map positions back to the document.
        for skipped in &mut report.skipped {
            skipped.position = positions[skipped.position];
        }
        report.skipped.extend(unreadable);
        report.skipped.sort_by_key(|s| s.position);
        Ok((registry, report))
    }

    /// Builds a registry from a JSON file.
    ///
    /// # Errors
    /// - `InvalidRegistryDocument`: the file cannot be read or is not a JSON array
    pub fn from_json_file(
        path: impl AsRef<Path>,
        identifiers: IdentifierCanonicalizer,
    ) -> Result<(Self, RegistryLoadReport), ValidationError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::InvalidRegistryDocument {
                reason: format!("{}: {e}", path.display()),
            }
        })?;
        Self::from_json_str(&json, identifiers)
    }

    /// Number of accepted entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entry was accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Accepted definitions in declaration order.
    pub fn definitions(&self) -> impl Iterator<Item = &Arc<GroupDefinition>> {
        self.entries.iter().map(|e| &e.definition)
    }

    /// True if any entry declares `root`.
    #[must_use]
    pub fn is_known_root(&self, root: &IdentifierRoot) -> bool {
        self.known_roots.contains(root)
    }

    /// True if any entry declares `keyword` (case-insensitive).
    #[must_use]
    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.keywords.contains(&keyword.to_lowercase())
    }

    /// Classifies a structured record by identifier and name.
    ///
    /// Evaluates the identifier and name modes in declaration order; the
    /// first entry that matches wins. Keyword entries are not consulted.
    #[must_use]
    pub fn classify_entity(
        &self,
        identifier_raw: Option<&str>,
        display_name: Option<&str>,
    ) -> Option<ClassificationResult> {
        let root = self.identifiers.root(identifier_raw);
        let lowered = display_name.map(str::to_lowercase);

        self.entries.iter().find_map(|entry| {
            let evidence = match &entry.matcher {
                EntryMatcher::Roots(roots) => {
                    root.as_ref().filter(|r| roots.contains(*r)).cloned().map(MatchEvidence::Root)
                }
                EntryMatcher::RootsAndPattern(roots, pattern) => root
                    .as_ref()
                    .filter(|r| roots.contains(*r))
                    .filter(|_| display_name.is_some_and(|n| pattern.is_match(n)))
                    .cloned()
                    .map(MatchEvidence::Root),
                EntryMatcher::Name(name) => lowered
                    .as_deref()
                    .filter(|n| n.contains(name.as_str()))
                    .map(|_| MatchEvidence::Name(entry.definition.name.clone())),
                EntryMatcher::Keywords(_) => None,
            }?;
            Some(ClassificationResult {
                group: Arc::clone(&entry.definition),
                mode: entry.definition.detection.mode(),
                evidence,
                provisional: false,
            })
        })
    }

    /// Classifies a record.
    #[must_use]
    pub fn classify_record(&self, record: &EntityRecord) -> Option<ClassificationResult> {
        self.classify_entity(record.identifier_raw(), record.display_name())
    }

    /// Classifies free text by keyword entries only.
    #[must_use]
    pub fn classify_text(&self, text: &str) -> Option<ClassificationResult> {
        let lowered = text.to_lowercase();
        if lowered.trim().is_empty() {
            return None;
        }
        self.entries.iter().find_map(|entry| {
            let EntryMatcher::Keywords(keywords) = &entry.matcher else {
                return None;
            };
            let keyword = keywords.iter().find(|k| lowered.contains(k.as_str()))?;
            Some(ClassificationResult {
                group: Arc::clone(&entry.definition),
                mode: DetectionMode::Keyword,
                evidence: MatchEvidence::Keyword(keyword.clone()),
                provisional: false,
            })
        })
    }

    fn accept(&mut self, entry: CompiledEntry) {
        match &entry.matcher {
            EntryMatcher::Roots(roots) | EntryMatcher::RootsAndPattern(roots, _) => {
                self.known_roots.extend(roots.iter().cloned());
            }
            EntryMatcher::Name(_) | EntryMatcher::Keywords(_) => {}
        }
        self.keywords.extend(
            entry
                .definition
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty()),
        );
        self.entries.push(entry);
    }

    fn compile(&self, definition: GroupDefinition) -> Result<CompiledEntry, ValidationError> {
        let fail = |reason: String| ValidationError::entry(definition.name.as_str(), reason);

        if definition.name.trim().is_empty() {
            return Err(fail("group name is empty".to_string()));
        }

        let matcher = match &definition.detection {
            DetectionRule::UniformIdentifier { roots } => {
                EntryMatcher::Roots(self.compile_roots(roots).map_err(fail)?)
            }
            DetectionRule::IdentifiersWithNamePattern {
                roots,
                name_pattern,
            } => {
                let roots = self.compile_roots(roots).map_err(fail)?;
                if name_pattern.trim().is_empty() {
                    return Err(fail("name pattern is empty".to_string()));
                }
                let pattern = Regex::new(name_pattern)
                    .map_err(|e| fail(format!("name pattern does not compile: {e}")))?;
                EntryMatcher::RootsAndPattern(roots, pattern)
            }
            DetectionRule::UniformName => {
                EntryMatcher::Name(definition.name.trim().to_lowercase())
            }
            DetectionRule::Keyword => {
                let keywords: Vec<String> = definition
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect();
                if keywords.is_empty() {
                    return Err(fail("keyword mode declares no keywords".to_string()));
                }
                EntryMatcher::Keywords(keywords)
            }
        };

        Ok(CompiledEntry {
            definition: Arc::new(definition),
            matcher,
        })
    }

    fn compile_roots(&self, declared: &[String]) -> Result<HashSet<IdentifierRoot>, String> {
        if declared.is_empty() {
            return Err("no identifier roots declared".to_string());
        }
        declared
            .iter()
            .map(|raw| {
                self.identifiers.root(Some(raw.as_str())).ok_or_else(|| {
                    format!(
                        "root '{raw}' has fewer than {} digits",
                        self.identifiers.root_length()
                    )
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::registry::definition::BusinessType;

    fn registry(defs: Vec<GroupDefinition>) -> GroupRegistry {
        GroupRegistry::new(defs, IdentifierCanonicalizer::default()).0
    }

    #[test]
    fn uniform_identifier_matches_any_branch() {
        let reg = registry(vec![GroupDefinition::uniform_identifier("Acme", ["12.345.678"])]);
        let hit = reg.classify_entity(Some("12345678000271"), Some("Unrelated Name")).unwrap();
        assert_eq!(hit.group.name, "Acme");
        assert_eq!(hit.mode, DetectionMode::UniformIdentifier);
        assert_eq!(hit.evidence, MatchEvidence::Root(crate::identifier::canonical_root("12345678").unwrap()));
        assert!(reg.classify_entity(Some("87654321000100"), Some("Acme")).is_none());
    }

    #[test]
    fn pattern_mode_rejects_root_match_with_wrong_name() {
        let reg = registry(vec![
            GroupDefinition::identifiers_with_name_pattern("Omega", ["11111111", "22222222"], "(?i)omega"),
            GroupDefinition::uniform_name("Sigma"),
        ]);
        assert!(reg.classify_entity(Some("11111111000100"), Some("Corner Bakery")).is_none());

        // Evaluation continues past the rejected entry.
        let hit = reg.classify_entity(Some("11111111000100"), Some("Sigma Market")).unwrap();
        assert_eq!(hit.group.name, "Sigma");

        let hit = reg.classify_entity(Some("22222222000100"), Some("OMEGA Pharma 4")).unwrap();
        assert_eq!(hit.group.name, "Omega");
        assert_eq!(hit.mode, DetectionMode::IdentifiersWithNamePattern);
    }

    #[test]
    fn pattern_mode_rejects_absent_name() {
        let reg = registry(vec![GroupDefinition::identifiers_with_name_pattern("Omega", ["11111111"], ".*")]);
        assert!(reg.classify_entity(Some("11111111"), None).is_none());
    }

    #[test]
    fn uniform_name_ignores_identifier() {
        let reg = registry(vec![GroupDefinition::uniform_name("Delta Burger")]);
        let hit = reg.classify_entity(None, Some("DELTA BURGER - Downtown")).unwrap();
        assert_eq!(hit.mode, DetectionMode::UniformName);
        assert!(reg.classify_entity(Some("12345678"), Some("Delta Pizza")).is_none());
    }

    #[test]
    fn first_declared_entry_wins() {
        let reg = registry(vec![
            GroupDefinition::uniform_name("Acme"),
            GroupDefinition::uniform_identifier("Acme By Root", ["12345678"]),
        ]);
        let hit = reg.classify_entity(Some("12345678"), Some("Acme Store")).unwrap();
        assert_eq!(hit.group.name, "Acme");

        let reg = registry(vec![
            GroupDefinition::uniform_identifier("Acme By Root", ["12345678"]),
            GroupDefinition::uniform_name("Acme"),
        ]);
        let hit = reg.classify_entity(Some("12345678"), Some("Acme Store")).unwrap();
        assert_eq!(hit.group.name, "Acme By Root");
    }

    #[test]
    fn keyword_entries_only_classify_text() {
        let reg = registry(vec![GroupDefinition::keyword("Rio Network", ["rio net", "rionet"])]);
        assert!(reg.classify_entity(None, Some("rio net store")).is_none());

        let hit = reg.classify_text("How did RIONET do last month?").unwrap();
        assert_eq!(hit.group.name, "Rio Network");
        assert_eq!(hit.evidence, MatchEvidence::Keyword("rionet".to_string()));
        assert!(reg.classify_text("nothing here").is_none());
        assert!(reg.classify_text("  ").is_none());
    }

    #[test]
    fn malformed_entries_are_skipped_not_fatal() {
        let (reg, report) = GroupRegistry::new(
            vec![
                GroupDefinition::uniform_identifier("No Roots", Vec::<String>::new()),
                GroupDefinition::uniform_identifier("Short Root", ["1234"]),
                GroupDefinition::identifiers_with_name_pattern("Bad Regex", ["12345678"], "(unclosed"),
                GroupDefinition::identifiers_with_name_pattern("Empty Pattern", ["12345678"], " "),
                GroupDefinition::keyword("No Keywords", Vec::<String>::new()),
                GroupDefinition::uniform_name("  "),
                GroupDefinition::uniform_identifier("Good", ["99999999"]),
            ],
            IdentifierCanonicalizer::default(),
        );
        assert_eq!(report.accepted, 1);
        assert_eq!(report.skipped.len(), 6);
        assert_eq!(report.skipped[2].name.as_deref(), Some("Bad Regex"));
        assert_eq!(reg.len(), 1);
        assert!(reg.classify_entity(Some("99999999"), None).is_some());
    }

    #[test]
    fn known_roots_and_keywords_are_indexed() {
        let reg = registry(vec![
            GroupDefinition::uniform_identifier("Acme", ["12345678"]).with_keywords(["Acme"]),
            GroupDefinition::keyword("Rio", ["rionet"]),
        ]);
        assert!(reg.is_known_root(&crate::identifier::canonical_root("12345678").unwrap()));
        assert!(reg.has_keyword("ACME"));
        assert!(reg.has_keyword("rionet"));
        assert!(!reg.has_keyword("zeta"));
    }

    #[test]
    fn json_document_skips_unreadable_elements() {
        let json = r#"[
            {"name": "Acme", "detection": {"mode": "uniform_identifier", "roots": ["12345678"]}, "business_type": "wholesale"},
            {"name": "Broken", "detection": {"mode": "identifiers_with_name_pattern", "roots": ["11111111"]}},
            {"name": "Short", "detection": {"mode": "uniform_identifier", "roots": ["1"]}},
            {"name": "Rio", "detection": {"mode": "keyword"}, "keywords": ["rionet"]}
        ]"#;
        let (reg, report) = GroupRegistry::from_json_str(json, IdentifierCanonicalizer::default()).unwrap();
        assert_eq!(reg.len(), 2);
        assert_eq!(report.accepted, 2);
        let positions: Vec<usize> = report.skipped.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![1, 2]);
        assert_eq!(report.skipped[0].name.as_deref(), Some("Broken"));
        let names: Vec<&str> = reg.definitions().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Acme", "Rio"]);
        assert_eq!(reg.definitions().next().unwrap().business_type, BusinessType::Wholesale);
    }

    #[test]
    fn json_document_must_be_an_array() {
        let err = GroupRegistry::from_json_str(r#"{"name": "x"}"#, IdentifierCanonicalizer::default())
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidRegistryDocument { .. }));
    }
}
