//! Discovery miner.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::config::DiscoveryConfig;
use crate::discovery::business::infer_business_type;
use crate::discovery::lexical::{LexicalHit, LexicalScanner};
use crate::discovery::{DiscoveredGroupSuggestion, DiscoveryReport, SuggestionKey};
use crate::engine::runtime::{Deadline, Pending, StorePool};
use crate::error::{EngineResult, ExecutionError, ValidationError};
use crate::grouping::group_by_root;
use crate::identifier::IdentifierRoot;
use crate::normalize::NameNormalizer;
use crate::record::EntityRecord;
use crate::registry::{
    ClassificationResult, DetectionMode, GroupDefinition, GroupRegistry, GroupStats, MatchEvidence,
};
use crate::storage::{RecordStore, StorageError};

const MIN_TOKEN_CHARS: usize = 3;

/// Store counts gathered for lexical candidates.
#[derive(Debug, Default)]
struct TokenCounts {
    counted: Vec<(LexicalHit, usize)>,
    dropped: Vec<String>,
    unfinished: Vec<String>,
}

/// Proposes group definitions from unclassified records and free text.
pub struct GroupMiner {
    store: Arc<dyn RecordStore>,
    names: Arc<NameNormalizer>,
    scanner: LexicalScanner,
    config: DiscoveryConfig,
}

impl GroupMiner {
    /// Creates a miner.
    ///
    /// # Errors
    /// - `InvalidConfig`: a lexical pattern does not compile or lacks a single capture
    pub fn new(
        store: Arc<dyn RecordStore>,
        names: Arc<NameNormalizer>,
        config: DiscoveryConfig,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            store,
            names,
            scanner: LexicalScanner::new(&config.lexical_patterns)?,
            config,
        })
    }

    /// Runs both passes and ranks the result.
    ///
    /// Records whose root the registry already declares are ignored. Each
    /// lexical token costs one store call on `pool`; a failed call drops the
    /// token, and tokens still pending at the deadline are reported as
    /// unfinished.
    ///
    /// # Errors
    /// - `Disconnected`: the store pool has shut down
    pub fn discover(
        &self,
        pool: &StorePool,
        records: Vec<EntityRecord>,
        texts: &[String],
        registry: &GroupRegistry,
        deadline: &Deadline,
    ) -> EngineResult<DiscoveryReport> {
        let mut suggestions = self.mine_buckets(records, registry);

        let hits = self.lexical_candidates(texts.iter().map(String::as_str), registry);
        let counts = self.count_tokens(pool, hits, deadline)?;
        suggestions.extend(
            counts
                .counted
                .into_iter()
                .filter(|(hit, count)| self.keeps_occurrences(&hit.token, *count))
                .map(|(hit, count)| keyword_suggestion(&hit, count)),
        );

        // Stable: pattern suggestions precede keyword ones on equal counts.
        suggestions.sort_by(|a, b| b.member_count.cmp(&a.member_count));
        suggestions.truncate(self.config.max_suggestions);

        info!(
            suggestions = suggestions.len(),
            dropped = counts.dropped.len(),
            unfinished = counts.unfinished.len(),
            "group discovery finished"
        );
        Ok(DiscoveryReport {
            suggestions,
            dropped_candidates: counts.dropped,
            unfinished_candidates: counts.unfinished,
            generated_at: Utc::now(),
        })
    }

    /// Pattern pass: one suggestion per unknown root bucket with enough
    /// distinct names. Pure; never touches the store.
    #[must_use]
    pub fn mine_buckets(
        &self,
        records: Vec<EntityRecord>,
        registry: &GroupRegistry,
    ) -> Vec<DiscoveredGroupSuggestion> {
        let buckets = group_by_root(records);
        buckets
            .root_buckets()
            .filter(|(root, _)| {
                let known = registry.is_known_root(root);
                if known {
                    debug!(root = %root, "skipping bucket with registered root");
                }
                !known
            })
            .filter_map(|(root, members)| self.suggest_for_bucket(root, members))
            .collect()
    }

    /// Distinct lexical tokens in `texts` worth a store lookup.
    ///
    /// Skips short tokens, sector stop words, and registry keywords.
    pub fn lexical_candidates<'a, I>(&self, texts: I, registry: &GroupRegistry) -> Vec<LexicalHit>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.scanner
            .scan(texts)
            .into_iter()
            .filter(|hit| {
                hit.token.chars().count() >= MIN_TOKEN_CHARS
                    && !self.names.is_stop_word(&hit.token)
                    && !registry.has_keyword(&hit.token)
            })
            .collect()
    }

    /// Live lexical match for text the registry cannot classify.
    ///
    /// Returns a provisional keyword group for the first captured token the
    /// store confirms; tokens whose lookup fails or times out are skipped.
    ///
    /// # Errors
    /// - `Disconnected`: the store pool has shut down
    pub fn provisional_match(
        &self,
        pool: &StorePool,
        text: &str,
        registry: &GroupRegistry,
        deadline: &Deadline,
    ) -> EngineResult<Option<ClassificationResult>> {
        let hits = self.lexical_candidates([text], registry);
        if hits.is_empty() {
            return Ok(None);
        }
        let counts = self.count_tokens(pool, hits, deadline)?;
        Ok(counts
            .counted
            .into_iter()
            .find(|(hit, count)| self.keeps_occurrences(&hit.token, *count))
            .map(|(hit, occurrences)| {
                let suggestion = keyword_suggestion(&hit, occurrences);
                ClassificationResult {
                    group: Arc::new(suggestion.draft),
                    mode: DetectionMode::Keyword,
                    evidence: MatchEvidence::LexicalToken {
                        token: hit.token,
                        occurrences,
                    },
                    provisional: true,
                }
            }))
    }

    fn keeps_occurrences(&self, token: &str, count: usize) -> bool {
        let keep = count >= self.config.min_keyword_occurrences;
        if !keep {
            debug!(token, count, "lexical token below occurrence minimum");
        }
        keep
    }

    fn suggest_for_bucket(
        &self,
        root: &IdentifierRoot,
        members: &[EntityRecord],
    ) -> Option<DiscoveredGroupSuggestion> {
        // Distinct display names with their cached canonical forms.
        let mut seen = HashSet::new();
        let distinct: Vec<(&str, &str)> = members
            .iter()
            .filter_map(|r| {
                let name = r.display_name()?.trim();
                (!name.is_empty() && seen.insert(name)).then_some((name, r.normalized_name()))
            })
            .collect();

        if distinct.len() < self.config.min_distinct_names {
            debug!(root = %root, distinct = distinct.len(), "bucket below distinct-name minimum");
            return None;
        }

        let common_token = self.common_token(&distinct);
        debug!(root = %root, members = members.len(), token = ?common_token, "bucket mined");

        let raw_names: Vec<&str> = distinct.iter().map(|(raw, _)| *raw).collect();
        let business_type = infer_business_type(raw_names.iter().copied());
        let example_names: Vec<String> = raw_names
            .iter()
            .take(self.config.max_examples)
            .map(|n| (*n).to_string())
            .collect();

        let draft_name = common_token
            .as_deref()
            .map_or_else(|| format!("Group {root}"), title_case);
        let draft = GroupDefinition::uniform_identifier(draft_name, [root.as_str()])
            .with_keywords(common_token.iter().cloned())
            .with_business_type(business_type)
            .with_stats(self.bucket_stats(members));

        Some(DiscoveredGroupSuggestion::new(
            SuggestionKey::Root(root.clone()),
            members.len(),
            example_names,
            common_token,
            draft,
        ))
    }

    /// Most frequent canonical token, counted once per distinct name.
    /// Ties go to the token seen first.
    fn common_token(&self, distinct: &[(&str, &str)]) -> Option<String> {
        let mut order: Vec<&str> = Vec::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for &(_, normalized) in distinct {
            let mut in_name = HashSet::new();
            for token in normalized.split_whitespace() {
                if !in_name.insert(token) {
                    continue;
                }
                let count = counts.entry(token).or_insert(0);
                if *count == 0 {
                    order.push(token);
                }
                *count += 1;
            }
        }

        let mut best: Option<(&str, usize)> = None;
        for token in order {
            let count = counts[token];
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((token, count));
            }
        }

        let (token, count) = best?;
        let coverage = count as f64 / distinct.len() as f64;
        (coverage >= self.config.min_token_coverage).then(|| token.to_string())
    }

    fn bucket_stats(&self, members: &[EntityRecord]) -> GroupStats {
        let mut locations = BTreeSet::new();
        let mut first_seen: Option<NaiveDate> = None;
        let mut last_seen: Option<NaiveDate> = None;

        for record in members {
            let location: Vec<String> = self
                .config
                .location_attributes
                .iter()
                .filter_map(|attr| record.attribute(attr)?.as_text())
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
                .collect();
            if !location.is_empty() {
                locations.insert(location);
            }

            for date in record.attributes().values().filter_map(|v| v.as_date()) {
                first_seen = Some(first_seen.map_or(date, |d| d.min(date)));
                last_seen = Some(last_seen.map_or(date, |d| d.max(date)));
            }
        }

        GroupStats {
            member_count: members.len(),
            location_count: locations.len(),
            first_seen,
            last_seen,
        }
    }

    /// Counts store occurrences per token on the pool.
    ///
    /// Submission blocks while the pool queue is full, which bounds the
    /// number of in-flight store calls however many tokens there are.
    fn count_tokens(
        &self,
        pool: &StorePool,
        hits: Vec<LexicalHit>,
        deadline: &Deadline,
    ) -> EngineResult<TokenCounts> {
        let mut counts = TokenCounts::default();
        let mut pending: Vec<(LexicalHit, Pending<Result<usize, StorageError>>)> = Vec::new();

        let mut hits = hits.into_iter();
        while let Some(hit) = hits.next() {
            let store = Arc::clone(&self.store);
            let token = hit.token.clone();
            match pool.submit(move || store.count_names_containing(&token), deadline) {
                Ok(reply) => pending.push((hit, reply)),
                Err(ExecutionError::QueueFull { .. }) => {
                    counts.unfinished.push(hit.token);
                    counts.unfinished.extend(hits.by_ref().map(|h| h.token));
                }
                Err(e) => return Err(e.into()),
            }
        }

        for (hit, reply) in pending {
            let reply = if deadline.expired() {
                reply.try_take().ok_or(None)
            } else {
                reply.wait(deadline).map_err(Some)
            };
            match reply {
                Ok(Ok(count)) => counts.counted.push((hit, count)),
                Ok(Err(e)) => {
                    warn!(token = %hit.token, error = %e, "dropping lexical candidate");
                    counts.dropped.push(hit.token);
                }
                Err(Some(ExecutionError::Disconnected { .. })) => {
                    warn!(token = %hit.token, "lexical candidate lookup lost");
                    counts.dropped.push(hit.token);
                }
                Err(_) => counts.unfinished.push(hit.token),
            }
        }

        if !counts.unfinished.is_empty() {
            warn!(
                unfinished = ?counts.unfinished,
                "discovery deadline passed; returning partial suggestions"
            );
        }
        Ok(counts)
    }
}

impl std::fmt::Debug for GroupMiner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupMiner")
            .field("scanner", &self.scanner)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn keyword_suggestion(hit: &LexicalHit, occurrences: usize) -> DiscoveredGroupSuggestion {
    let draft = GroupDefinition::keyword(title_case(&hit.token), [hit.token.clone()])
        .with_business_type(infer_business_type([hit.context.as_str()]));
    DiscoveredGroupSuggestion::new(
        SuggestionKey::Token(hit.token.clone()),
        occurrences,
        Vec::new(),
        Some(hit.token.clone()),
        draft,
    )
}

fn title_case(token: &str) -> String {
    let mut chars = token.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
