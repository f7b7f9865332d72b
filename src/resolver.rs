//! Free-text reference resolution.
//!
//! A reference is resolved in three tiers, strongest evidence first:
//!
//! 1. **Exact**: records whose display name equals the reference.
//! 2. **Identifier root**: records sharing the root found in the reference.
//! 3. **Fuzzy**: sampled store names scoring above a similarity threshold.
//!
//! All tiers are always attempted and their results accumulate. The output
//! is exact candidates, then root candidates, then fuzzy candidates sorted by
//! score. The three store calls run concurrently on the store pool; when the
//! deadline passes, tiers that already answered are kept and the rest are
//! reported as unfinished.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ResolverConfig;
use crate::engine::runtime::{Deadline, Pending, StorePool};
use crate::error::{EngineResult, ExecutionError};
use crate::identifier::IdentifierCanonicalizer;
use crate::record::{EntityKind, EntityRecord};
use crate::similarity::SimilarityScorer;
use crate::storage::{RecordStore, StorageError};

/// Evidence strength of a candidate.
///
/// Ordered `Fuzzy < IdentifierRoot < Exact`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// Display name equals the reference.
    Exact,
    /// Shares the reference's identifier root.
    IdentifierRoot,
    /// Similar display name.
    Fuzzy,
}

impl MatchTier {
    const fn strength(self) -> u8 {
        match self {
            Self::Exact => 2,
            Self::IdentifierRoot => 1,
            Self::Fuzzy => 0,
        }
    }
}

impl PartialOrd for MatchTier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MatchTier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.strength().cmp(&other.strength())
    }
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::IdentifierRoot => write!(f, "identifier_root"),
            Self::Fuzzy => write!(f, "fuzzy"),
        }
    }
}

/// What a candidate points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MatchSubject {
    /// A concrete store record.
    Record(EntityRecord),
    /// A distinct display name standing for every record that carries it.
    Name(String),
}

impl MatchSubject {
    /// Display name of the subject, if any.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        match self {
            Self::Record(record) => record.display_name(),
            Self::Name(name) => Some(name),
        }
    }
}

/// One resolution candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCandidate {
    /// The matched record or name.
    pub subject: MatchSubject,
    /// Tier that produced the candidate.
    pub tier: MatchTier,
    /// Similarity score; present for the fuzzy tier only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Outcome of resolving one reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resolution {
    /// Candidates in tier order.
    pub candidates: Vec<MatchCandidate>,
    /// Tiers that had not answered when the deadline passed.
    pub unfinished: Vec<MatchTier>,
}

impl Resolution {
    /// True when every tier answered.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unfinished.is_empty()
    }

    /// Candidates of one tier.
    pub fn tier(&self, tier: MatchTier) -> impl Iterator<Item = &MatchCandidate> {
        self.candidates.iter().filter(move |c| c.tier == tier)
    }

    /// Strongest candidate, if any.
    #[must_use]
    pub fn best(&self) -> Option<&MatchCandidate> {
        self.candidates.first()
    }
}

type TierReply<T> = Result<T, StorageError>;

/// Resolves free-text references against a record store.
pub struct ReferenceResolver {
    store: Arc<dyn RecordStore>,
    identifiers: IdentifierCanonicalizer,
    scorer: SimilarityScorer,
    config: ResolverConfig,
}

impl ReferenceResolver {
    /// Creates a resolver over `store`.
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        identifiers: IdentifierCanonicalizer,
        scorer: SimilarityScorer,
        config: ResolverConfig,
    ) -> Self {
        Self {
            store,
            identifiers,
            scorer,
            config,
        }
    }

    /// Resolves `reference` among records of `kind`.
    ///
    /// # Errors
    /// - `StoreUnavailable`: a tier's store call failed
    /// - `Disconnected`: the store pool has shut down
    pub fn resolve(
        &self,
        pool: &StorePool,
        reference: &str,
        kind: &EntityKind,
        deadline: &Deadline,
    ) -> EngineResult<Resolution> {
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Ok(Resolution::default());
        }

        let mut resolution = Resolution::default();

        // Exact means byte-for-byte, surrounding whitespace included.
        let exact = self.submit_tier(pool, deadline, MatchTier::Exact, {
            let store = Arc::clone(&self.store);
            let kind = kind.clone();
            let name = reference.to_string();
            move || store.fetch_by_exact_name(&kind, &name)
        })?;
        let reference = trimmed;

        let root = match self.identifiers.root(Some(reference)) {
            Some(root) => self.submit_tier(pool, deadline, MatchTier::IdentifierRoot, {
                let store = Arc::clone(&self.store);
                let kind = kind.clone();
                let limit = self.config.root_fetch_limit;
                move || store.fetch_by_identifier_root(&kind, &root, limit)
            })?,
            None => TierSlot::Skipped,
        };

        let sample = self.submit_tier(pool, deadline, MatchTier::Fuzzy, {
            let store = Arc::clone(&self.store);
            let kind = kind.clone();
            let cap = self.config.fuzzy_sample_cap;
            move || store.sample_distinct_names(&kind, cap)
        })?;

        if let Some(records) = collect(exact, deadline, MatchTier::Exact, "fetch_by_exact_name", &mut resolution)? {
            debug!(tier = %MatchTier::Exact, count = records.len(), "resolver tier finished");
            resolution
                .candidates
                .extend(records.into_iter().map(|r| MatchCandidate {
                    subject: MatchSubject::Record(r),
                    tier: MatchTier::Exact,
                    score: None,
                }));
        }

        if let Some(records) = collect(
            root,
            deadline,
            MatchTier::IdentifierRoot,
            "fetch_by_identifier_root",
            &mut resolution,
        )? {
            debug!(tier = %MatchTier::IdentifierRoot, count = records.len(), "resolver tier finished");
            resolution
                .candidates
                .extend(records.into_iter().map(|r| MatchCandidate {
                    subject: MatchSubject::Record(r),
                    tier: MatchTier::IdentifierRoot,
                    score: None,
                }));
        }

        if let Some(names) = collect(sample, deadline, MatchTier::Fuzzy, "sample_distinct_names", &mut resolution)? {
            let fuzzy = self.rank_fuzzy(reference, names);
            debug!(tier = %MatchTier::Fuzzy, count = fuzzy.len(), "resolver tier finished");
            resolution.candidates.extend(fuzzy);
        }

        if !resolution.is_complete() {
            warn!(
                reference,
                unfinished = ?resolution.unfinished,
                "resolver deadline passed; returning partial candidates"
            );
        }
        Ok(resolution)
    }

    /// Scores sampled names against the reference and keeps the best.
    #[must_use]
    pub fn rank_fuzzy(&self, reference: &str, names: Vec<String>) -> Vec<MatchCandidate> {
        let query = self.scorer.normalized(reference);
        if query.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(String, f64)> = names
            .into_iter()
            .filter_map(|name| {
                let candidate = self.scorer.normalized(&name);
                let score = self.scorer.score_normalized(&query, &candidate);
                (score >= self.config.fuzzy_threshold).then_some((name, score))
            })
            .collect();

        // Stable: equal scores keep sampling order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(self.config.fuzzy_top_k);

        scored
            .into_iter()
            .map(|(name, score)| MatchCandidate {
                subject: MatchSubject::Name(name),
                tier: MatchTier::Fuzzy,
                score: Some(score),
            })
            .collect()
    }

    fn submit_tier<T, F>(
        &self,
        pool: &StorePool,
        deadline: &Deadline,
        tier: MatchTier,
        job: F,
    ) -> EngineResult<TierSlot<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> TierReply<T> + Send + 'static,
    {
        match pool.submit(job, deadline) {
            Ok(pending) => Ok(TierSlot::Pending(pending)),
            Err(ExecutionError::QueueFull { .. }) => Ok(TierSlot::NotStarted(tier)),
            Err(e) => Err(e.into()),
        }
    }
}

enum TierSlot<T> {
    Pending(Pending<TierReply<T>>),
    NotStarted(MatchTier),
    Skipped,
}

fn collect<T>(
    slot: TierSlot<T>,
    deadline: &Deadline,
    tier: MatchTier,
    operation: &str,
    resolution: &mut Resolution,
) -> EngineResult<Option<T>> {
    let reply = match slot {
        TierSlot::Skipped => return Ok(None),
        TierSlot::NotStarted(tier) => {
            resolution.unfinished.push(tier);
            return Ok(None);
        }
        TierSlot::Pending(pending) => {
            if deadline.expired() {
                // Budget already spent: keep the reply only if it is ready.
                pending.try_take()
            } else {
                match pending.wait(deadline) {
                    Ok(reply) => Some(reply),
                    Err(ExecutionError::Timeout { .. }) => None,
                    Err(e) => return Err(e.into()),
                }
            }
        }
    };

    match reply {
        Some(Ok(value)) => Ok(Some(value)),
        Some(Err(e)) => Err(ExecutionError::store(operation, &e).into()),
        None => {
            resolution.unfinished.push(tier);
            Ok(None)
        }
    }
}

impl fmt::Debug for ReferenceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceResolver")
            .field("identifiers", &self.identifiers)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
