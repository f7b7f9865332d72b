//! # GroupScope - Business Entity Resolution and Group Discovery
//!
//! GroupScope works over a population of business-entity records, each with
//! a display name and a hierarchical organization identifier (a company-level
//! root plus a branch suffix). It canonicalizes noisy identifiers and names,
//! clusters records of the same business group, resolves free-text mentions
//! to ranked candidates, and mines unclassified records for group
//! definitions the registry does not know yet.
//!
//! ## Core Concepts
//!
//! - **Identifier root**: the leading digits of an identifier, shared by every branch
//! - **Canonical name**: lowercase name without legal suffixes, branch markers, or sector words
//! - **Tier**: evidence strength of a resolution candidate (exact > root > fuzzy)
//! - **Registry**: ordered group definitions; the first matching entry wins
//! - **Suggestion**: a mined draft definition awaiting manual promotion
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use groupscope::{EngineConfig, EntityRecord, GroupEngine, InMemoryRecordStore};
//!
//! let records: Vec<EntityRecord> = (1..=5)
//!     .map(|i| EntityRecord::new(format!("b{i}"), Some("12.345.678/0001-00"), Some(format!("Beta Store {i}").as_str())))
//!     .collect();
//!
//! let engine = GroupEngine::new(Arc::new(InMemoryRecordStore::new()), vec![], EngineConfig::default())?;
//! let report = engine.discover_groups(records, &[])?;
//! assert_eq!(report.suggestions[0].member_count, 5);
//! assert_eq!(report.suggestions[0].common_token.as_deref(), Some("beta"));
//! # Ok::<(), groupscope::EngineError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Pure components
pub mod cache;
pub mod config;
pub mod error;
pub mod grouping;
pub mod identifier;
pub mod normalize;
pub mod record;
pub mod similarity;
pub mod value;

// Store-facing components
pub mod discovery;
pub mod engine;
pub mod registry;
pub mod resolver;
pub mod storage;

// Re-export primary types at crate root for convenience
pub use cache::{NameCache, NoNameCache, TtlNameCache};
pub use config::{
    DiscoveryConfig, EngineConfig, IdentifierConfig, NormalizerConfig, PoolConfig, ResolverConfig,
    SimilarityConfig,
};
pub use error::{EngineError, EngineResult, ExecutionError, ValidationError};
pub use grouping::{group_by_root, BucketKey, RootBuckets};
pub use identifier::{canonical_root, IdentifierCanonicalizer, IdentifierRoot};
pub use normalize::{normalize_name, NameNormalizer};
pub use record::{EntityKind, EntityRecord, KeyDeriver, RecordFields, RecordId};
pub use similarity::SimilarityScorer;
pub use value::AttributeValue;

pub use discovery::{
    infer_business_type, DiscoveredGroupSuggestion, DiscoveryReport, GroupMiner, LexicalHit,
    LexicalScanner, SuggestionKey,
};
pub use engine::runtime::{Deadline, StorePool};
pub use engine::GroupEngine;
pub use registry::{
    BusinessType, ClassificationResult, DetectionMode, DetectionRule, GroupDefinition,
    GroupRegistry, GroupStats, MatchEvidence, RegistryLoadReport, SkippedEntry,
};
pub use resolver::{MatchCandidate, MatchSubject, MatchTier, ReferenceResolver, Resolution};
pub use storage::{InMemoryRecordStore, RecordStore, StorageError};
