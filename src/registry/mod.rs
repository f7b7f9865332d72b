//! Registry of known business groups.
//!
//! The registry is an ordered list of [`GroupDefinition`]s, loaded once and
//! read-only afterwards. Classification scans it in declaration order and the
//! first entry that matches wins, so declaration order is part of the
//! contract. Changing the registry means building a new one.

/// Registry construction and classification.
pub mod classifier;
/// Group definitions and detection rules.
pub mod definition;

pub use classifier::{ClassificationResult, GroupRegistry, MatchEvidence, RegistryLoadReport, SkippedEntry};
pub use definition::{BusinessType, DetectionMode, DetectionRule, GroupDefinition, GroupStats};
