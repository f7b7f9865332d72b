//! Injected cache for normalized names.
//!
//! The engine never owns process-wide mutable state. A host that wants to
//! avoid re-normalizing the same store names across calls passes a
//! [`NameCache`] in at construction time.
//!
//! Contract: a cached value is the output of the engine's own normalizer for
//! the raw key. Entries may be evicted at any time (capacity) and expire
//! after the configured time-to-live; a miss only costs a re-normalization.
//! A cache instance must not be shared between engines configured with
//! different normalizer rules.

use std::time::Duration;

use moka::sync::Cache;

/// Cache of raw name -> normalized name.
pub trait NameCache: Send + Sync {
    /// Returns the cached normalized form of `raw`.
    fn get(&self, raw: &str) -> Option<String>;

    /// Records the normalized form of `raw`.
    fn insert(&self, raw: String, normalized: String);

    /// Drops every entry.
    fn invalidate_all(&self);
}

/// Cache that never stores anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoNameCache;

impl NameCache for NoNameCache {
    fn get(&self, _raw: &str) -> Option<String> {
        None
    }

    fn insert(&self, _raw: String, _normalized: String) {}

    fn invalidate_all(&self) {}
}

/// Bounded in-memory cache using moka.
///
/// TinyLFU admission, capacity-bounded eviction, fixed time-to-live.
pub struct TtlNameCache {
    cache: Cache<String, String>,
}

impl TtlNameCache {
    /// Create a cache holding at most `max_entries`, each living for `ttl`.
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    /// Number of entries currently in the cache (approximate).
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NameCache for TtlNameCache {
    fn get(&self, raw: &str) -> Option<String> {
        self.cache.get(raw)
    }

    fn insert(&self, raw: String, normalized: String) {
        self.cache.insert(raw, normalized);
    }

    fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

impl std::fmt::Debug for TtlNameCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlNameCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}
