//! Group engine facade.
//!
//! [`GroupEngine`] wires the pure components (canonicalizer, normalizer,
//! scorer, grouper) to a record store, a registry snapshot, and the bounded
//! store pool. Classification against the registry is pure; resolution and
//! discovery read the store through the pool under a deadline.

/// Bounded store worker pool and call deadlines.
pub mod runtime;

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tracing::{debug, info};

use crate::cache::{NameCache, NoNameCache};
use crate::config::EngineConfig;
use crate::discovery::{DiscoveryReport, GroupMiner};
use crate::error::{EngineResult, ExecutionError};
use crate::record::{EntityKind, EntityRecord, KeyDeriver};
use crate::registry::{ClassificationResult, GroupDefinition, GroupRegistry, RegistryLoadReport};
use crate::resolver::{ReferenceResolver, Resolution};
use crate::similarity::SimilarityScorer;
use crate::storage::RecordStore;

use self::runtime::{Deadline, StorePool};

/// Entity resolution and group discovery over one record store.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use groupscope::{EngineConfig, EntityKind, EntityRecord, GroupDefinition, GroupEngine, InMemoryRecordStore};
///
/// let store = InMemoryRecordStore::with_records(vec![
///     EntityRecord::new("1", Some("12.345.678/0001-90"), Some("Acme Foods")),
/// ]).unwrap();
/// let engine = GroupEngine::new(
///     Arc::new(store),
///     vec![GroupDefinition::uniform_identifier("Acme", ["12345678"])],
///     EngineConfig::default(),
/// ).unwrap();
///
/// let resolution = engine.resolve_reference("Acme Foods", &EntityKind::Customer).unwrap();
/// assert!(resolution.is_complete());
/// assert_eq!(resolution.best().unwrap().subject.display_name(), Some("Acme Foods"));
///
/// let hit = engine.classify_entity(Some("12345678000271"), Some("Acme North")).unwrap();
/// assert_eq!(hit.group.name, "Acme");
/// ```
pub struct GroupEngine {
    store: Arc<dyn RecordStore>,
    config: EngineConfig,
    deriver: KeyDeriver,
    resolver: ReferenceResolver,
    miner: GroupMiner,
    registry: RwLock<Arc<GroupRegistry>>,
    pool: StorePool,
}

impl GroupEngine {
    /// Creates an engine with the given startup registry.
    ///
    /// Malformed registry entries are skipped and logged.
    ///
    /// # Errors
    /// - `InvalidConfig`: the configuration does not validate
    pub fn new(
        store: Arc<dyn RecordStore>,
        definitions: Vec<GroupDefinition>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        Self::with_name_cache(store, definitions, config, Arc::new(NoNameCache))
    }

    /// Creates an engine whose scorer reuses normalized names from `cache`.
    pub fn with_name_cache(
        store: Arc<dyn RecordStore>,
        definitions: Vec<GroupDefinition>,
        config: EngineConfig,
        cache: Arc<dyn NameCache>,
    ) -> EngineResult<Self> {
        config.validate()?;

        let deriver = KeyDeriver::from_config(&config)?;
        let identifiers = *deriver.identifiers();
        let scorer = SimilarityScorer::new(Arc::clone(deriver.names()), &config.similarity)
            .with_cache(cache);
        let resolver = ReferenceResolver::new(
            Arc::clone(&store),
            identifiers,
            scorer,
            config.resolver.clone(),
        );
        let miner = GroupMiner::new(
            Arc::clone(&store),
            Arc::clone(deriver.names()),
            config.discovery.clone(),
        )?;
        let (registry, _) = GroupRegistry::new(definitions, identifiers);
        let pool = StorePool::start(&config.pool)?;

        info!(
            workers = pool.worker_count(),
            queue_capacity = pool.queue_capacity(),
            registry_entries = registry.len(),
            "group engine started"
        );

        Ok(Self {
            store,
            config,
            deriver,
            resolver,
            miner,
            registry: RwLock::new(Arc::new(registry)),
            pool,
        })
    }

    /// Engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Key deriver configured for this engine.
    #[must_use]
    pub const fn deriver(&self) -> &KeyDeriver {
        &self.deriver
    }

    /// The record store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Current registry snapshot. Later reloads do not affect it.
    #[must_use]
    pub fn registry(&self) -> Arc<GroupRegistry> {
        // The lock only guards an Arc swap; a poisoned lock still holds a whole snapshot.
        let guard = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replaces the registry wholesale.
    ///
    /// Classifications already running keep the snapshot they started with.
    pub fn reload_registry(&self, definitions: Vec<GroupDefinition>) -> RegistryLoadReport {
        let (registry, report) = GroupRegistry::new(definitions, *self.deriver.identifiers());
        self.swap_registry(registry);
        report
    }

    /// Replaces the registry from a JSON array of definitions.
    ///
    /// # Errors
    /// - `InvalidRegistryDocument`: the document is not a JSON array
    pub fn reload_registry_json(&self, json: &str) -> EngineResult<RegistryLoadReport> {
        let (registry, report) = GroupRegistry::from_json_str(json, *self.deriver.identifiers())?;
        self.swap_registry(registry);
        Ok(report)
    }

    /// Resolves a free-text reference using the configured default timeout.
    ///
    /// # Errors
    /// - `StoreUnavailable`: a tier's store call failed
    pub fn resolve_reference(&self, text: &str, kind: &EntityKind) -> EngineResult<Resolution> {
        self.resolve_reference_with_timeout(text, kind, self.config.default_timeout)
    }

    /// Resolves a free-text reference within `timeout`.
    ///
    /// Tiers still running when the timeout passes are listed in
    /// [`Resolution::unfinished`].
    pub fn resolve_reference_with_timeout(
        &self,
        text: &str,
        kind: &EntityKind,
        timeout: Option<Duration>,
    ) -> EngineResult<Resolution> {
        let deadline = Deadline::after(timeout);
        self.resolver.resolve(&self.pool, text, kind, &deadline)
    }

    /// Classifies a structured record by identifier and name.
    #[must_use]
    pub fn classify_entity(
        &self,
        identifier_raw: Option<&str>,
        display_name: Option<&str>,
    ) -> Option<ClassificationResult> {
        self.registry().classify_entity(identifier_raw, display_name)
    }

    /// Classifies a record.
    #[must_use]
    pub fn classify_record(&self, record: &EntityRecord) -> Option<ClassificationResult> {
        self.registry().classify_record(record)
    }

    /// Classifies free text.
    ///
    /// Registry keywords are tried first. When none matches, lexical group
    /// mentions in the text are checked against the store and the first
    /// confirmed token yields a provisional result.
    ///
    /// # Errors
    /// - `Disconnected`: the store pool has shut down
    pub fn classify_text(&self, text: &str) -> EngineResult<Option<ClassificationResult>> {
        let registry = self.registry();
        if let Some(hit) = registry.classify_text(text) {
            return Ok(Some(hit));
        }
        let deadline = Deadline::after(self.config.default_timeout);
        self.miner
            .provisional_match(&self.pool, text, &registry, &deadline)
    }

    /// Mines records the registry could not place, using the default timeout.
    ///
    /// `text_corpus` feeds the lexical pass and may be empty.
    pub fn discover_groups(
        &self,
        unclassified: Vec<EntityRecord>,
        text_corpus: &[String],
    ) -> EngineResult<DiscoveryReport> {
        self.discover_groups_with_timeout(unclassified, text_corpus, self.config.default_timeout)
    }

    /// Mines records within `timeout`.
    pub fn discover_groups_with_timeout(
        &self,
        unclassified: Vec<EntityRecord>,
        text_corpus: &[String],
        timeout: Option<Duration>,
    ) -> EngineResult<DiscoveryReport> {
        let deadline = Deadline::after(timeout);
        let records = self.rekey_all(unclassified);
        let registry = self.registry();
        self.miner
            .discover(&self.pool, records, text_corpus, &registry, &deadline)
    }

    /// Fetches the store's unclassified records and mines those the current
    /// registry cannot place either.
    ///
    /// # Errors
    /// - `StoreUnavailable`: the bulk fetch failed
    /// - `Timeout`: the bulk fetch did not finish in time
    pub fn discover_from_store(&self, text_corpus: &[String]) -> EngineResult<DiscoveryReport> {
        let deadline = Deadline::after(self.config.default_timeout);
        let pending = self.pool.submit(
            {
                let store = Arc::clone(&self.store);
                move || store.fetch_unclassified_bulk()
            },
            &deadline,
        )?;
        let bulk = pending
            .wait(&deadline)?
            .map_err(|e| ExecutionError::store("fetch_unclassified_bulk", &e))?;

        let registry = self.registry();
        let fetched = bulk.len();
        let records: Vec<EntityRecord> = self
            .rekey_all(bulk)
            .into_iter()
            .filter(|r| registry.classify_record(r).is_none())
            .collect();
        debug!(fetched, unplaced = records.len(), "unclassified records fetched");

        self.miner
            .discover(&self.pool, records, text_corpus, &registry, &deadline)
    }

    fn rekey_all(&self, records: Vec<EntityRecord>) -> Vec<EntityRecord> {
        records.into_iter().map(|r| self.deriver.rekey(r)).collect()
    }

    fn swap_registry(&self, registry: GroupRegistry) {
        let entries = registry.len();
        let mut guard = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(registry);
        drop(guard);
        info!(entries, "group registry reloaded");
    }
}

impl std::fmt::Debug for GroupEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupEngine")
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::registry::MatchEvidence;
    use crate::storage::InMemoryRecordStore;

    fn engine(records: Vec<EntityRecord>, definitions: Vec<GroupDefinition>) -> GroupEngine {
        let store = InMemoryRecordStore::with_records(records).unwrap();
        GroupEngine::new(Arc::new(store), definitions, EngineConfig::default()).unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.identifier.root_length = 0;
        let err = GroupEngine::new(Arc::new(InMemoryRecordStore::new()), vec![], config).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn reload_swaps_snapshot_without_touching_old_one() {
        let engine = engine(vec![], vec![GroupDefinition::uniform_name("Acme")]);
        let before = engine.registry();

        let report = engine.reload_registry(vec![
            GroupDefinition::uniform_name("Zeta"),
            GroupDefinition::keyword("Empty", Vec::<String>::new()),
        ]);
        assert_eq!(report.accepted, 1);
        assert_eq!(report.skipped.len(), 1);

        assert!(before.classify_entity(None, Some("Acme One")).is_some());
        assert!(engine.classify_entity(None, Some("Acme One")).is_none());
        assert!(engine.classify_entity(None, Some("Zeta One")).is_some());
    }

    #[test]
    fn reload_from_json() {
        let engine = engine(vec![], vec![]);
        let report = engine
            .reload_registry_json(r#"[{"name": "Rio", "detection": {"mode": "keyword"}, "keywords": ["rionet"]}]"#)
            .unwrap();
        assert_eq!(report.accepted, 1);
        assert!(engine.reload_registry_json("not json").unwrap_err().is_validation());
        // A rejected document leaves the previous registry in place.
        assert_eq!(engine.registry().len(), 1);
    }

    #[test]
    fn classify_text_prefers_registry_keywords() {
        let records = vec![
            EntityRecord::new("1", None, Some("Rionet Market")),
            EntityRecord::new("2", None, Some("Rionet Foods")),
            EntityRecord::new("3", None, Some("Rionet Bakery")),
        ];
        let engine = engine(records, vec![GroupDefinition::keyword("Rio Network", ["rionet"])]);
        let hit = engine.classify_text("sales at group rionet").unwrap().unwrap();
        assert!(!hit.provisional);
        assert_eq!(hit.group.name, "Rio Network");
    }

    #[test]
    fn classify_text_falls_back_to_lexical_heuristic() {
        let records = vec![
            EntityRecord::new("1", None, Some("Zeta Market")),
            EntityRecord::new("2", None, Some("Zeta Foods")),
            EntityRecord::new("3", None, Some("Zeta Bakery")),
        ];
        let engine = engine(records, vec![]);
        let hit = engine.classify_text("what did group zeta buy?").unwrap().unwrap();
        assert!(hit.provisional);
        assert!(matches!(hit.evidence, MatchEvidence::LexicalToken { occurrences: 3, .. }));
        assert!(engine.classify_text("nothing to see").unwrap().is_none());
    }

    #[test]
    fn discover_rekeys_with_engine_root_length() {
        let store = InMemoryRecordStore::new();
        let mut config = EngineConfig::default();
        config.identifier.root_length = 4;
        let engine = GroupEngine::new(Arc::new(store), vec![], config).unwrap();

        // Same first four digits, different default-length roots.
        let records = vec![
            EntityRecord::new("1", Some("12340000"), Some("Kappa One")),
            EntityRecord::new("2", Some("12341111"), Some("Kappa Two")),
            EntityRecord::new("3", Some("12342222"), Some("Kappa Three")),
        ];
        let report = engine.discover_groups(records, &[]).unwrap();
        assert_eq!(report.suggestions.len(), 1);
        assert_eq!(report.suggestions[0].member_count, 3);
        assert_eq!(report.suggestions[0].common_token.as_deref(), Some("kappa"));
    }
}
