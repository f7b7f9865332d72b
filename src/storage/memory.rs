//! In-memory storage backend.
//!
//! Thread-safe in-memory implementation of [`RecordStore`]. It is intended
//! for embedded usage, tests, and as a reference implementation.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::identifier::{IdentifierCanonicalizer, IdentifierRoot};
use crate::record::{EntityKind, EntityRecord, RecordId};
use crate::storage::traits::{RecordStore, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

#[derive(Debug, Default)]
struct RecordState {
    records: Vec<EntityRecord>,
    by_id: HashMap<RecordId, usize>,
    by_name: HashMap<String, Vec<usize>>,
    classified: HashSet<RecordId>,
}

/// Thread-safe in-memory record store.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    state: RwLock<RecordState>,
}

impl InMemoryRecordStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `records`. Later duplicates of an id are rejected.
    pub fn with_records<I>(records: I) -> Result<Self, StorageError>
    where
        I: IntoIterator<Item = EntityRecord>,
    {
        let store = Self::new();
        for record in records {
            store.insert(record)?;
        }
        Ok(store)
    }

    /// Insert a record. Returns error if the id already exists.
    pub fn insert(&self, record: EntityRecord) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("record.insert"))?;
        if state.by_id.contains_key(record.id()) {
            return Err(StorageError::DuplicateKey(record.id().clone()));
        }

        let idx = state.records.len();
        state.by_id.insert(record.id().clone(), idx);
        if let Some(name) = record.display_name() {
            state.by_name.entry(name.to_string()).or_default().push(idx);
        }
        state.records.push(record);
        Ok(())
    }

    /// Mark a record as already assigned to a group by the host.
    pub fn mark_classified(&self, id: &RecordId) -> Result<(), StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("record.mark_classified"))?;
        if !state.by_id.contains_key(id) {
            return Err(StorageError::BackendError(format!("unknown record: {id}")));
        }
        state.classified.insert(id.clone());
        Ok(())
    }

    /// Number of stored records.
    pub fn len(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("record.len"))?;
        Ok(state.records.len())
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

impl RecordStore for InMemoryRecordStore {
    fn fetch_by_exact_name(
        &self,
        kind: &EntityKind,
        name: &str,
    ) -> Result<Vec<EntityRecord>, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("record.fetch_by_exact_name"))?;
        let Some(indices) = state.by_name.get(name) else {
            return Ok(Vec::new());
        };
        Ok(indices
            .iter()
            .map(|&i| &state.records[i])
            .filter(|r| r.kind() == kind)
            .cloned()
            .collect())
    }

    fn fetch_by_identifier_root(
        &self,
        kind: &EntityKind,
        root: &IdentifierRoot,
        limit: usize,
    ) -> Result<Vec<EntityRecord>, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("record.fetch_by_identifier_root"))?;
        // Roots are compared at the width of the requested root, whatever
        // width the stored record was keyed with.
        let width = root.as_str().len();
        let canon = IdentifierCanonicalizer::new(width);
        Ok(state
            .records
            .iter()
            .filter(|r| r.kind() == kind)
            .filter(|r| match r.identifier_root() {
                Some(own) if own.as_str().len() == width => own == root,
                _ => canon.root(r.identifier_raw()).as_ref() == Some(root),
            })
            .take(limit)
            .cloned()
            .collect())
    }

    fn sample_distinct_names(
        &self,
        kind: &EntityKind,
        cap: usize,
    ) -> Result<Vec<String>, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("record.sample_distinct_names"))?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for record in state.records.iter().filter(|r| r.kind() == kind) {
            if out.len() >= cap {
                break;
            }
            if let Some(name) = record.display_name() {
                if seen.insert(name) {
                    out.push(name.to_string());
                }
            }
        }
        Ok(out)
    }

    fn count_names_containing(&self, token: &str) -> Result<usize, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("record.count_names_containing"))?;
        let needle = token.to_lowercase();
        if needle.is_empty() {
            return Ok(0);
        }
        Ok(state
            .by_name
            .keys()
            .filter(|name| name.to_lowercase().contains(&needle))
            .count())
    }

    fn fetch_unclassified_bulk(&self) -> Result<Vec<EntityRecord>, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("record.fetch_unclassified_bulk"))?;
        Ok(state
            .records
            .iter()
            .filter(|r| !state.classified.contains(r.id()))
            .cloned()
            .collect())
    }
}
