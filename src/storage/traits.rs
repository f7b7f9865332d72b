//! Abstract record store contract.
//!
//! The engine only ever reads from the store. Implementations may block for
//! unbounded I/O latency; the engine runs every call on its bounded store
//! pool and never calls a store method from a pure code path.

use thiserror::Error;

use crate::identifier::IdentifierRoot;
use crate::record::{EntityKind, EntityRecord, RecordId};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store cannot be reached.
    #[error("Record store unavailable: {0}")]
    Unavailable(String),

    /// Key already exists.
    #[error("Duplicate key: {0}")]
    DuplicateKey(RecordId),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

/// Read-only access to the population of entity records.
///
/// # Safety Considerations
/// - Implementations must be safe to call from several store workers at once
/// - Name comparisons in `count_names_containing` are case-insensitive
pub trait RecordStore: Send + Sync {
    /// Records of `kind` whose display name equals `name` exactly (case-sensitive).
    fn fetch_by_exact_name(
        &self,
        kind: &EntityKind,
        name: &str,
    ) -> Result<Vec<EntityRecord>, StorageError>;

    /// Up to `limit` records of `kind` sharing `root`.
    fn fetch_by_identifier_root(
        &self,
        kind: &EntityKind,
        root: &IdentifierRoot,
        limit: usize,
    ) -> Result<Vec<EntityRecord>, StorageError>;

    /// Up to `cap` distinct display names of `kind`, in a stable order.
    fn sample_distinct_names(
        &self,
        kind: &EntityKind,
        cap: usize,
    ) -> Result<Vec<String>, StorageError>;

    /// Number of distinct display names containing `token`, any kind.
    fn count_names_containing(&self, token: &str) -> Result<usize, StorageError>;

    /// Every record the host has not yet assigned to a group.
    fn fetch_unclassified_bulk(&self) -> Result<Vec<EntityRecord>, StorageError>;
}
