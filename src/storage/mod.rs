//! Record store contract and the in-memory reference backend.
//!
//! The store is an external collaborator; the engine consumes it through the
//! [`RecordStore`] trait and never writes to it.

mod memory;
mod traits;

pub use memory::InMemoryRecordStore;
pub use traits::{RecordStore, StorageError};
