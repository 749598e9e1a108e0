//! SLUICE Storage - Record Store Trait and Implementations
//!
//! Defines the persistence seam the board talks to:
//! - `subscribe` delivers the full document set now and after every change
//! - `batch_write` applies a list of partial updates all-or-nothing
//!
//! Two implementations live here: an in-memory reactive store used by tests
//! and demos, and a remote client for a document-database gateway.

pub mod memory;
pub mod remote;
pub mod subscription;

pub use memory::InMemoryRecordStore;
pub use remote::{AuthConfig, ReconnectConfig, RemoteRecordStore, RemoteStoreConfig};
pub use subscription::{Snapshot, Subscription};

use ::async_trait::async_trait;
use sluice_core::{CollectionId, RecordWrite, Revision, SluiceResult};

/// Persistence collaborator for pipeline records.
///
/// Implementations must make `batch_write` atomic: either every write lands
/// or none do. There is no optimistic locking; field-level last write wins.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Subscribe to a collection.
    ///
    /// The returned subscription already holds the current document set.
    /// Dropping it releases the listener.
    async fn subscribe(&self, collection: &CollectionId) -> SluiceResult<Subscription>;

    /// Apply every write or none of them, returning the committed revision.
    async fn batch_write(
        &self,
        collection: &CollectionId,
        writes: Vec<RecordWrite>,
    ) -> SluiceResult<Revision>;
}
