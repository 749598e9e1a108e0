//! In-memory RecordStore implementation for testing.
//!
//! Documents live in a map per collection, guarded by an RwLock. Every
//! committed change bumps the collection revision and pushes a new snapshot
//! to all subscribers through a `watch` channel.

use crate::{RecordStore, Snapshot, Subscription};
use ::async_trait::async_trait;
use sluice_core::{
    CollectionId, RawDocument, RecordId, RecordWrite, Revision, SluiceError, SluiceResult,
    StorageError,
};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::watch;

struct CollectionState {
    documents: BTreeMap<RecordId, RawDocument>,
    revision: Revision,
    sender: watch::Sender<Arc<Snapshot>>,
}

impl CollectionState {
    fn new() -> Self {
        let (sender, _) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            documents: BTreeMap::new(),
            revision: Revision::ZERO,
            sender,
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.revision, self.documents.values().cloned().collect())
    }

    fn publish(&mut self) -> Revision {
        self.revision = self.revision.next();
        let snapshot = Arc::new(self.snapshot());
        self.sender.send_replace(snapshot);
        self.revision
    }
}

/// Reactive in-memory store.
///
/// Batches are validated in full before any document is touched, so a
/// rejected batch leaves the collection unchanged. Failure injection and a
/// write delay let tests exercise the rollback and in-flight paths.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    collections: Arc<RwLock<HashMap<CollectionId, CollectionState>>>,
    pending_failures: Arc<AtomicUsize>,
    batch_log: Arc<Mutex<Vec<Vec<RecordWrite>>>>,
    write_delay: Option<Duration>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `batch_write` sleeps for `delay` before committing.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Replace the whole document set of a collection.
    pub fn seed(&self, collection: &CollectionId, documents: Vec<RawDocument>) -> SluiceResult<Revision> {
        let mut collections = self.write_lock()?;
        let state = collections
            .entry(collection.clone())
            .or_insert_with(CollectionState::new);
        state.documents = documents.into_iter().map(|d| (d.id.clone(), d)).collect();
        Ok(state.publish())
    }

    /// Create a document under a fresh id.
    pub fn insert(
        &self,
        collection: &CollectionId,
        fields: Map<String, Value>,
    ) -> SluiceResult<RecordId> {
        let id = RecordId::generate();
        self.upsert(collection, RawDocument::new(id.clone(), fields))?;
        Ok(id)
    }

    /// Insert or fully replace a single document, as another client would.
    pub fn upsert(&self, collection: &CollectionId, document: RawDocument) -> SluiceResult<Revision> {
        let mut collections = self.write_lock()?;
        let state = collections
            .entry(collection.clone())
            .or_insert_with(CollectionState::new);
        state.documents.insert(document.id.clone(), document);
        Ok(state.publish())
    }

    pub fn documents(&self, collection: &CollectionId) -> SluiceResult<Vec<RawDocument>> {
        let collections = self.read_lock()?;
        Ok(collections
            .get(collection)
            .map(|state| state.documents.values().cloned().collect())
            .unwrap_or_default())
    }

    pub fn document(&self, collection: &CollectionId, id: &RecordId) -> SluiceResult<Option<RawDocument>> {
        let collections = self.read_lock()?;
        Ok(collections
            .get(collection)
            .and_then(|state| state.documents.get(id).cloned()))
    }

    pub fn revision(&self, collection: &CollectionId) -> SluiceResult<Revision> {
        let collections = self.read_lock()?;
        Ok(collections
            .get(collection)
            .map(|state| state.revision)
            .unwrap_or(Revision::ZERO))
    }

    /// Number of live subscriptions on a collection.
    pub fn subscriber_count(&self, collection: &CollectionId) -> SluiceResult<usize> {
        let collections = self.read_lock()?;
        Ok(collections
            .get(collection)
            .map(|state| state.sender.receiver_count())
            .unwrap_or(0))
    }

    /// Reject the next `count` batches.
    pub fn fail_next_batches(&self, count: usize) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Number of `batch_write` calls received, including rejected ones.
    pub fn batch_calls(&self) -> usize {
        self.batch_log.lock().map(|log| log.len()).unwrap_or(0)
    }

    /// Every batch received so far, in arrival order.
    pub fn batch_log(&self) -> SluiceResult<Vec<Vec<RecordWrite>>> {
        self.batch_log
            .lock()
            .map(|log| log.clone())
            .map_err(|_| SluiceError::Storage(StorageError::LockPoisoned))
    }

    fn take_injected_failure(&self) -> bool {
        self.pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn read_lock(
        &self,
    ) -> SluiceResult<std::sync::RwLockReadGuard<'_, HashMap<CollectionId, CollectionState>>> {
        self.collections
            .read()
            .map_err(|_| SluiceError::Storage(StorageError::LockPoisoned))
    }

    fn write_lock(
        &self,
    ) -> SluiceResult<std::sync::RwLockWriteGuard<'_, HashMap<CollectionId, CollectionState>>> {
        self.collections
            .write()
            .map_err(|_| SluiceError::Storage(StorageError::LockPoisoned))
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn subscribe(&self, collection: &CollectionId) -> SluiceResult<Subscription> {
        let mut collections = self.write_lock()?;
        let state = collections
            .entry(collection.clone())
            .or_insert_with(CollectionState::new);
        Ok(Subscription::new(state.sender.subscribe()))
    }

    async fn batch_write(
        &self,
        collection: &CollectionId,
        writes: Vec<RecordWrite>,
    ) -> SluiceResult<Revision> {
        if let Ok(mut log) = self.batch_log.lock() {
            log.push(writes.clone());
        }
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }

        if writes.is_empty() {
            return Err(StorageError::BatchRejected {
                reason: "empty batch".to_string(),
            }
            .into());
        }
        if self.take_injected_failure() {
            tracing::debug!(collection = %collection, writes = writes.len(), "Injected batch failure");
            return Err(StorageError::BatchRejected {
                reason: "injected failure".to_string(),
            }
            .into());
        }

        let mut collections = self.write_lock()?;
        let state = collections
            .get_mut(collection)
            .ok_or_else(|| StorageError::BatchRejected {
                reason: format!("unknown collection {}", collection),
            })?;

        if let Some(missing) = writes.iter().find(|w| !state.documents.contains_key(&w.id)) {
            return Err(StorageError::UnknownDocument {
                id: missing.id.clone(),
            }
            .into());
        }

        for write in &writes {
            if let Some(doc) = state.documents.get_mut(&write.id) {
                doc.fields.extend(write.patch.to_fields());
            }
        }
        let revision = state.publish();
        tracing::debug!(
            collection = %collection,
            writes = writes.len(),
            revision = %revision,
            "Committed batch"
        );
        Ok(revision)
    }
}

// ============================================================================
// TESTS
// ============================================================================
