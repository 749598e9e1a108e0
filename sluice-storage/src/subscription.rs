//! Subscription handle returned by record stores.

use sluice_core::{RawDocument, Revision, SluiceResult, StorageError};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::AbortHandle;

/// Full document set of a collection at one revision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub revision: Revision,
    pub documents: Vec<RawDocument>,
}

impl Snapshot {
    pub fn new(revision: Revision, documents: Vec<RawDocument>) -> Self {
        Self {
            revision,
            documents,
        }
    }
}

/// Live view of a collection.
///
/// Backed by a `watch` channel, so a slow reader only ever sees the newest
/// snapshot. When a background task feeds the channel, dropping the
/// subscription aborts that task.
#[derive(Debug)]
pub struct Subscription {
    receiver: watch::Receiver<Arc<Snapshot>>,
    feeder: Option<AbortHandle>,
}

impl Subscription {
    pub fn new(receiver: watch::Receiver<Arc<Snapshot>>) -> Self {
        Self {
            receiver,
            feeder: None,
        }
    }

    /// Subscription whose snapshots are produced by a spawned task.
    pub fn with_feeder(receiver: watch::Receiver<Arc<Snapshot>>, feeder: AbortHandle) -> Self {
        Self {
            receiver,
            feeder: Some(feeder),
        }
    }

    /// Latest snapshot, marking it as seen.
    pub fn current(&mut self) -> Arc<Snapshot> {
        self.receiver.borrow_and_update().clone()
    }

    /// Wait for the next snapshot.
    pub async fn changed(&mut self) -> SluiceResult<Arc<Snapshot>> {
        self.receiver
            .changed()
            .await
            .map_err(|_| StorageError::SubscriptionClosed)?;
        Ok(self.receiver.borrow_and_update().clone())
    }

    /// Release the listener. Equivalent to dropping the subscription.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
    }
}
