//! Realtime subscription adapter.
//!
//! A long-lived task that turns store snapshots into board snapshots:
//! every push is re-normalized and the column index rebuilt from scratch.
//! Consumers read the latest value from a `watch` channel.

use crate::error::{BoardError, BoardResult};
use sluice_core::{BoardSnapshot, CollectionId};
use sluice_storage::{RecordStore, Snapshot, Subscription};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct RealtimeAdapter;

impl RealtimeAdapter {
    /// Subscribe to `collection` and start republishing derived snapshots.
    ///
    /// The first snapshot is derived before this returns, so `current()` is
    /// immediately meaningful.
    pub async fn spawn(
        store: Arc<dyn RecordStore>,
        collection: CollectionId,
    ) -> BoardResult<AdapterHandle> {
        let mut subscription = store
            .subscribe(&collection)
            .await
            .map_err(BoardError::Subscription)?;
        let initial = Arc::new(derive(&subscription.current()));
        tracing::info!(
            collection = %collection,
            revision = %initial.revision,
            records = initial.records.len(),
            "Board subscription started"
        );

        let (sender, receiver) = watch::channel(initial);
        let task_collection = collection.clone();
        let task = tokio::spawn(async move {
            run(subscription, sender, task_collection).await;
        });

        Ok(AdapterHandle {
            collection,
            receiver,
            task: Some(task),
        })
    }
}

async fn run(
    mut subscription: Subscription,
    sender: watch::Sender<Arc<BoardSnapshot>>,
    collection: CollectionId,
) {
    loop {
        tokio::select! {
            changed = subscription.changed() => match changed {
                Ok(snapshot) => {
                    let board = derive(&snapshot);
                    tracing::debug!(
                        collection = %collection,
                        revision = %board.revision,
                        records = board.records.len(),
                        "Board snapshot rebuilt"
                    );
                    sender.send_replace(Arc::new(board));
                }
                Err(e) => {
                    tracing::warn!(collection = %collection, error = %e, "Record subscription ended");
                    break;
                }
            },
            _ = sender.closed() => {
                tracing::debug!(collection = %collection, "No board readers left");
                break;
            }
        }
    }
}

fn derive(snapshot: &Snapshot) -> BoardSnapshot {
    BoardSnapshot::from_documents(snapshot.revision, &snapshot.documents)
}

/// Owner of the adapter task. Dropping it releases the store subscription.
pub struct AdapterHandle {
    collection: CollectionId,
    receiver: watch::Receiver<Arc<BoardSnapshot>>,
    task: Option<JoinHandle<()>>,
}

impl AdapterHandle {
    pub fn collection(&self) -> &CollectionId {
        &self.collection
    }

    /// A fresh receiver of board snapshots. Last one wins.
    pub fn snapshots(&self) -> watch::Receiver<Arc<BoardSnapshot>> {
        self.receiver.clone()
    }

    /// Latest confirmed board.
    pub fn current(&self) -> Arc<BoardSnapshot> {
        self.receiver.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the task and wait for it so the subscription is released on return.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        tracing::info!(collection = %self.collection, "Board subscription stopped");
    }
}

impl Drop for AdapterHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
