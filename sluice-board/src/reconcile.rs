//! Reconciler: turns a drop into one atomic batch of position/stage writes.

use crate::drag::DropIntent;
use crate::error::{BoardError, BoardResult};
use crate::notify::StatusNotifier;
use crate::BoardNotice;
use chrono::Utc;
use sluice_core::{
    BoardSnapshot, CollectionId, ColumnIndex, RecordId, RecordPatch, RecordWrite, Revision,
    Stage, StageTransition, Timestamp,
};
use sluice_storage::RecordStore;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Writes computed for one drop or repair, plus the index they produce.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilePlan {
    writes: Vec<RecordWrite>,
    transition: Option<StageTransition>,
    index: ColumnIndex,
}

impl ReconcilePlan {
    fn noop(index: ColumnIndex) -> Self {
        Self {
            writes: Vec::new(),
            transition: None,
            index,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn writes(&self) -> &[RecordWrite] {
        &self.writes
    }

    pub fn transition(&self) -> Option<&StageTransition> {
        self.transition.as_ref()
    }

    /// Column index the board will show once the batch lands.
    pub fn index(&self) -> &ColumnIndex {
        &self.index
    }
}

/// Outcome of a commit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitReport {
    /// Revision of the committed batch. `None` when nothing was written.
    pub revision: Option<Revision>,
    pub writes: usize,
    pub transition: Option<StageTransition>,
}

impl CommitReport {
    pub fn noop() -> Self {
        Self::default()
    }

    pub fn is_noop(&self) -> bool {
        self.revision.is_none()
    }
}

/// Computes and submits batches against the record store.
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    collection: CollectionId,
    notifier: Arc<dyn StatusNotifier>,
    notices: Option<mpsc::UnboundedSender<BoardNotice>>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn RecordStore>,
        collection: CollectionId,
        notifier: Arc<dyn StatusNotifier>,
    ) -> Self {
        Self {
            store,
            collection,
            notifier,
            notices: None,
        }
    }

    /// Route soft failures (notification errors) to `sender`.
    pub fn set_notices(&mut self, sender: mpsc::UnboundedSender<BoardNotice>) {
        self.notices = Some(sender);
    }

    pub fn collection(&self) -> &CollectionId {
        &self.collection
    }

    /// Plan the writes for `intent` against the confirmed `snapshot`.
    ///
    /// The record is taken out of its current column and spliced into
    /// `intent.dest` (post-removal coordinates). Every record in the touched
    /// columns whose stored `(stage, position)` differs from its new rank gets
    /// a write; the moved record always does.
    pub fn plan(
        snapshot: &BoardSnapshot,
        intent: &DropIntent,
        now: Timestamp,
    ) -> BoardResult<ReconcilePlan> {
        if intent.is_noop() {
            return Ok(ReconcilePlan::noop(snapshot.index.clone()));
        }

        let unknown = || BoardError::UnknownRecord {
            id: intent.record_id.clone(),
        };
        let moving = snapshot.record(&intent.record_id).ok_or_else(unknown)?;
        let current = snapshot.index.locate(&intent.record_id).ok_or_else(unknown)?;
        let index = snapshot
            .index
            .with_move(&intent.record_id, intent.dest)
            .ok_or_else(unknown)?;

        let mut touched = vec![current.stage];
        if intent.dest.stage != current.stage {
            touched.push(intent.dest.stage);
        }

        let mut writes = Vec::new();
        for stage in touched {
            for (rank, id) in index.column(stage).iter().enumerate() {
                let rank = to_position(rank);
                if id == &intent.record_id {
                    writes.push(RecordWrite {
                        id: id.clone(),
                        patch: RecordPatch {
                            stage: Some(stage),
                            position: Some(rank),
                            updated_at: now,
                        },
                    });
                } else if needs_position(snapshot, id, stage, rank) {
                    writes.push(position_write(id, rank, now));
                }
            }
        }

        let transition = (moving.stage != intent.dest.stage).then(|| StageTransition {
            record_id: intent.record_id.clone(),
            from: moving.stage,
            to: intent.dest.stage,
        });

        Ok(ReconcilePlan {
            writes,
            transition,
            index,
        })
    }

    /// Writes that resequence every column to `0..n-1`.
    pub fn repair_plan(snapshot: &BoardSnapshot, now: Timestamp) -> ReconcilePlan {
        let mut writes = Vec::new();
        for (stage, column) in snapshot.index.iter() {
            for (rank, id) in column.iter().enumerate() {
                let rank = to_position(rank);
                if needs_position(snapshot, id, stage, rank) {
                    writes.push(position_write(id, rank, now));
                }
            }
        }
        ReconcilePlan {
            writes,
            transition: None,
            index: snapshot.index.clone(),
        }
    }

    /// Plan and submit the batch for a drop.
    pub async fn commit(
        &self,
        intent: &DropIntent,
        snapshot: &BoardSnapshot,
    ) -> BoardResult<CommitReport> {
        let plan = Self::plan(snapshot, intent, Utc::now())?;
        self.submit(plan).await
    }

    /// Submit a plan as one batch. A no-op plan touches neither the store nor
    /// the notifier.
    pub async fn submit(&self, plan: ReconcilePlan) -> BoardResult<CommitReport> {
        if plan.is_noop() {
            tracing::debug!(collection = %self.collection, "Nothing to reconcile");
            return Ok(CommitReport::noop());
        }

        let ReconcilePlan {
            writes, transition, ..
        } = plan;
        let count = writes.len();
        let revision = self
            .store
            .batch_write(&self.collection, writes)
            .await
            .map_err(|e| {
                tracing::warn!(
                    collection = %self.collection,
                    writes = count,
                    error = %e,
                    "Batch write failed"
                );
                BoardError::Commit(e)
            })?;

        tracing::info!(
            collection = %self.collection,
            writes = count,
            revision = %revision,
            "Board change committed"
        );

        if let Some(transition) = &transition {
            self.dispatch_notification(transition.clone());
        }

        Ok(CommitReport {
            revision: Some(revision),
            writes: count,
            transition,
        })
    }

    /// Fire the stage-change notification without waiting for it.
    fn dispatch_notification(&self, transition: StageTransition) {
        let notifier = self.notifier.clone();
        let notices = self.notices.clone();
        tokio::spawn(async move {
            match notifier.notify_status_change(&transition).await {
                Ok(()) => {
                    tracing::debug!(
                        record_id = %transition.record_id,
                        from = %transition.from,
                        to = %transition.to,
                        "Status change notified"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        record_id = %transition.record_id,
                        error = %e,
                        "Status change notification failed"
                    );
                    if let Some(notices) = notices {
                        let _ = notices.send(BoardNotice::NotificationFailed {
                            record_id: transition.record_id.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        });
    }
}

fn to_position(rank: usize) -> u32 {
    u32::try_from(rank).unwrap_or(u32::MAX)
}

fn needs_position(snapshot: &BoardSnapshot, id: &RecordId, stage: Stage, rank: u32) -> bool {
    snapshot
        .record(id)
        .map(|r| r.stage != stage || r.position != rank)
        .unwrap_or(false)
}

fn position_write(id: &RecordId, rank: u32, now: Timestamp) -> RecordWrite {
    RecordWrite {
        id: id.clone(),
        patch: RecordPatch {
            stage: None,
            position: Some(rank),
            updated_at: now,
        },
    }
}

// ============================================================================
// TESTS
// ============================================================================
