//! Board facade.
//!
//! Owns one drag controller, the realtime adapter and the reconciler, and
//! decides which column index a host should render:
//!
//! 1. the drag shadow while a drag is active
//! 2. otherwise the prediction of a batch that is in flight or committed but
//!    not yet echoed back by the store
//! 3. otherwise the confirmed index
//!
//! A failed batch drops its prediction, so the board falls back to the last
//! confirmed index without any local state to undo.
//!
//! Pointer input and drop planning start from the same board the host is
//! rendering: the live prediction when there is one, otherwise the confirmed
//! snapshot.

use crate::access::AccessGate;
use crate::config::BoardConfig;
use crate::drag::{
    DragConfig, DragController, DragPhase, DragSession, DropIntent, Point, PointerOutcome,
};
use crate::error::{BoardError, BoardResult};
use crate::realtime::{AdapterHandle, RealtimeAdapter};
use crate::reconcile::{CommitReport, ReconcilePlan, Reconciler};
use chrono::Utc;
use sluice_core::{BoardSnapshot, ColumnIndex, RecordId, Revision, Slot};
use sluice_storage::RecordStore;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Soft, user-facing events the host should surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardNotice {
    /// A batch failed and the board reverted.
    CommitFailed(String),
    /// A stage change landed but its notification did not.
    NotificationFailed { record_id: RecordId, reason: String },
}

#[derive(Debug, Clone)]
struct Prediction {
    ticket: u64,
    /// Confirmed records with the batch applied.
    board: Arc<BoardSnapshot>,
    committed: Option<Revision>,
}

impl Prediction {
    fn new(ticket: u64, base: &BoardSnapshot, plan: &ReconcilePlan) -> Self {
        let mut records = base.records.clone();
        for write in plan.writes() {
            if let Some(record) = records.get_mut(&write.id) {
                record.apply(&write.patch);
            }
        }
        Self {
            ticket,
            board: Arc::new(BoardSnapshot::from_records(
                base.revision,
                records.into_values().collect(),
            )),
            committed: None,
        }
    }
}

/// A planned batch, detached from the board so the host can run it on a
/// task while the UI keeps rendering.
pub struct PendingCommit {
    ticket: Option<u64>,
    reconciler: Arc<Reconciler>,
    plan: ReconcilePlan,
}

impl PendingCommit {
    pub fn plan(&self) -> &ReconcilePlan {
        &self.plan
    }

    pub async fn run(self) -> CommitOutcome {
        let result = self.reconciler.submit(self.plan).await;
        CommitOutcome {
            ticket: self.ticket,
            result,
        }
    }
}

/// Result of a [`PendingCommit`], to be handed back to [`Board::finish_commit`].
#[derive(Debug)]
pub struct CommitOutcome {
    ticket: Option<u64>,
    result: BoardResult<CommitReport>,
}

pub struct Board {
    adapter: AdapterHandle,
    reconciler: Arc<Reconciler>,
    drag: DragController,
    access: Arc<dyn AccessGate>,
    read_only_press: Option<RecordId>,
    prediction: Option<Prediction>,
    next_ticket: u64,
    notice_tx: mpsc::UnboundedSender<BoardNotice>,
    notice_rx: Option<mpsc::UnboundedReceiver<BoardNotice>>,
}

impl Board {
    pub fn new(
        adapter: AdapterHandle,
        mut reconciler: Reconciler,
        drag_config: DragConfig,
        access: Arc<dyn AccessGate>,
    ) -> Self {
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        reconciler.set_notices(notice_tx.clone());
        Self {
            adapter,
            reconciler: Arc::new(reconciler),
            drag: DragController::new(drag_config),
            access,
            read_only_press: None,
            prediction: None,
            next_ticket: 0,
            notice_tx,
            notice_rx: Some(notice_rx),
        }
    }

    /// Validate `config`, subscribe to its collection and assemble a board.
    pub async fn connect(
        config: &BoardConfig,
        store: Arc<dyn RecordStore>,
        access: Arc<dyn AccessGate>,
    ) -> BoardResult<Self> {
        config.validate()?;
        let notifier = config.build_notifier().map_err(BoardError::Notifier)?;
        let adapter = RealtimeAdapter::spawn(store.clone(), config.collection.clone()).await?;
        let reconciler = Reconciler::new(store, config.collection.clone(), notifier);
        Ok(Self::new(adapter, reconciler, config.drag, access))
    }

    // ------------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------------

    /// Latest confirmed board.
    pub fn authoritative(&self) -> Arc<BoardSnapshot> {
        self.adapter.current()
    }

    /// Receiver that fires whenever the confirmed board changes.
    pub fn snapshots(&self) -> watch::Receiver<Arc<BoardSnapshot>> {
        self.adapter.snapshots()
    }

    /// The index a host should render right now.
    pub fn display_index(&mut self) -> ColumnIndex {
        if let Some(shadow) = self.drag.shadow() {
            return shadow.clone();
        }
        self.working_board().index.clone()
    }

    /// The live prediction, or the confirmed board once the store has echoed
    /// the predicted revision.
    fn working_board(&mut self) -> Arc<BoardSnapshot> {
        let confirmed = self.adapter.current();
        if let Some(prediction) = &self.prediction {
            let superseded = prediction
                .committed
                .is_some_and(|rev| confirmed.revision.is_at_least(&rev));
            if !superseded {
                return prediction.board.clone();
            }
            tracing::trace!(revision = %confirmed.revision, "Prediction superseded by store");
            self.prediction = None;
        }
        confirmed
    }

    pub fn has_prediction(&self) -> bool {
        self.prediction.is_some()
    }

    pub fn drag_session(&self) -> Option<&DragSession> {
        self.drag.session()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    /// A press or drag is in progress, including a press still below the
    /// activation distance.
    pub fn gesture_active(&self) -> bool {
        self.read_only_press.is_some() || self.drag.phase() != DragPhase::Idle
    }

    pub fn can_reorder(&self) -> bool {
        self.access.can_reorder()
    }

    /// Soft notices. Can be taken once.
    pub fn take_notices(&mut self) -> Option<mpsc::UnboundedReceiver<BoardNotice>> {
        self.notice_rx.take()
    }

    // ------------------------------------------------------------------------
    // Pointer input
    // ------------------------------------------------------------------------

    /// Press on a record. Without reorder access the press can only become a
    /// click.
    pub fn pointer_down(&mut self, record_id: &RecordId, at: Point) -> bool {
        if !self.access.can_reorder() {
            if self.read_only_press.is_some() || self.drag.phase() != DragPhase::Idle {
                return false;
            }
            let known = self.working_board().index.contains(record_id);
            if known {
                self.read_only_press = Some(record_id.clone());
            }
            return known;
        }
        if self.read_only_press.is_some() {
            return false;
        }
        let base = self.working_board();
        self.drag.pointer_down(&base.index, record_id, at)
    }

    /// Returns true when the rendered shadow changed.
    pub fn pointer_move(&mut self, at: Point, hover: Option<Slot>) -> bool {
        if self.read_only_press.is_some() {
            return false;
        }
        let base = self.working_board();
        self.drag.pointer_move(&base.index, at, hover)
    }

    pub fn pointer_up(&mut self, hover: Option<Slot>) -> PointerOutcome {
        if let Some(record_id) = self.read_only_press.take() {
            return PointerOutcome::Click(record_id);
        }
        self.drag.pointer_up(hover)
    }

    pub fn cancel(&mut self) -> PointerOutcome {
        if self.read_only_press.take().is_some() {
            return PointerOutcome::Cancelled;
        }
        self.drag.cancel()
    }

    // ------------------------------------------------------------------------
    // Committing
    // ------------------------------------------------------------------------

    /// Plan a drop against the working board and record its prediction.
    ///
    /// Returns `None` for a drop onto its origin: nothing is written and
    /// nothing is notified.
    pub fn begin_drop(&mut self, intent: &DropIntent) -> BoardResult<Option<PendingCommit>> {
        if !self.access.can_reorder() {
            return Err(BoardError::ReorderDenied);
        }
        let base = self.working_board();
        let plan = Reconciler::plan(&base, intent, Utc::now())?;
        if plan.is_noop() {
            tracing::debug!(record_id = %intent.record_id, "Drop onto origin, nothing to commit");
            return Ok(None);
        }

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.prediction = Some(Prediction::new(ticket, &base, &plan));
        Ok(Some(PendingCommit {
            ticket: Some(ticket),
            reconciler: self.reconciler.clone(),
            plan,
        }))
    }

    /// Plan a whole-board position repair. `None` when already sequential.
    pub fn begin_repair(&mut self) -> BoardResult<Option<PendingCommit>> {
        if !self.access.can_reorder() {
            return Err(BoardError::ReorderDenied);
        }
        let confirmed = self.adapter.current();
        let plan = Reconciler::repair_plan(&confirmed, Utc::now());
        if plan.is_noop() {
            return Ok(None);
        }
        Ok(Some(PendingCommit {
            ticket: None,
            reconciler: self.reconciler.clone(),
            plan,
        }))
    }

    /// Apply the result of a pending commit to the prediction state.
    pub fn finish_commit(&mut self, outcome: CommitOutcome) -> BoardResult<CommitReport> {
        let current = match (&self.prediction, outcome.ticket) {
            (Some(prediction), Some(ticket)) => prediction.ticket == ticket,
            _ => false,
        };

        match &outcome.result {
            Ok(report) => {
                if current {
                    match (report.revision, self.prediction.as_mut()) {
                        (Some(revision), Some(prediction)) => prediction.committed = Some(revision),
                        _ => self.prediction = None,
                    }
                }
            }
            Err(e) => {
                if current {
                    self.prediction = None;
                }
                let _ = self.notice_tx.send(BoardNotice::CommitFailed(e.to_string()));
            }
        }
        outcome.result
    }

    /// Plan, submit and settle a drop in one call.
    pub async fn commit_drop(&mut self, intent: &DropIntent) -> BoardResult<CommitReport> {
        match self.begin_drop(intent)? {
            Some(pending) => {
                let outcome = pending.run().await;
                self.finish_commit(outcome)
            }
            None => Ok(CommitReport::noop()),
        }
    }

    /// Resequence every column to `0..n-1`.
    pub async fn repair(&mut self) -> BoardResult<CommitReport> {
        match self.begin_repair()? {
            Some(pending) => {
                let outcome = pending.run().await;
                self.finish_commit(outcome)
            }
            None => Ok(CommitReport::noop()),
        }
    }

    /// Stop the realtime adapter and release the subscription.
    pub async fn shutdown(self) {
        self.adapter.shutdown().await;
    }
}
