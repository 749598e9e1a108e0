//! SLUICE Test Utilities
//!
//! Shared test infrastructure for the sluice workspace:
//! - Mock notifiers that record or reject stage-change calls
//! - Proptest generators for stages, raw documents and boards
//! - Fixtures for the common board scenarios
//! - Assertions for column ordering invariants

pub use sluice_core::{
    BoardSnapshot, CollectionId, ColumnIndex, NotifyError, PipelineRecord, RawDocument, RecordId,
    Revision, Slot, Stage, StageTransition,
};
pub use sluice_storage::InMemoryRecordStore;

use ::async_trait::async_trait;
use sluice_board::StatusNotifier;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// MOCK NOTIFIERS
// ============================================================================

/// Records every transition it is asked to deliver.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    calls: Arc<Mutex<Vec<StageTransition>>>,
    signal: Arc<Notify>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<StageTransition> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Wait until at least `count` calls arrived, or `timeout` passed.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.signal.notified();
            if self.call_count() >= count {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.call_count() >= count;
            }
        }
    }
}

#[async_trait]
impl StatusNotifier for RecordingNotifier {
    async fn notify_status_change(&self, transition: &StageTransition) -> Result<(), NotifyError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(transition.clone());
        }
        self.signal.notify_waiters();
        Ok(())
    }
}

/// Rejects every call with the configured status.
#[derive(Debug, Clone)]
pub struct FailingNotifier {
    status: u16,
    attempts: Arc<Mutex<usize>>,
}

impl FailingNotifier {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            attempts: Arc::new(Mutex::new(0)),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.lock().map(|a| *a).unwrap_or(0)
    }
}

impl Default for FailingNotifier {
    fn default() -> Self {
        Self::new(503)
    }
}

#[async_trait]
impl StatusNotifier for FailingNotifier {
    async fn notify_status_change(&self, _transition: &StageTransition) -> Result<(), NotifyError> {
        if let Ok(mut attempts) = self.attempts.lock() {
            *attempts += 1;
        }
        Err(NotifyError::Rejected {
            status: self.status,
        })
    }
}

/// Blocks until released. Used to show a slow notifier never blocks a commit.
#[derive(Debug, Clone, Default)]
pub struct BlockingNotifier {
    release: Arc<Notify>,
}

impl BlockingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn release(&self) {
        self.release.notify_waiters();
    }
}

#[async_trait]
impl StatusNotifier for BlockingNotifier {
    async fn notify_status_change(&self, _transition: &StageTransition) -> Result<(), NotifyError> {
        self.release.notified().await;
        Ok(())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for sluice types.

    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    pub fn arb_stage() -> impl Strategy<Value = Stage> {
        prop::sample::select(Stage::ALL.to_vec())
    }

    pub fn arb_record_id() -> impl Strategy<Value = RecordId> {
        "[a-z0-9]{4,12}".prop_map(RecordId::new)
    }

    pub fn arb_record() -> impl Strategy<Value = PipelineRecord> {
        (
            arb_record_id(),
            arb_stage(),
            0u32..50,
            prop::option::of("[A-Za-z ]{1,20}"),
            prop::option::of("[a-z]{1,8}@[a-z]{1,8}\\.test"),
        )
            .prop_map(|(id, stage, position, name, email)| {
                let mut record = PipelineRecord::new(id, stage, position);
                record.display.business_name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
                record.display.contact_email = email;
                record
            })
    }

    /// Stage-like values, including casing and junk the normalizer must repair.
    pub fn arb_stage_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            arb_stage().prop_map(|s| Value::from(s.as_db_str())),
            arb_stage().prop_map(|s| Value::from(s.as_db_str().to_uppercase())),
            "[a-z]{0,10}".prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            Just(Value::Null),
        ]
    }

    pub fn arb_position_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            (0u32..100).prop_map(Value::from),
            (-50i64..0).prop_map(Value::from),
            (0.0f64..100.0).prop_map(Value::from),
            (0u32..100).prop_map(|n| Value::from(n.to_string())),
            Just(Value::from("first")),
            Just(Value::Null),
        ]
    }

    /// Documents in canonical, legacy or bare shape.
    pub fn arb_raw_document() -> impl Strategy<Value = RawDocument> {
        (
            arb_record_id(),
            0u8..3,
            arb_stage_value(),
            arb_position_value(),
            prop::option::of("[A-Za-z]{1,12}"),
        )
            .prop_map(|(id, shape, stage, position, name)| {
                let value = match shape {
                    0 => json!({ "stage": stage, "position": position, "businessName": name }),
                    1 => json!({ "status": stage, "sortOrder": position, "dbaName": name }),
                    _ => json!({ "merchantName": name }),
                };
                RawDocument::from_value(id, value)
            })
    }

    /// Raw documents of mixed shape with unique ids, plus a record id picked
    /// from them and a destination slot.
    pub fn arb_raw_board_and_move() -> impl Strategy<Value = (Vec<RawDocument>, RecordId, Slot)> {
        (
            prop::collection::vec(arb_raw_document(), 1..20),
            any::<prop::sample::Index>(),
            arb_stage(),
            0usize..12,
        )
            .prop_map(|(mut docs, pick, stage, position)| {
                for (i, doc) in docs.iter_mut().enumerate() {
                    doc.id = RecordId::new(format!("m{i:03}"));
                }
                let id = docs[pick.index(docs.len())].id.clone();
                (docs, id, Slot::new(stage, position))
            })
    }

    /// Board whose columns are sequenced `0..n-1`, with unique ids.
    pub fn arb_board() -> impl Strategy<Value = BoardSnapshot> {
        prop::collection::vec(arb_stage(), 0..30).prop_map(|stages| {
            let mut next: HashMap<Stage, u32> = HashMap::new();
            let records = stages
                .into_iter()
                .enumerate()
                .map(|(i, stage)| {
                    let slot = next.entry(stage).or_insert(0);
                    let record = PipelineRecord::new(format!("m{i:03}"), stage, *slot);
                    *slot += 1;
                    record
                })
                .collect();
            BoardSnapshot::from_records(Revision(1), records)
        })
    }

    /// Board with duplicate and gapped positions, as left by partial failures.
    pub fn arb_messy_board() -> impl Strategy<Value = BoardSnapshot> {
        prop::collection::vec((arb_stage(), 0u32..8), 0..30).prop_map(|entries| {
            let records = entries
                .into_iter()
                .enumerate()
                .map(|(i, (stage, position))| PipelineRecord::new(format!("m{i:03}"), stage, position))
                .collect();
            BoardSnapshot::from_records(Revision(1), records)
        })
    }

    /// A non-empty board plus a record on it and a destination slot.
    ///
    /// The destination position is not clamped, so callers see overshoot.
    pub fn arb_board_and_move() -> impl Strategy<Value = (BoardSnapshot, RecordId, Slot)> {
        (
            arb_board().prop_filter("board needs a record", |b| !b.index.is_empty()),
            any::<prop::sample::Index>(),
            arb_stage(),
            0usize..40,
        )
            .prop_map(|(board, pick, stage, position)| {
                let ids: Vec<RecordId> = board.index.ids().cloned().collect();
                let id = ids[pick.index(ids.len())].clone();
                (board, id, Slot::new(stage, position))
            })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Documents and stores for common board scenarios.

    use super::*;
    use serde_json::json;

    pub fn merchants() -> CollectionId {
        CollectionId::new("merchants")
    }

    /// Canonical document.
    pub fn doc(id: &str, stage: Stage, position: u32) -> RawDocument {
        RawDocument::from_value(
            id,
            json!({
                "stage": stage.as_db_str(),
                "position": position,
                "businessName": format!("{} LLC", id),
                "email": format!("{}@merchant.test", id),
            }),
        )
    }

    /// Older document layout: `status` + `sortOrder`, `dbaName` for the title.
    pub fn legacy_doc(id: &str, stage: Stage, order: u32) -> RawDocument {
        RawDocument::from_value(
            id,
            json!({
                "status": stage.as_db_str(),
                "sortOrder": order,
                "dbaName": format!("{} Co", id),
            }),
        )
    }

    /// `count` records in one stage at positions `0..count`.
    pub fn column(prefix: &str, stage: Stage, count: u32) -> Vec<RawDocument> {
        (0..count)
            .map(|i| doc(&format!("{prefix}{i}"), stage, i))
            .collect()
    }

    /// Three leads at 0, 1, 2 named `a`, `b`, `c`.
    pub fn three_leads() -> Vec<RawDocument> {
        vec![
            doc("a", Stage::Lead, 0),
            doc("b", Stage::Lead, 1),
            doc("c", Stage::Lead, 2),
        ]
    }

    /// In-memory store seeded with `documents` under [`merchants`].
    pub fn seeded_store(documents: Vec<RawDocument>) -> Arc<InMemoryRecordStore> {
        let store = Arc::new(InMemoryRecordStore::new());
        // seeding a fresh in-memory store cannot hit a poisoned lock
        let _ = store.seed(&merchants(), documents);
        store
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for board ordering invariants.

    use super::*;
    use std::collections::HashSet;

    /// Column ids for a stage as plain strings.
    pub fn column_ids(index: &ColumnIndex, stage: Stage) -> Vec<String> {
        index.column(stage).iter().map(|id| id.as_str().to_string()).collect()
    }

    /// Every listed column has stored positions `0..n-1`.
    #[track_caller]
    pub fn assert_sequential(board: &BoardSnapshot, stages: &[Stage]) {
        for stage in stages {
            for (rank, id) in board.index.column(*stage).iter().enumerate() {
                let record = board
                    .record(id)
                    .unwrap_or_else(|| panic!("record {} missing from board", id));
                assert_eq!(
                    record.position as usize, rank,
                    "{} in {} has position {}, expected {}",
                    id, stage, record.position, rank
                );
            }
        }
    }

    /// The index holds exactly the ids of `board.records`, once each.
    #[track_caller]
    pub fn assert_partition(board: &BoardSnapshot) {
        let seen: Vec<&RecordId> = board.index.ids().collect();
        let unique: HashSet<&RecordId> = seen.iter().copied().collect();
        assert_eq!(seen.len(), unique.len(), "duplicate ids in index");
        assert_eq!(seen.len(), board.records.len(), "index and records disagree");
        for id in board.records.keys() {
            assert!(unique.contains(id), "record {} missing from index", id);
        }
    }
}
