//! Property tests for drop planning and the drag shadow.

use chrono::Utc;
use proptest::prelude::*;
use sluice_board::{
    DragConfig, DragController, DropIntent, Point, PointerOutcome, ReconcilePlan, Reconciler,
};
use sluice_core::{normalize, BoardSnapshot, PipelineRecord, RawDocument, Revision};
use sluice_storage::RecordStore;
use sluice_test_utils::assertions::{assert_partition, assert_sequential};
use sluice_test_utils::fixtures::{merchants, seeded_store};
use sluice_test_utils::InMemoryRecordStore;
use sluice_test_utils::generators::{
    arb_board_and_move, arb_messy_board, arb_raw_board_and_move, arb_raw_document, arb_record,
};

fn apply(board: &BoardSnapshot, intent: &DropIntent) -> (BoardSnapshot, ReconcilePlan) {
    let plan = Reconciler::plan(board, intent, Utc::now()).expect("record is on the board");
    let mut records: Vec<PipelineRecord> = board.records.values().cloned().collect();
    for write in plan.writes() {
        if let Some(record) = records.iter_mut().find(|r| r.id == write.id) {
            record.apply(&write.patch);
        }
    }
    (BoardSnapshot::from_records(Revision(2), records), plan)
}

/// Push the plan through an in-memory store and re-read the board, the way
/// a subscriber would see it.
fn apply_through_store(
    docs: Vec<RawDocument>,
    intent: &DropIntent,
) -> (BoardSnapshot, BoardSnapshot, ReconcilePlan) {
    let store = seeded_store(docs.clone());
    let before = BoardSnapshot::from_documents(Revision(1), &docs);
    let plan = Reconciler::plan(&before, intent, Utc::now()).expect("record is on the board");
    let after = write_and_reload(&store, &plan);
    (before, after, plan)
}

fn write_and_reload(store: &InMemoryRecordStore, plan: &ReconcilePlan) -> BoardSnapshot {
    if !plan.is_noop() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        runtime
            .block_on(store.batch_write(&merchants(), plan.writes().to_vec()))
            .expect("batch applies");
    }
    let stored = store.documents(&merchants()).expect("documents");
    BoardSnapshot::from_documents(Revision(2), &stored)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_committed_board_matches_prediction((board, id, dest) in arb_board_and_move()) {
        let source = board.index.locate(&id).unwrap();
        let intent = DropIntent::new(id.clone(), source, dest);
        let (after, plan) = apply(&board, &intent);

        prop_assert_eq!(&after.index, plan.index());
        assert_partition(&after);
        assert_sequential(&after, &[source.stage, dest.stage]);
        prop_assert_eq!(after.records.len(), board.records.len());
    }

    #[test]
    fn prop_stage_change_iff_transition((board, id, dest) in arb_board_and_move()) {
        let source = board.index.locate(&id).unwrap();
        let plan = Reconciler::plan(&board, &DropIntent::new(id.clone(), source, dest), Utc::now()).unwrap();
        match plan.transition() {
            Some(transition) => {
                prop_assert_ne!(source.stage, dest.stage);
                prop_assert_eq!(transition.from, source.stage);
                prop_assert_eq!(transition.to, dest.stage);
            }
            None => prop_assert_eq!(source.stage, dest.stage),
        }
    }

    #[test]
    fn prop_repair_is_idempotent(board in arb_messy_board()) {
        let plan = Reconciler::repair_plan(&board, Utc::now());
        let mut records: Vec<PipelineRecord> = board.records.values().cloned().collect();
        for write in plan.writes() {
            if let Some(record) = records.iter_mut().find(|r| r.id == write.id) {
                record.apply(&write.patch);
            }
        }
        let repaired = BoardSnapshot::from_records(Revision(2), records);
        assert_sequential(&repaired, &sluice_core::Stage::ALL);
        prop_assert_eq!(&repaired.index, &board.index);
        prop_assert!(Reconciler::repair_plan(&repaired, Utc::now()).is_noop());
    }

    #[test]
    fn prop_released_drop_matches_shadow((board, id, dest) in arb_board_and_move()) {
        let mut drag = DragController::new(DragConfig::default());
        prop_assert!(drag.pointer_down(&board.index, &id, Point::new(0.0, 0.0)));
        drag.pointer_move(&board.index, Point::new(25.0, 0.0), Some(dest));
        let shadow = drag.shadow().cloned().unwrap();

        match drag.pointer_up(Some(dest)) {
            PointerOutcome::Dropped(intent) => {
                let plan = Reconciler::plan(&board, &intent, Utc::now()).unwrap();
                prop_assert_eq!(plan.index(), &shadow);
            }
            other => prop_assert!(false, "expected drop, got {:?}", other),
        }
    }

    #[test]
    fn prop_stored_move_matches_prediction_for_any_shape((docs, id, dest) in arb_raw_board_and_move()) {
        let source = BoardSnapshot::from_documents(Revision(1), &docs).index.locate(&id).unwrap();
        let intent = DropIntent::new(id.clone(), source, dest);
        let (before, after, plan) = apply_through_store(docs, &intent);

        prop_assert_eq!(&after.index, plan.index());
        assert_partition(&after);
        if !plan.is_noop() {
            assert_sequential(&after, &[source.stage, dest.stage]);
        }
        prop_assert_eq!(after.records.len(), before.records.len());
    }

    #[test]
    fn prop_repair_converges_for_any_shape((docs, _id, _dest) in arb_raw_board_and_move()) {
        let store = seeded_store(docs.clone());
        let before = BoardSnapshot::from_documents(Revision(1), &docs);
        let plan = Reconciler::repair_plan(&before, Utc::now());
        let repaired = write_and_reload(&store, &plan);
        assert_sequential(&repaired, &sluice_core::Stage::ALL);
        prop_assert_eq!(&repaired.index, &before.index);
        prop_assert!(Reconciler::repair_plan(&repaired, Utc::now()).is_noop());
    }

    #[test]
    fn prop_normalize_never_panics_and_positions_are_small(doc in arb_raw_document()) {
        let record = normalize(&doc);
        prop_assert_eq!(&record.id, &doc.id);
        prop_assert!(record.position < 100);
    }

    #[test]
    fn prop_normalized_records_are_fixed_points(record in arb_record()) {
        let once = normalize(&record.to_document());
        prop_assert_eq!(&normalize(&once.to_document()), &once);
        prop_assert_eq!(once, record);
    }
}
