//! End-to-end board behaviour against the in-memory store.

use sluice_board::{
    AccessGate, AllowAll, Board, BoardConfig, BoardError, BoardNotice, DenyAll, DragConfig,
    DropIntent, Point, PointerOutcome, RealtimeAdapter, Reconciler, StatusNotifier,
};
use sluice_core::{BoardSnapshot, RecordId, Revision, Slot, Stage, StorageError, SluiceError};
use sluice_test_utils::assertions::{assert_partition, assert_sequential, column_ids};
use sluice_test_utils::fixtures::{doc, legacy_doc, merchants, seeded_store, three_leads};
use sluice_test_utils::{BlockingNotifier, FailingNotifier, InMemoryRecordStore, RecordingNotifier};
use std::sync::Arc;
use std::time::Duration;

async fn board_with(
    store: Arc<InMemoryRecordStore>,
    notifier: Arc<dyn StatusNotifier>,
    access: Arc<dyn AccessGate>,
) -> Board {
    let adapter = RealtimeAdapter::spawn(store.clone(), merchants())
        .await
        .expect("subscribe");
    let reconciler = Reconciler::new(store, merchants(), notifier);
    Board::new(adapter, reconciler, DragConfig::default(), access)
}

/// Drag `id` far enough to activate and release over `dest`.
fn drag(board: &mut Board, id: &str, dest: Slot) -> PointerOutcome {
    assert!(board.pointer_down(&RecordId::new(id), Point::new(0.0, 0.0)));
    board.pointer_move(Point::new(40.0, 10.0), Some(dest));
    board.pointer_up(Some(dest))
}

fn dropped(outcome: PointerOutcome) -> DropIntent {
    match outcome {
        PointerOutcome::Dropped(intent) => intent,
        other => panic!("expected a drop, got {:?}", other),
    }
}

async fn wait_for_revision(board: &Board, revision: Revision) -> Arc<BoardSnapshot> {
    let mut snapshots = board.snapshots();
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let current = snapshots.borrow_and_update().clone();
            if current.revision.is_at_least(&revision) {
                return current;
            }
            snapshots.changed().await.expect("adapter stopped");
        }
    })
    .await;
    waited.expect("store echo never arrived")
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[tokio::test]
async fn test_move_first_lead_into_empty_phone_column() {
    let store = seeded_store(three_leads());
    let notifier = RecordingNotifier::new();
    let mut board = board_with(store.clone(), Arc::new(notifier.clone()), Arc::new(AllowAll)).await;

    let intent = dropped(drag(&mut board, "a", Slot::new(Stage::Phone, 0)));
    assert_eq!(intent.source, Slot::new(Stage::Lead, 0));

    let report = board.commit_drop(&intent).await.unwrap();
    assert_eq!(report.writes, 3);

    let confirmed = wait_for_revision(&board, report.revision.unwrap()).await;
    assert_eq!(column_ids(&confirmed.index, Stage::Phone), vec!["a"]);
    assert_eq!(column_ids(&confirmed.index, Stage::Lead), vec!["b", "c"]);
    assert_sequential(&confirmed, &[Stage::Lead, Stage::Phone]);
    assert_partition(&confirmed);

    assert!(notifier.wait_for(1, Duration::from_secs(1)).await);
    let calls = notifier.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].record_id, RecordId::new("a"));
    assert_eq!((calls[0].from, calls[0].to), (Stage::Lead, Stage::Phone));
}

#[tokio::test]
async fn test_reorder_last_to_first_within_column() {
    let store = seeded_store(three_leads());
    let notifier = RecordingNotifier::new();
    let mut board = board_with(store.clone(), Arc::new(notifier.clone()), Arc::new(AllowAll)).await;

    let intent = dropped(drag(&mut board, "c", Slot::new(Stage::Lead, 0)));
    let report = board.commit_drop(&intent).await.unwrap();
    assert!(report.transition.is_none());

    let confirmed = wait_for_revision(&board, report.revision.unwrap()).await;
    assert_eq!(column_ids(&confirmed.index, Stage::Lead), vec!["c", "a", "b"]);
    assert_sequential(&confirmed, &[Stage::Lead]);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(notifier.call_count(), 0);
}

#[tokio::test]
async fn test_drop_onto_origin_writes_nothing() {
    let store = seeded_store(three_leads());
    let notifier = RecordingNotifier::new();
    let mut board = board_with(store.clone(), Arc::new(notifier.clone()), Arc::new(AllowAll)).await;

    // leave the column and come back before releasing
    assert!(board.pointer_down(&RecordId::new("b"), Point::new(0.0, 0.0)));
    board.pointer_move(Point::new(30.0, 0.0), Some(Slot::new(Stage::Offer, 0)));
    board.pointer_move(Point::new(2.0, 0.0), Some(Slot::new(Stage::Lead, 1)));
    let intent = dropped(board.pointer_up(Some(Slot::new(Stage::Lead, 1))));
    assert!(intent.is_noop());

    let report = board.commit_drop(&intent).await.unwrap();
    assert!(report.is_noop());
    assert!(!board.has_prediction());
    assert_eq!(store.batch_calls(), 0);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(notifier.call_count(), 0);
}

#[tokio::test]
async fn test_failed_batch_reverts_to_pre_drag_index() {
    let store = seeded_store(three_leads());
    let notifier = RecordingNotifier::new();
    let mut board = board_with(store.clone(), Arc::new(notifier.clone()), Arc::new(AllowAll)).await;
    let mut notices = board.take_notices().unwrap();
    let before = board.display_index();

    store.fail_next_batches(1);
    let intent = dropped(drag(&mut board, "a", Slot::new(Stage::Phone, 0)));
    let err = board.commit_drop(&intent).await.unwrap_err();
    assert!(matches!(
        err,
        BoardError::Commit(SluiceError::Storage(StorageError::BatchRejected { .. }))
    ));
    assert!(err.is_recoverable());

    assert_eq!(board.display_index(), before);
    assert_eq!(store.revision(&merchants()).unwrap(), Revision(1));
    assert!(matches!(notices.try_recv(), Ok(BoardNotice::CommitFailed(_))));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(notifier.call_count(), 0);
}

#[tokio::test]
async fn test_unrecognized_stage_lands_in_first_column() {
    let store = seeded_store(vec![sluice_core::RawDocument::from_value(
        "z",
        serde_json::json!({ "stage": "foobar", "businessName": "Zed Inc" }),
    )]);
    let board = board_with(store, Arc::new(RecordingNotifier::new()), Arc::new(AllowAll)).await;

    let confirmed = board.authoritative();
    let record = confirmed.record(&RecordId::new("z")).unwrap();
    assert_eq!(record.stage, Stage::first());
    assert_eq!(record.position, 0);
    assert_eq!(column_ids(&confirmed.index, Stage::first()), vec!["z"]);
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

#[tokio::test]
async fn test_notification_failure_keeps_batch_and_raises_notice() {
    let store = seeded_store(three_leads());
    let notifier = FailingNotifier::new(502);
    let mut board = board_with(store.clone(), Arc::new(notifier.clone()), Arc::new(AllowAll)).await;
    let mut notices = board.take_notices().unwrap();

    let intent = DropIntent::new("b", Slot::new(Stage::Lead, 1), Slot::new(Stage::Offer, 0));
    let report = board.commit_drop(&intent).await.unwrap();
    assert!(report.transition.is_some());

    let notice = tokio::time::timeout(Duration::from_secs(1), notices.recv())
        .await
        .expect("notice")
        .expect("channel open");
    match notice {
        BoardNotice::NotificationFailed { record_id, reason } => {
            assert_eq!(record_id, RecordId::new("b"));
            assert!(reason.contains("502"));
        }
        other => panic!("unexpected notice {:?}", other),
    }
    assert_eq!(notifier.attempts(), 1);

    let stored = store.document(&merchants(), &RecordId::new("b")).unwrap().unwrap();
    assert_eq!(stored.fields["stage"], "offer");
    assert_eq!(stored.fields["position"], 0);
}

#[tokio::test]
async fn test_slow_notifier_does_not_hold_commit() {
    let store = seeded_store(three_leads());
    let notifier = BlockingNotifier::new();
    let mut board = board_with(store.clone(), Arc::new(notifier.clone()), Arc::new(AllowAll)).await;

    let intent = DropIntent::new("a", Slot::new(Stage::Lead, 0), Slot::new(Stage::Phone, 0));
    let report = tokio::time::timeout(Duration::from_secs(1), board.commit_drop(&intent))
        .await
        .expect("commit waited on the notifier")
        .unwrap();
    assert_eq!(report.writes, 3);
    notifier.release();
}

// ============================================================================
// PREDICTION AND ACCESS
// ============================================================================

#[tokio::test]
async fn test_prediction_shown_until_store_echo() {
    let store = Arc::new(InMemoryRecordStore::new().with_write_delay(Duration::from_millis(50)));
    store.seed(&merchants(), three_leads()).unwrap();
    let mut board = board_with(store.clone(), Arc::new(RecordingNotifier::new()), Arc::new(AllowAll)).await;

    let intent = dropped(drag(&mut board, "a", Slot::new(Stage::Phone, 0)));
    let pending = board.begin_drop(&intent).unwrap().unwrap();
    let worker = tokio::spawn(pending.run());

    // batch still in flight: render the predicted board
    let predicted = board.display_index();
    assert_eq!(predicted.column(Stage::Phone), &[RecordId::new("a")]);
    assert_eq!(board.authoritative().index.column(Stage::Phone).len(), 0);

    let outcome = worker.await.unwrap();
    let report = board.finish_commit(outcome).unwrap();
    let confirmed = wait_for_revision(&board, report.revision.unwrap()).await;

    assert_eq!(board.display_index(), confirmed.index);
    assert!(!board.has_prediction());
}

#[tokio::test]
async fn test_read_only_board_only_clicks() {
    let store = seeded_store(three_leads());
    let mut board = board_with(store.clone(), Arc::new(RecordingNotifier::new()), Arc::new(DenyAll)).await;

    assert!(board.pointer_down(&RecordId::new("a"), Point::new(0.0, 0.0)));
    assert!(!board.pointer_move(Point::new(80.0, 0.0), Some(Slot::new(Stage::Phone, 0))));
    assert!(!board.is_dragging());
    assert_eq!(
        board.pointer_up(Some(Slot::new(Stage::Phone, 0))),
        PointerOutcome::Click(RecordId::new("a"))
    );

    let intent = DropIntent::new("a", Slot::new(Stage::Lead, 0), Slot::new(Stage::Phone, 0));
    assert!(matches!(board.commit_drop(&intent).await, Err(BoardError::ReorderDenied)));
    assert_eq!(store.batch_calls(), 0);
}

#[tokio::test]
async fn test_short_press_is_click_not_drop() {
    let store = seeded_store(three_leads());
    let mut board = board_with(store.clone(), Arc::new(RecordingNotifier::new()), Arc::new(AllowAll)).await;

    assert!(board.pointer_down(&RecordId::new("c"), Point::new(10.0, 10.0)));
    board.pointer_move(Point::new(12.0, 11.0), Some(Slot::new(Stage::Phone, 0)));
    assert_eq!(
        board.pointer_up(Some(Slot::new(Stage::Phone, 0))),
        PointerOutcome::Click(RecordId::new("c"))
    );
    assert_eq!(store.batch_calls(), 0);
}

// ============================================================================
// LIFECYCLE AND REPAIR
// ============================================================================

#[tokio::test]
async fn test_dropping_board_releases_subscription() {
    let store = seeded_store(three_leads());
    let board = board_with(store.clone(), Arc::new(RecordingNotifier::new()), Arc::new(AllowAll)).await;
    assert_eq!(store.subscriber_count(&merchants()).unwrap(), 1);

    drop(board);
    for _ in 0..50 {
        if store.subscriber_count(&merchants()).unwrap() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(store.subscriber_count(&merchants()).unwrap(), 0);
}

#[tokio::test]
async fn test_repair_resequences_damaged_columns() {
    let store = seeded_store(vec![
        doc("a", Stage::Offer, 0),
        doc("b", Stage::Offer, 0),
        doc("c", Stage::Offer, 7),
        doc("d", Stage::Approved, 0),
    ]);
    let mut board = board_with(store.clone(), Arc::new(RecordingNotifier::new()), Arc::new(AllowAll)).await;

    let report = board.repair().await.unwrap();
    assert_eq!(report.writes, 2);
    let confirmed = wait_for_revision(&board, report.revision.unwrap()).await;
    assert_sequential(&confirmed, &Stage::ALL);

    let again = board.repair().await.unwrap();
    assert!(again.is_noop());
}

#[tokio::test]
async fn test_drop_across_legacy_neighbours_resequences_both_columns() {
    let store = seeded_store(vec![
        doc("a", Stage::Lead, 0),
        legacy_doc("b", Stage::Lead, 1),
        legacy_doc("c", Stage::Lead, 2),
        legacy_doc("d", Stage::Phone, 0),
    ]);
    let mut board = board_with(store.clone(), Arc::new(RecordingNotifier::new()), Arc::new(AllowAll)).await;

    let intent = dropped(drag(&mut board, "a", Slot::new(Stage::Phone, 0)));
    let report = board.commit_drop(&intent).await.unwrap();
    assert_eq!(report.writes, 4);

    let confirmed = wait_for_revision(&board, report.revision.unwrap()).await;
    assert_eq!(column_ids(&confirmed.index, Stage::Lead), vec!["b", "c"]);
    assert_eq!(column_ids(&confirmed.index, Stage::Phone), vec!["a", "d"]);
    assert_sequential(&confirmed, &Stage::ALL);
    assert_eq!(board.display_index(), confirmed.index);

    let again = board.repair().await.unwrap();
    assert!(again.is_noop());
}

#[tokio::test]
async fn test_repair_converges_on_legacy_documents() {
    let store = seeded_store(vec![
        legacy_doc("b", Stage::Lead, 1),
        legacy_doc("c", Stage::Lead, 2),
        legacy_doc("e", Stage::Offer, 4),
    ]);
    let mut board = board_with(store.clone(), Arc::new(RecordingNotifier::new()), Arc::new(AllowAll)).await;

    let report = board.repair().await.unwrap();
    assert_eq!(report.writes, 3);
    let confirmed = wait_for_revision(&board, report.revision.unwrap()).await;
    assert_sequential(&confirmed, &Stage::ALL);

    assert!(board.repair().await.unwrap().is_noop());
    assert_eq!(store.batch_calls(), 1);
}

#[tokio::test]
async fn test_connect_from_config() {
    let store = seeded_store(three_leads());
    let config: BoardConfig = serde_json::from_value(serde_json::json!({
        "collection": "merchants",
        "drag": { "activation_distance": 8.0 }
    }))
    .unwrap();
    let board = Board::connect(&config, store.clone(), Arc::new(AllowAll))
        .await
        .unwrap();
    assert_eq!(board.authoritative().records.len(), 3);
    board.shutdown().await;
    assert_eq!(store.subscriber_count(&merchants()).unwrap(), 0);
}
