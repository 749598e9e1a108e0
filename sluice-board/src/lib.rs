//! SLUICE Board - Pipeline Board Runtime
//!
//! Moves records between pipeline stages by drag-and-drop:
//! - `drag`: pointer state machine with a render-only shadow index
//! - `reconcile`: one atomic batch of position/stage writes per drop
//! - `realtime`: republishes the confirmed board on every store push
//! - `notify`: best-effort stage-change side-effect
//! - `board`: facade choosing between shadow, prediction and confirmed index

pub mod access;
pub mod board;
pub mod config;
pub mod drag;
pub mod error;
pub mod notify;
pub mod realtime;
pub mod reconcile;

pub use access::{AccessGate, AllowAll, DenyAll};
pub use board::{Board, BoardNotice, CommitOutcome, PendingCommit};
pub use config::BoardConfig;
pub use drag::{
    DragConfig, DragController, DragPhase, DragSession, DropIntent, Point, PointerOutcome,
    DEFAULT_ACTIVATION_DISTANCE,
};
pub use error::{BoardError, BoardResult};
pub use notify::{
    HttpStatusNotifier, NoopNotifier, NotifierConfig, StatusChangePayload, StatusNotifier,
};
pub use realtime::{AdapterHandle, RealtimeAdapter};
pub use reconcile::{CommitReport, ReconcilePlan, Reconciler};
