//! Application state for the board terminal.

use crate::config::TuiConfig;
use crate::keys::Action;
use crate::layout::BoardLayout;
use crate::notifications::{Notification, NotificationLevel};
use crate::theme::SynthBruteTheme;
use crossterm::event::{MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use sluice_board::{
    Board, BoardNotice, CommitOutcome, DropIntent, PendingCommit, Point, PointerOutcome,
};
use sluice_core::{BoardSnapshot, ColumnIndex, PipelineRecord, RecordId};
use std::sync::Arc;

const MAX_NOTIFICATIONS: usize = 50;

/// What the event loop should do after an input.
#[derive(Debug, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

pub struct App {
    pub config: TuiConfig,
    pub board: Board,
    pub theme: SynthBruteTheme,
    pub layout: BoardLayout,
    /// Index rendered this frame.
    pub display: ColumnIndex,
    /// Confirmed records, for card contents.
    pub records: Arc<BoardSnapshot>,
    pub notifications: Vec<Notification>,
    pub detail: Option<RecordId>,
    pub help_visible: bool,
    pub commits_in_flight: usize,
}

impl App {
    pub fn new(config: TuiConfig, board: Board) -> Self {
        let records = board.authoritative();
        let display = records.index.clone();
        Self {
            config,
            board,
            theme: SynthBruteTheme::synthbrute(),
            layout: BoardLayout::default(),
            display,
            records,
            notifications: Vec::new(),
            detail: None,
            help_visible: false,
            commits_in_flight: 0,
        }
    }

    /// Refresh geometry and the rendered index. Call once per frame.
    pub fn sync_frame(&mut self, area: Rect) {
        self.layout = BoardLayout::new(area);
        self.records = self.board.authoritative();
        self.display = self.board.display_index();
        if let Some(id) = &self.detail {
            if !self.records.records.contains_key(id) {
                self.detail = None;
            }
        }
    }

    pub fn notify(&mut self, level: NotificationLevel, message: impl Into<String>) {
        self.notifications.push(Notification::new(level, message));
        if self.notifications.len() > MAX_NOTIFICATIONS {
            self.notifications.remove(0);
        }
    }

    pub fn record(&self, id: &RecordId) -> Option<&PipelineRecord> {
        self.records.record(id)
    }

    pub fn detail_record(&self) -> Option<&PipelineRecord> {
        self.detail.as_ref().and_then(|id| self.record(id))
    }

    pub fn dragged(&self) -> Option<&RecordId> {
        self.board.drag_session().map(|session| session.record_id())
    }

    // ------------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------------

    pub fn handle_action(&mut self, action: Action) -> (Control, Option<PendingCommit>) {
        match action {
            Action::Quit => return (Control::Quit, None),
            Action::OpenHelp => self.help_visible = !self.help_visible,
            Action::Cancel => {
                if self.board.gesture_active() {
                    self.board.cancel();
                } else if self.help_visible {
                    self.help_visible = false;
                } else {
                    self.detail = None;
                }
            }
            Action::Repair => return (Control::Continue, self.begin_repair()),
        }
        (Control::Continue, None)
    }

    /// Feed one mouse event into the board. A completed drop comes back as a
    /// batch for the caller to run.
    pub fn handle_mouse(&mut self, event: MouseEvent) -> Option<PendingCommit> {
        let (x, y) = (event.column, event.row);
        let at = Point::new(f32::from(x), f32::from(y));
        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(id) = self.layout.card_at(&self.display, x, y) {
                    self.board.pointer_down(&id, at);
                }
                None
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                let hover = self.layout.slot_at(x, y);
                if self.board.pointer_move(at, hover) {
                    self.display = self.board.display_index();
                }
                None
            }
            MouseEventKind::Up(MouseButton::Left) => {
                let hover = self.layout.slot_at(x, y);
                match self.board.pointer_up(hover) {
                    PointerOutcome::Click(id) => {
                        self.detail = Some(id);
                        None
                    }
                    PointerOutcome::Dropped(intent) => self.begin_drop(&intent),
                    PointerOutcome::Cancelled | PointerOutcome::Ignored => None,
                }
            }
            _ => None,
        }
    }

    // ------------------------------------------------------------------------
    // Commits
    // ------------------------------------------------------------------------

    pub fn begin_drop(&mut self, intent: &DropIntent) -> Option<PendingCommit> {
        match self.board.begin_drop(intent) {
            Ok(Some(pending)) => {
                self.commits_in_flight += 1;
                self.display = self.board.display_index();
                Some(pending)
            }
            Ok(None) => None,
            Err(e) => {
                self.notify(NotificationLevel::Error, e.to_string());
                None
            }
        }
    }

    fn begin_repair(&mut self) -> Option<PendingCommit> {
        match self.board.begin_repair() {
            Ok(Some(pending)) => {
                self.commits_in_flight += 1;
                self.notify(
                    NotificationLevel::Info,
                    format!("Repairing {} positions", pending.plan().writes().len()),
                );
                Some(pending)
            }
            Ok(None) => {
                self.notify(NotificationLevel::Info, "Board already in order");
                None
            }
            Err(e) => {
                self.notify(NotificationLevel::Error, e.to_string());
                None
            }
        }
    }

    pub fn finish_commit(&mut self, outcome: CommitOutcome) {
        self.commits_in_flight = self.commits_in_flight.saturating_sub(1);
        match self.board.finish_commit(outcome) {
            Ok(report) => {
                if let Some(transition) = &report.transition {
                    self.notify(
                        NotificationLevel::Success,
                        format!(
                            "Moved {} to {}",
                            transition.record_id,
                            transition.to.label()
                        ),
                    );
                }
            }
            Err(e) => {
                // the user sees this through BoardNotice::CommitFailed
                tracing::warn!(error = %e, "Board change rejected");
            }
        }
        self.display = self.board.display_index();
    }

    pub fn handle_notice(&mut self, notice: BoardNotice) {
        match notice {
            BoardNotice::CommitFailed(reason) => self.notify(
                NotificationLevel::Error,
                format!("Move failed, board restored: {}", reason),
            ),
            BoardNotice::NotificationFailed { record_id, reason } => self.notify(
                NotificationLevel::Warning,
                format!("Moved {} but notification failed: {}", record_id, reason),
            ),
        }
    }
}
