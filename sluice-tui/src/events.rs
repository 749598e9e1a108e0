//! Event types for the TUI event loop.

use crossterm::event::{KeyEvent, MouseEvent};
use sluice_board::{BoardNotice, CommitOutcome};

#[derive(Debug)]
pub enum TuiEvent {
    Input(KeyEvent),
    Mouse(MouseEvent),
    Resize { width: u16, height: u16 },
    /// The confirmed board changed.
    BoardChanged,
    Committed(CommitOutcome),
    Notice(BoardNotice),
}
