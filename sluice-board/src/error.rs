//! Board runtime errors.

use sluice_core::{ConfigError, RecordId, SluiceError};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum BoardError {
    /// The batch write failed. Recoverable: the board reverts to the last
    /// confirmed index and the user may drag again.
    #[error("Failed to commit board change: {0}")]
    Commit(#[source] SluiceError),

    /// The dragged record is no longer part of the confirmed board.
    #[error("Record not on board: {id}")]
    UnknownRecord { id: RecordId },

    #[error("Caller may not reorder this board")]
    ReorderDenied,

    #[error("Subscription failed: {0}")]
    Subscription(#[source] SluiceError),

    #[error("Notifier setup failed: {0}")]
    Notifier(#[source] SluiceError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl BoardError {
    /// Whether the user can recover by retrying the gesture.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BoardError::Commit(_) | BoardError::UnknownRecord { .. })
    }
}

pub type BoardResult<T> = Result<T, BoardError>;
