//! Error types for the TUI.

use crate::config::ConfigError;
use sluice_board::BoardError;
use sluice_core::SluiceError;

#[derive(Debug, thiserror::Error)]
pub enum TuiError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    Store(#[from] SluiceError),
    #[error("Failed to read seed documents: {0}")]
    Seed(#[from] serde_json::Error),
    #[error("Failed to initialise logging: {0}")]
    Logging(String),
}
