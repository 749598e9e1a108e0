//! Error types for SLUICE operations

use crate::RecordId;
use thiserror::Error;

/// Persistence layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Batch rejected: {reason}")]
    BatchRejected { reason: String },

    #[error("Unknown document: {id}")]
    UnknownDocument { id: RecordId },

    #[error("Transport failure: {reason}")]
    Transport { reason: String },

    #[error("Decode failure: {reason}")]
    Decode { reason: String },

    #[error("Subscription closed")]
    SubscriptionClosed,

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Outbound status-change notification errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Notification transport failed: {reason}")]
    Transport { reason: String },

    #[error("Notification rejected with status {status}")]
    Rejected { status: u16 },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Master error type for all SLUICE errors.
#[derive(Debug, Clone, Error)]
pub enum SluiceError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Notify error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for SLUICE operations.
pub type SluiceResult<T> = Result<T, SluiceError>;

// =============================================================================
// TESTS
// =============================================================================
