//! SLUICE Core - Pipeline Types
//!
//! Data structures and pure functions shared by every sluice crate.
//! Nothing in here performs I/O: records are normalized, ordered and
//! diffed in memory, and the storage and board crates decide when.

pub mod column;
pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;
pub mod normalize;

pub use column::{BoardSnapshot, ColumnIndex, Slot};
pub use entities::{
    DisplayFields, PipelineRecord, RawDocument, RecordPatch, RecordWrite, StageTransition,
};
pub use enums::{Stage, StageParseError, StageStyle};
pub use error::{ConfigError, NotifyError, SluiceError, SluiceResult, StorageError};
pub use identity::{CollectionId, RecordId, Revision, Timestamp};
pub use normalize::{normalize, normalize_all};
