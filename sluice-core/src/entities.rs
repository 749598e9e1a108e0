//! Record types moved through a pipeline board

use crate::{RecordId, Stage, Timestamp};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Canonical field names used when writing documents.
pub mod fields {
    pub const STAGE: &str = "stage";
    pub const POSITION: &str = "position";
    pub const BUSINESS_NAME: &str = "businessName";
    pub const CONTACT_NAME: &str = "contactName";
    pub const EMAIL: &str = "email";
    pub const UPDATED_AT: &str = "updatedAt";
}

/// A document exactly as the store returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    pub id: RecordId,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl RawDocument {
    pub fn new(id: impl Into<RecordId>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Build from a JSON object literal. Non-object values yield no fields.
    pub fn from_value(id: impl Into<RecordId>, value: Value) -> Self {
        let fields = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(id, fields)
    }
}

/// Business-identifying attributes. Read-only from the board's perspective.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayFields {
    pub business_name: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
}

/// A record tracked through the pipeline, after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRecord {
    pub id: RecordId,
    pub stage: Stage,
    /// Rank within the stage's column. Duplicates are tolerated until repair.
    pub position: u32,
    pub display: DisplayFields,
    pub updated_at: Option<Timestamp>,
}

impl PipelineRecord {
    pub fn new(id: impl Into<RecordId>, stage: Stage, position: u32) -> Self {
        Self {
            id: id.into(),
            stage,
            position,
            display: DisplayFields::default(),
            updated_at: None,
        }
    }

    pub fn with_business_name(mut self, name: impl Into<String>) -> Self {
        self.display.business_name = Some(name.into());
        self
    }

    pub fn with_contact_email(mut self, email: impl Into<String>) -> Self {
        self.display.contact_email = Some(email.into());
        self
    }

    /// Card heading: business name, then contact name, then the raw id.
    pub fn title(&self) -> &str {
        self.display
            .business_name
            .as_deref()
            .or(self.display.contact_name.as_deref())
            .unwrap_or_else(|| self.id.as_str())
    }

    /// Serialize into the canonical document shape.
    pub fn to_document(&self) -> RawDocument {
        let mut map = Map::new();
        map.insert(fields::STAGE.into(), Value::from(self.stage.as_db_str()));
        map.insert(fields::POSITION.into(), Value::from(self.position));
        if let Some(name) = &self.display.business_name {
            map.insert(fields::BUSINESS_NAME.into(), Value::from(name.as_str()));
        }
        if let Some(name) = &self.display.contact_name {
            map.insert(fields::CONTACT_NAME.into(), Value::from(name.as_str()));
        }
        if let Some(email) = &self.display.contact_email {
            map.insert(fields::EMAIL.into(), Value::from(email.as_str()));
        }
        if let Some(at) = &self.updated_at {
            map.insert(fields::UPDATED_AT.into(), Value::from(format_timestamp(at)));
        }
        RawDocument::new(self.id.clone(), map)
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: &RecordPatch) {
        if let Some(stage) = patch.stage {
            self.stage = stage;
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        self.updated_at = Some(patch.updated_at);
    }
}

/// Partial fields written for one document in a batch.
///
/// `updated_at` is not optional: every write the board performs refreshes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPatch {
    pub stage: Option<Stage>,
    pub position: Option<u32>,
    pub updated_at: Timestamp,
}

impl RecordPatch {
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(stage) = self.stage {
            map.insert(fields::STAGE.into(), Value::from(stage.as_db_str()));
        }
        if let Some(position) = self.position {
            map.insert(fields::POSITION.into(), Value::from(position));
        }
        map.insert(
            fields::UPDATED_AT.into(),
            Value::from(format_timestamp(&self.updated_at)),
        );
        map
    }
}

/// One `(documentId, partialFields)` pair of an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordWrite {
    pub id: RecordId,
    pub patch: RecordPatch,
}

/// A confirmed move of a record from one stage to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    pub record_id: RecordId,
    pub from: Stage,
    pub to: Stage,
}

pub(crate) fn format_timestamp(at: &Timestamp) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
