//! Record normalization.
//!
//! Historical documents use several field layouts. Each document is first
//! classified into a [`RecordShape`] and then decoded from that shape into a
//! [`PipelineRecord`]. Stage and position are resolved independently: the
//! canonical `stage` and `position` keys win whenever present, and legacy keys
//! only fill in what is missing. Decoding never fails: anything missing or
//! malformed falls back to defaults (first stage, position 0) and is logged at
//! debug level.

use crate::entities::fields;
use crate::{DisplayFields, PipelineRecord, RawDocument, RecordId, Stage, Timestamp};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;

const LEGACY_STAGE_KEYS: &[&str] = &["status", "pipelineStatus"];
const LEGACY_POSITION_KEYS: &[&str] = &["order", "sortOrder"];
/// Canonical key first. Position-only writes land in `position`, so it must
/// shadow the legacy keys in every shape.
const POSITION_KEYS: &[&str] = &[fields::POSITION, "order", "sortOrder"];
const BUSINESS_NAME_KEYS: &[&str] = &[fields::BUSINESS_NAME, "dbaName", "merchantName", "name"];
const CONTACT_NAME_KEYS: &[&str] = &[fields::CONTACT_NAME, "ownerName"];
const EMAIL_KEYS: &[&str] = &[fields::EMAIL, "contactEmail"];

/// Field layout a raw document was written with.
#[derive(Debug, Clone, Copy, PartialEq)]
enum RecordShape<'a> {
    /// Current layout: `stage` + `position`.
    Canonical {
        stage: &'a Value,
        position: Option<&'a Value>,
    },
    /// Older layout: `status`/`pipelineStatus` + `order`/`sortOrder`, possibly
    /// partly overwritten by canonical `position` writes.
    Legacy {
        stage: Option<&'a Value>,
        position: Option<&'a Value>,
    },
    /// No stage information at all.
    Bare { position: Option<&'a Value> },
}

impl<'a> RecordShape<'a> {
    fn classify(map: &'a Map<String, Value>) -> Self {
        let position = first_present(map, POSITION_KEYS);
        if let Some(stage) = map.get(fields::STAGE) {
            return RecordShape::Canonical { stage, position };
        }

        let legacy_stage = first_present(map, LEGACY_STAGE_KEYS);
        if legacy_stage.is_some() || first_present(map, LEGACY_POSITION_KEYS).is_some() {
            return RecordShape::Legacy {
                stage: legacy_stage,
                position,
            };
        }

        RecordShape::Bare { position }
    }

    fn name(&self) -> &'static str {
        match self {
            RecordShape::Canonical { .. } => "canonical",
            RecordShape::Legacy { .. } => "legacy",
            RecordShape::Bare { .. } => "bare",
        }
    }
}

/// Normalize one raw document into a pipeline record.
pub fn normalize(doc: &RawDocument) -> PipelineRecord {
    let shape = RecordShape::classify(&doc.fields);
    let (stage_value, position_value) = match shape {
        RecordShape::Canonical { stage, position } => (Some(stage), position),
        RecordShape::Legacy { stage, position } => (stage, position),
        RecordShape::Bare { position } => (None, position),
    };

    PipelineRecord {
        id: doc.id.clone(),
        stage: resolve_stage(&doc.id, shape.name(), stage_value),
        position: resolve_position(&doc.id, position_value),
        display: resolve_display(&doc.fields),
        updated_at: doc.fields.get(fields::UPDATED_AT).and_then(resolve_timestamp),
    }
}

/// Normalize a full document set. A repeated id keeps its last occurrence.
pub fn normalize_all(docs: &[RawDocument]) -> Vec<PipelineRecord> {
    let mut order: Vec<RecordId> = Vec::with_capacity(docs.len());
    let mut by_id: HashMap<RecordId, PipelineRecord> = HashMap::with_capacity(docs.len());
    for doc in docs {
        let record = normalize(doc);
        if by_id.insert(record.id.clone(), record).is_some() {
            tracing::debug!(record_id = %doc.id, "Duplicate document id, keeping last");
        } else {
            order.push(doc.id.clone());
        }
    }
    order
        .into_iter()
        .filter_map(|id| by_id.remove(&id))
        .collect()
}

fn first_present<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| map.get(*key))
}

fn resolve_stage(id: &RecordId, shape: &'static str, value: Option<&Value>) -> Stage {
    let Some(value) = value else {
        tracing::debug!(record_id = %id, shape, "Missing stage, defaulting to first stage");
        return Stage::first();
    };
    match value.as_str().map(Stage::from_db_str) {
        Some(Ok(stage)) => stage,
        _ => {
            tracing::debug!(
                record_id = %id,
                shape,
                raw_stage = %value,
                "Unrecognized stage, defaulting to first stage"
            );
            Stage::first()
        }
    }
}

fn resolve_position(id: &RecordId, value: Option<&Value>) -> u32 {
    let Some(value) = value else {
        return 0;
    };
    let parsed = match value {
        Value::Number(n) => n
            .as_u64()
            .map(clamp_u64)
            .or_else(|| n.as_i64().map(|_| 0))
            .or_else(|| n.as_f64().map(clamp_f64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(clamp_f64),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        tracing::debug!(record_id = %id, raw_position = %value, "Invalid position, defaulting to 0");
        0
    })
}

fn clamp_u64(n: u64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn clamp_f64(f: f64) -> u32 {
    if !f.is_finite() || f <= 0.0 {
        0
    } else if f >= u32::MAX as f64 {
        u32::MAX
    } else {
        f.floor() as u32
    }
}

fn resolve_display(map: &Map<String, Value>) -> DisplayFields {
    DisplayFields {
        business_name: first_text(map, BUSINESS_NAME_KEYS),
        contact_name: first_text(map, CONTACT_NAME_KEYS),
        contact_email: first_text(map, EMAIL_KEYS),
    }
}

fn first_text(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| map.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn resolve_timestamp(value: &Value) -> Option<Timestamp> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

// ============================================================================
// TESTS
// ============================================================================


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn arb_stage() -> impl Strategy<Value = Stage> {
        prop::sample::select(Stage::ALL.to_vec())
    }

    fn arb_raw_stage() -> impl Strategy<Value = Value> {
        prop_oneof![
            arb_stage().prop_map(|s| Value::from(s.as_db_str())),
            "[A-Za-z]{0,12}".prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            Just(Value::Null),
        ]
    }

    fn arb_raw_position() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<u32>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            (-1.0e6f64..1.0e6).prop_map(Value::from),
            "[0-9]{0,4}".prop_map(Value::from),
            Just(Value::Null),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Normalizing the canonical document of a normalized record is a no-op.
        #[test]
        fn prop_normalize_idempotent(
            stage in arb_raw_stage(),
            position in arb_raw_position(),
            legacy in any::<bool>(),
            name in proptest::option::of("[a-zA-Z ]{0,20}"),
        ) {
            let (stage_key, position_key) = if legacy { ("status", "order") } else { ("stage", "position") };
            let mut value = json!({ stage_key: stage, position_key: position });
            if let Some(name) = name {
                value["dbaName"] = Value::from(name);
            }
            let first = normalize(&RawDocument::from_value("id", value));
            let second = normalize(&first.to_document());
            prop_assert_eq!(first, second);
        }

        /// Every document normalizes to a member of the stage enumeration.
        #[test]
        fn prop_stage_always_valid(stage in arb_raw_stage()) {
            let record = normalize(&RawDocument::from_value("id", json!({ "stage": stage.clone() })));
            let expected = stage
                .as_str()
                .and_then(|s| Stage::from_db_str(s).ok())
                .unwrap_or(Stage::first());
            prop_assert_eq!(record.stage, expected);
        }
    }
}
