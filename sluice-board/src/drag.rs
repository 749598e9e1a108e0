//! Drag session controller.
//!
//! Tracks one pointer gesture over the board:
//!
//! ```text
//! Idle --down--> Pressed --move past threshold--> Dragging
//!   ^              |                                 |
//!   |              +--up: Click                      +--up over slot: Dropped
//!   |                                                +--up elsewhere / cancel: Cancelled
//!   +------------------------------------------------+
//! ```
//!
//! While dragging, the controller keeps a shadow index for rendering only.
//! The shadow is derived from the index the board hands in and is never
//! written back.

use serde::{Deserialize, Serialize};
use sluice_core::{ColumnIndex, ConfigError, RecordId, Slot};

/// Default pointer travel before a press turns into a drag.
pub const DEFAULT_ACTIVATION_DISTANCE: f32 = 5.0;

fn default_activation_distance() -> f32 {
    DEFAULT_ACTIVATION_DISTANCE
}

/// Pointer position in host coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DragConfig {
    /// Minimum travel, in host units, that separates a drag from a click.
    #[serde(default = "default_activation_distance")]
    pub activation_distance: f32,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            activation_distance: DEFAULT_ACTIVATION_DISTANCE,
        }
    }
}

impl DragConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.activation_distance.is_finite() || self.activation_distance <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "drag.activation_distance".to_string(),
                reason: "must be a finite number > 0".to_string(),
            });
        }
        Ok(())
    }
}

/// An in-progress drag.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    record_id: RecordId,
    source: Slot,
    hover: Option<Slot>,
    origin: Point,
    pointer: Point,
    shadow: ColumnIndex,
}

impl DragSession {
    pub fn record_id(&self) -> &RecordId {
        &self.record_id
    }

    pub fn source(&self) -> Slot {
        self.source
    }

    /// Slot under the pointer, already clamped to the hovered column.
    pub fn hover(&self) -> Option<Slot> {
        self.hover
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn pointer(&self) -> Point {
        self.pointer
    }

    pub fn shadow(&self) -> &ColumnIndex {
        &self.shadow
    }
}

/// The tuple handed to the reconciler on a successful drop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropIntent {
    pub record_id: RecordId,
    pub source: Slot,
    pub dest: Slot,
}

impl DropIntent {
    pub fn new(record_id: impl Into<RecordId>, source: Slot, dest: Slot) -> Self {
        Self {
            record_id: record_id.into(),
            source,
            dest,
        }
    }

    /// Dropped back where it started.
    pub fn is_noop(&self) -> bool {
        self.source == self.dest
    }
}

/// Result of a pointer release or cancel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerOutcome {
    /// No gesture was in progress.
    Ignored,
    /// Released inside the activation distance; a navigation action.
    Click(RecordId),
    Dropped(DropIntent),
    Cancelled,
}

/// Coarse controller phase, mostly for hosts and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DragPhase {
    #[default]
    Idle,
    Pressed,
    Dragging,
}

#[derive(Debug, Clone, PartialEq, Default)]
enum DragState {
    #[default]
    Idle,
    Pressed {
        record_id: RecordId,
        origin: Point,
        source: Slot,
    },
    Dragging(DragSession),
}

/// Drag finite-state machine. One per board, owned by value.
#[derive(Debug, Clone, Default)]
pub struct DragController {
    config: DragConfig,
    state: DragState,
}

impl DragController {
    pub fn new(config: DragConfig) -> Self {
        Self {
            config,
            state: DragState::Idle,
        }
    }

    pub fn config(&self) -> &DragConfig {
        &self.config
    }

    pub fn phase(&self) -> DragPhase {
        match self.state {
            DragState::Idle => DragPhase::Idle,
            DragState::Pressed { .. } => DragPhase::Pressed,
            DragState::Dragging(_) => DragPhase::Dragging,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    pub fn session(&self) -> Option<&DragSession> {
        match &self.state {
            DragState::Dragging(session) => Some(session),
            _ => None,
        }
    }

    /// Shadow index to render while dragging.
    pub fn shadow(&self) -> Option<&ColumnIndex> {
        self.session().map(DragSession::shadow)
    }

    /// Engage a record. Returns false if a gesture is already running or the
    /// record is not on `index`.
    pub fn pointer_down(&mut self, index: &ColumnIndex, record_id: &RecordId, at: Point) -> bool {
        if !matches!(self.state, DragState::Idle) {
            return false;
        }
        let Some(source) = index.locate(record_id) else {
            tracing::debug!(record_id = %record_id, "Pointer down on record missing from index");
            return false;
        };
        self.state = DragState::Pressed {
            record_id: record_id.clone(),
            origin: at,
            source,
        };
        true
    }

    /// Track pointer travel. Returns true when the shadow changed.
    ///
    /// `index` is the board's working index at call time; the shadow is
    /// always recomputed from it rather than from the previous shadow.
    pub fn pointer_move(&mut self, index: &ColumnIndex, at: Point, hover: Option<Slot>) -> bool {
        match std::mem::take(&mut self.state) {
            DragState::Idle => false,
            DragState::Pressed {
                record_id,
                origin,
                source,
            } => {
                if origin.distance_to(at) < self.config.activation_distance {
                    self.state = DragState::Pressed {
                        record_id,
                        origin,
                        source,
                    };
                    return false;
                }
                if !index.contains(&record_id) {
                    return false;
                }
                let hover = clamp_hover(index, &record_id, hover);
                let shadow = preview(index, &record_id, hover);
                tracing::trace!(record_id = %record_id, "Drag activated");
                self.state = DragState::Dragging(DragSession {
                    record_id,
                    source,
                    hover,
                    origin,
                    pointer: at,
                    shadow,
                });
                true
            }
            DragState::Dragging(mut session) => {
                if !index.contains(&session.record_id) {
                    // Removed by another client mid-drag.
                    tracing::debug!(record_id = %session.record_id, "Dragged record vanished, dropping session");
                    return true;
                }
                session.pointer = at;
                let hover = clamp_hover(index, &session.record_id, hover);
                let changed = hover != session.hover;
                if changed {
                    session.hover = hover;
                    session.shadow = preview(index, &session.record_id, hover);
                }
                self.state = DragState::Dragging(session);
                changed
            }
        }
    }

    /// Release the pointer over `hover`.
    pub fn pointer_up(&mut self, hover: Option<Slot>) -> PointerOutcome {
        match std::mem::take(&mut self.state) {
            DragState::Idle => PointerOutcome::Ignored,
            DragState::Pressed { record_id, .. } => PointerOutcome::Click(record_id),
            DragState::Dragging(session) => {
                match clamp_hover(&session.shadow, &session.record_id, hover) {
                    Some(dest) => PointerOutcome::Dropped(DropIntent {
                        record_id: session.record_id,
                        source: session.source,
                        dest,
                    }),
                    None => PointerOutcome::Cancelled,
                }
            }
        }
    }

    /// Abort whatever gesture is in progress.
    pub fn cancel(&mut self) -> PointerOutcome {
        match std::mem::take(&mut self.state) {
            DragState::Idle => PointerOutcome::Ignored,
            DragState::Pressed { .. } | DragState::Dragging(_) => PointerOutcome::Cancelled,
        }
    }
}

fn clamp_hover(index: &ColumnIndex, record_id: &RecordId, hover: Option<Slot>) -> Option<Slot> {
    hover.map(|slot| {
        let max = index.len_without(slot.stage, record_id);
        Slot::new(slot.stage, slot.position.min(max))
    })
}

fn preview(index: &ColumnIndex, record_id: &RecordId, hover: Option<Slot>) -> ColumnIndex {
    hover
        .and_then(|slot| index.with_move(record_id, slot))
        .unwrap_or_else(|| index.clone())
}

// ============================================================================
// TESTS
// ============================================================================
