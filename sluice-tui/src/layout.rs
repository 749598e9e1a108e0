//! Screen geometry and hit-testing.
//!
//! The renderer and the mouse handler share one [`BoardLayout`] so a cell
//! under the pointer always maps to the card drawn there.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use sluice_core::{ColumnIndex, RecordId, Slot, Stage};

/// Rows per card, borders included.
pub const CARD_HEIGHT: u16 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardLayout {
    pub header: Rect,
    pub body: Rect,
    pub footer: Rect,
    columns: Vec<(Stage, Rect)>,
}

impl Default for BoardLayout {
    fn default() -> Self {
        Self::new(Rect::default())
    }
}

impl BoardLayout {
    /// Header, one equal-width column per stage, footer.
    pub fn new(area: Rect) -> Self {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ])
            .split(area);

        let count = Stage::ALL.len() as u32;
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(Stage::ALL.iter().map(|_| Constraint::Ratio(1, count)))
            .split(rows[1]);
        let columns = Stage::ALL.iter().copied().zip(chunks.iter().copied()).collect();

        Self {
            header: rows[0],
            body: rows[1],
            footer: rows[2],
            columns,
        }
    }

    pub fn columns(&self) -> &[(Stage, Rect)] {
        &self.columns
    }

    pub fn column_area(&self, stage: Stage) -> Option<Rect> {
        self.columns
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, rect)| *rect)
    }

    /// Area of the card at `position`, if it fits on screen.
    pub fn card_area(&self, stage: Stage, position: usize) -> Option<Rect> {
        let inner = inner(self.column_area(stage)?);
        let offset = u16::try_from(position).ok()?.checked_mul(CARD_HEIGHT)?;
        if offset.checked_add(CARD_HEIGHT)? > inner.height {
            return None;
        }
        Some(Rect::new(inner.x, inner.y + offset, inner.width, CARD_HEIGHT))
    }

    pub fn stage_at(&self, x: u16, y: u16) -> Option<Stage> {
        self.columns
            .iter()
            .find(|(_, rect)| contains(*rect, x, y))
            .map(|(stage, _)| *stage)
    }

    /// Drop slot under a cell. The position may overshoot the column; the
    /// drag controller clamps it.
    pub fn slot_at(&self, x: u16, y: u16) -> Option<Slot> {
        let stage = self.stage_at(x, y)?;
        let inner = inner(self.column_area(stage)?);
        let row = y.saturating_sub(inner.y);
        Some(Slot::new(stage, usize::from(row / CARD_HEIGHT)))
    }

    /// Record whose card is drawn under a cell.
    pub fn card_at(&self, index: &ColumnIndex, x: u16, y: u16) -> Option<RecordId> {
        let stage = self.stage_at(x, y)?;
        let inner = inner(self.column_area(stage)?);
        if !contains(inner, x, y) {
            return None;
        }
        let position = usize::from((y - inner.y) / CARD_HEIGHT);
        self.card_area(stage, position)?;
        index.column(stage).get(position).cloned()
    }
}

fn inner(rect: Rect) -> Rect {
    Rect::new(
        rect.x.saturating_add(1),
        rect.y.saturating_add(1),
        rect.width.saturating_sub(2),
        rect.height.saturating_sub(2),
    )
}

fn contains(rect: Rect, x: u16, y: u16) -> bool {
    x >= rect.x && x < rect.right() && y >= rect.y && y < rect.bottom()
}
