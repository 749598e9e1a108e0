//! Column index: the ordered partition of records by stage.

use crate::{normalize_all, PipelineRecord, RawDocument, RecordId, Revision, Stage};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A location on the board: a stage column and a rank inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub stage: Stage,
    pub position: usize,
}

impl Slot {
    pub fn new(stage: Stage, position: usize) -> Self {
        Self { stage, position }
    }
}

/// Ordered sequence of record ids per stage.
///
/// Every stage has a column, possibly empty. Each id appears exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnIndex {
    columns: BTreeMap<Stage, Vec<RecordId>>,
}

impl Default for ColumnIndex {
    fn default() -> Self {
        Self::empty()
    }
}

impl ColumnIndex {
    /// All columns present, all empty.
    pub fn empty() -> Self {
        Self {
            columns: Stage::ALL.iter().map(|s| (*s, Vec::new())).collect(),
        }
    }

    /// Group by stage and sort each group by `(position, id)`.
    pub fn build(records: &[PipelineRecord]) -> Self {
        let mut grouped: BTreeMap<Stage, Vec<&PipelineRecord>> =
            Stage::ALL.iter().map(|s| (*s, Vec::new())).collect();
        for record in records {
            grouped.entry(record.stage).or_default().push(record);
        }

        let columns = grouped
            .into_iter()
            .map(|(stage, mut members)| {
                members.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
                (stage, members.into_iter().map(|r| r.id.clone()).collect())
            })
            .collect();
        Self { columns }
    }

    pub fn column(&self, stage: Stage) -> &[RecordId] {
        self.columns.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Columns in pipeline order.
    pub fn iter(&self) -> impl Iterator<Item = (Stage, &[RecordId])> {
        self.columns.iter().map(|(stage, ids)| (*stage, ids.as_slice()))
    }

    /// Concatenation of all columns in pipeline order.
    pub fn ids(&self) -> impl Iterator<Item = &RecordId> {
        self.columns.values().flatten()
    }

    pub fn locate(&self, id: &RecordId) -> Option<Slot> {
        self.columns.iter().find_map(|(stage, ids)| {
            ids.iter()
                .position(|candidate| candidate == id)
                .map(|position| Slot::new(*stage, position))
        })
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.locate(id).is_some()
    }

    /// Total number of records across all columns.
    pub fn len(&self) -> usize {
        self.columns.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length a column would have once `moving` is taken out of it.
    pub fn len_without(&self, stage: Stage, moving: &RecordId) -> usize {
        let column = self.column(stage);
        column.len() - usize::from(column.contains(moving))
    }

    /// Copy of this index with `id` moved to `target`.
    ///
    /// `target.position` is read in post-removal coordinates and clamped to
    /// the destination column's length. Returns `None` if `id` is unknown.
    pub fn with_move(&self, id: &RecordId, target: Slot) -> Option<ColumnIndex> {
        let source = self.locate(id)?;
        let mut next = self.clone();
        if let Some(column) = next.columns.get_mut(&source.stage) {
            column.remove(source.position);
        }
        let column = next.columns.entry(target.stage).or_default();
        let position = target.position.min(column.len());
        column.insert(position, id.clone());
        Some(next)
    }
}

/// Server-confirmed board state: normalized records plus their column index.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardSnapshot {
    pub revision: Revision,
    pub records: HashMap<RecordId, PipelineRecord>,
    pub index: ColumnIndex,
}

impl Default for BoardSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoardSnapshot {
    pub fn empty() -> Self {
        Self {
            revision: Revision::ZERO,
            records: HashMap::new(),
            index: ColumnIndex::empty(),
        }
    }

    pub fn from_records(revision: Revision, records: Vec<PipelineRecord>) -> Self {
        let index = ColumnIndex::build(&records);
        let records = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self {
            revision,
            records,
            index,
        }
    }

    /// Normalize a pushed document set and rebuild the index from scratch.
    pub fn from_documents(revision: Revision, docs: &[RawDocument]) -> Self {
        Self::from_records(revision, normalize_all(docs))
    }

    pub fn record(&self, id: &RecordId) -> Option<&PipelineRecord> {
        self.records.get(id)
    }
}

// ============================================================================
// TESTS
// ============================================================================


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
