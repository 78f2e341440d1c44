//! Sorted cell→feature coverage index.
//!
//! Maps nested sky-cell indices (at the database's coverage order) to the
//! features whose footprints intersect them. Entries are sorted by
//! `(cell, feature)`, so tile serving is a binary-searched range scan
//! instead of a geometric test per feature.

use serde::{Deserialize, Serialize};

/// One entry in the coverage index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellEntry {
    /// Nested cell index at the coverage order.
    pub cell: u64,

    /// Feature id (position in the database's feature vector).
    pub feature: u32,
}

/// The immutable coverage index: entries sorted by `(cell, feature)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoverageIndex {
    entries: Vec<CellEntry>,
}

impl CoverageIndex {
    /// Build from unsorted entries. Sorts and deduplicates.
    pub fn from_entries(mut entries: Vec<CellEntry>) -> Self {
        entries.sort_unstable();
        entries.dedup();
        Self { entries }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in index order.
    pub fn entries(&self) -> &[CellEntry] {
        &self.entries
    }

    /// Feature ids for cells in `[min_cell, max_cell]`, ascending and
    /// deduplicated (a footprint covering several cells in the range still
    /// appears once).
    pub fn features_in_range(&self, min_cell: u64, max_cell: u64) -> Vec<u32> {
        let start = self
            .entries
            .partition_point(|e| e.cell < min_cell);
        let mut ids: Vec<u32> = self.entries[start..]
            .iter()
            .take_while(|e| e.cell <= max_cell)
            .map(|e| e.feature)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Feature ids for one exact cell.
    pub fn features_in_cell(&self, cell: u64) -> Vec<u32> {
        self.features_in_range(cell, cell)
    }
}
