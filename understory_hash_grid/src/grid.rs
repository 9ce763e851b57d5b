// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The spatial hash grid: per-cell buckets of z indices kept in paint order.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use kurbo::Rect;

use crate::error::GridError;
use crate::layout::{CellLayout, CellRange};

/// Sentinel stored in the lookup table for z indices that were never added.
const UNSET: u32 = u32::MAX;

/// Uniform screen-space grid over paint-ordered entries.
///
/// Every entry is identified by its original z index (the order it was first added in). The
/// grid keeps a lookup table mapping each z to its current position in the paint sequence, and
/// each cell stores the z indices of the entries overlapping it sorted ascending by that
/// position. Positions may be remapped with [`SpatialHashGrid2D::set_position`] and new entries
/// spliced into the sequence with [`SpatialHashGrid2D::try_insert_after_pos`].
pub struct SpatialHashGrid2D {
    layout: CellLayout,
    cells: Vec<Vec<u32>>,
    lookup: Vec<u32>,
}

impl fmt::Debug for SpatialHashGrid2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpatialHashGrid2D")
            .field("layout", &self.layout)
            .field("entries", &self.lookup.len())
            .finish_non_exhaustive()
    }
}

impl SpatialHashGrid2D {
    /// Create an empty grid with the given layout.
    pub fn new(layout: CellLayout) -> Self {
        Self {
            layout,
            cells: vec![Vec::new(); layout.cell_count()],
            lookup: Vec::new(),
        }
    }

    /// Create an empty grid sized for a window; see [`CellLayout::for_window`].
    pub fn for_window(
        width_px: u32,
        height_px: u32,
        desired_cells_x: u32,
        desired_cells_y: u32,
    ) -> Result<Self, GridError> {
        CellLayout::for_window(width_px, height_px, desired_cells_x, desired_cells_y).map(Self::new)
    }

    /// The cell geometry.
    pub fn layout(&self) -> &CellLayout {
        &self.layout
    }

    /// Replace the cell geometry. All entries are dropped.
    pub fn set_layout(&mut self, layout: CellLayout) {
        self.layout = layout;
        self.cells.resize_with(layout.cell_count(), Vec::new);
        self.clear();
    }

    /// Remove every entry, keeping allocations.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
        self.lookup.clear();
    }

    /// Number of z indices the lookup table covers.
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    /// Whether the grid holds no entries.
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// Current paint position of `z`, or `None` if `z` was never added.
    #[inline]
    pub fn position(&self, z: u32) -> Option<u32> {
        self.lookup.get(z as usize).copied().filter(|&p| p != UNSET)
    }

    /// Remap `z` to paint position `pos`.
    ///
    /// Callers moving entries must keep every cell sorted by position; shifting a contiguous
    /// run of positions up by one before [`try_insert_after_pos`](Self::try_insert_after_pos)
    /// does.
    #[inline]
    pub fn set_position(&mut self, z: u32, pos: u32) {
        let slot = self.lookup_slot(z);
        *slot = pos;
    }

    /// Append `z` at paint position `z` into every cell `rect` overlaps.
    ///
    /// Returns `false` (and leaves the cells untouched) when `rect` lies fully outside the
    /// grid. The position is recorded either way.
    pub fn try_add(&mut self, rect: Rect, z: u32) -> bool {
        debug_assert!(
            self.position(z).is_none(),
            "z index {z} was already added"
        );
        self.set_position(z, z);
        match self.layout.cell_range(rect) {
            Some(range) => {
                self.push_into(range, z);
                true
            }
            None => false,
        }
    }

    /// Append `z` at paint position `z`, mapping rectangles outside the grid onto the border
    /// cells instead of rejecting them.
    pub fn add_clamped(&mut self, rect: Rect, z: u32) {
        debug_assert!(
            self.position(z).is_none(),
            "z index {z} was already added"
        );
        self.set_position(z, z);
        let range = self.layout.clamped_cell_range(rect);
        self.push_into(range, z);
    }

    /// Record `z` at paint position `after_pos + 1` and insert it into every cell `rect`
    /// overlaps, right after the last entry whose position is at most `after_pos`.
    ///
    /// Entries previously at positions above `after_pos` must already have been moved up by
    /// one. Returns `false` when `rect` lies fully outside the grid; the position is still
    /// recorded.
    pub fn try_insert_after_pos(&mut self, after_pos: u32, rect: Rect, z: u32) -> bool {
        self.set_position(z, after_pos + 1);
        let Some(range) = self.layout.cell_range(rect) else {
            return false;
        };
        for (x, y) in range.cells() {
            let idx = self.layout.cell_index(x, y);
            let cell = &mut self.cells[idx];
            let lookup = &self.lookup;
            // Entries sit in ascending position order: search back from the tail, which is
            // where recent splices land.
            let at = cell
                .iter()
                .rposition(|&other| other != z && lookup[other as usize] <= after_pos)
                .map_or(0, |i| i + 1);
            cell.insert(at, z);
        }
        true
    }

    /// Entries in the cells overlapping `rect` whose position is strictly greater than
    /// `after_pos`, visited from the most recent position down, cell by cell.
    ///
    /// An entry spanning several cells is yielded once per cell. Rectangles outside the grid are
    /// clamped onto the border cells.
    pub fn query_after(&self, rect: Rect, after_pos: u32) -> impl Iterator<Item = u32> + '_ {
        let range = self.layout.clamped_cell_range(rect);
        range.cells().flat_map(move |(x, y)| {
            let idx = self.layout.cell_index(x, y);
            self.cells[idx]
                .iter()
                .rev()
                .take_while(move |&&z| self.lookup[z as usize] > after_pos)
                .copied()
        })
    }

    /// Entries of one cell, ascending by paint position.
    pub fn cell_entries(&self, x: u32, y: u32) -> Option<&[u32]> {
        if x >= self.layout.cell_count_x() || y >= self.layout.cell_count_y() {
            return None;
        }
        Some(&self.cells[self.layout.cell_index(x, y)])
    }

    /// Whether every cell is sorted by paint position. Used by debug assertions and tests.
    pub fn cells_are_ordered(&self) -> bool {
        self.cells.iter().all(|cell| {
            cell.windows(2)
                .all(|w| self.lookup[w[0] as usize] < self.lookup[w[1] as usize])
        })
    }

    fn lookup_slot(&mut self, z: u32) -> &mut u32 {
        let idx = z as usize;
        if self.lookup.len() <= idx {
            self.lookup.resize(idx + 1, UNSET);
        }
        &mut self.lookup[idx]
    }

    fn push_into(&mut self, range: CellRange, z: u32) {
        for (x, y) in range.cells() {
            let idx = self.layout.cell_index(x, y);
            let cell = &mut self.cells[idx];
            debug_assert!(
                cell.last()
                    .is_none_or(|&last| self.lookup[last as usize] < self.lookup[z as usize]),
                "appended entries must come last in paint order"
            );
            cell.push(z);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn grid() -> SpatialHashGrid2D {
        // 4x4 cells of 16px.
        SpatialHashGrid2D::new(CellLayout::new(4, 4, 4, 4).unwrap())
    }

    #[test]
    fn add_places_entry_in_covered_cells() {
        let mut g = grid();
        assert!(g.try_add(Rect::new(0.0, 0.0, 20.0, 10.0), 0));
        assert_eq!(g.cell_entries(0, 0), Some(&[0_u32][..]));
        assert_eq!(g.cell_entries(1, 0), Some(&[0_u32][..]));
        assert_eq!(g.cell_entries(0, 1), Some(&[][..]));
        assert_eq!(g.position(0), Some(0));
        assert!(g.cell_entries(4, 0).is_none());
    }

    #[test]
    fn outside_rect_is_rejected_but_position_recorded() {
        let mut g = grid();
        assert!(!g.try_add(Rect::new(100.0, 100.0, 120.0, 120.0), 0));
        assert_eq!(g.position(0), Some(0));
        assert!((0..4).all(|y| (0..4).all(|x| g.cell_entries(x, y).unwrap().is_empty())));
        g.add_clamped(Rect::new(100.0, 100.0, 120.0, 120.0), 1);
        assert_eq!(g.cell_entries(3, 3), Some(&[1_u32][..]));
    }

    #[test]
    fn insert_after_keeps_cells_sorted() {
        let mut g = grid();
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        g.try_add(r, 0);
        g.try_add(r, 1);
        g.try_add(r, 2);
        // Splice z = 3 right after position 0: existing positions 1 and 2 move up.
        g.set_position(1, 2);
        g.set_position(2, 3);
        assert!(g.try_insert_after_pos(0, r, 3));
        assert_eq!(g.position(3), Some(1));
        assert_eq!(g.cell_entries(0, 0), Some(&[0_u32, 3, 1, 2][..]));
        assert!(g.cells_are_ordered());
    }

    #[test]
    fn insert_after_into_empty_cell() {
        let mut g = grid();
        g.try_add(Rect::new(0.0, 0.0, 10.0, 10.0), 0);
        g.try_add(Rect::new(40.0, 40.0, 50.0, 50.0), 1);
        g.set_position(1, 2);
        assert!(g.try_insert_after_pos(0, Rect::new(20.0, 20.0, 30.0, 30.0), 2));
        assert_eq!(g.cell_entries(1, 1), Some(&[2_u32][..]));
        assert_eq!(g.position(2), Some(1));
        assert!(g.cells_are_ordered());
    }

    #[test]
    fn query_after_stops_at_position() {
        let mut g = grid();
        let r = Rect::new(0.0, 0.0, 30.0, 10.0);
        for z in 0..5 {
            g.try_add(r, z);
        }
        let hits: Vec<_> = g.query_after(Rect::new(0.0, 0.0, 5.0, 5.0), 2).collect();
        assert_eq!(hits, [4, 3]);
        assert_eq!(g.query_after(Rect::new(0.0, 0.0, 5.0, 5.0), 4).count(), 0);
        // Two cells covered: each yields its own candidates.
        assert_eq!(g.query_after(r, 3).count(), 2);
    }

    #[test]
    fn clear_and_relayout() {
        let mut g = grid();
        g.try_add(Rect::new(0.0, 0.0, 10.0, 10.0), 0);
        g.clear();
        assert!(g.is_empty());
        assert_eq!(g.position(0), None);
        g.set_layout(CellLayout::new(2, 2, 5, 5).unwrap());
        assert_eq!(g.layout().cell_count(), 4);
        assert!(g.try_add(Rect::new(40.0, 40.0, 50.0, 50.0), 0));
        assert_eq!(g.cell_entries(1, 1), Some(&[0_u32][..]));
    }

    #[test]
    fn for_window_propagates_errors() {
        assert!(SpatialHashGrid2D::for_window(640, 480, 0, 4).is_err());
        // 640 / 8 = 80 -> 128px cells, 480 / 8 = 60 -> 64px cells.
        let g = SpatialHashGrid2D::for_window(640, 480, 8, 8).unwrap();
        assert_eq!(g.layout().cell_count_x(), 5);
        assert_eq!(g.layout().cell_count_y(), 8);
    }
}
