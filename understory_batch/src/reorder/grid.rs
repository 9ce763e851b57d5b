// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bounded backtracking with overlap candidates from a spatial hash grid.

use alloc::vec::Vec;
use core::fmt;

use kurbo::Size;
use understory_hash_grid::{CellLayout, SpatialHashGrid2D};

use super::{Reorder, ReorderStats, shift_cached_positions, to_u32};
use crate::error::ConfigError;
use crate::material::MaterialCache;
use crate::types::ProcessedCommandRecord;

/// Reorders like [`LinearReorder`](super::LinearReorder), but only tests records sharing a grid
/// cell with the candidate.
///
/// The grid is cleared and rebuilt on every pass. Its cell geometry only changes with the
/// viewport. Records entirely outside the grid are appended and never moved.
pub struct GridReorder {
    cells_x: u32,
    cells_y: u32,
    viewport_px: (u32, u32),
    grid: SpatialHashGrid2D,
    // Current position -> z index (the record's position before the pass).
    pos_to_z: Vec<u32>,
}

impl fmt::Debug for GridReorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridReorder")
            .field("cells", &(self.cells_x, self.cells_y))
            .field("viewport_px", &self.viewport_px)
            .field("layout", self.grid.layout())
            .finish_non_exhaustive()
    }
}

impl GridReorder {
    /// Create a reorderer aiming for `cells_x` × `cells_y` grid cells.
    ///
    /// Fails when either cell count is zero.
    pub fn new(cells_x: u32, cells_y: u32, viewport: Size) -> Result<Self, ConfigError> {
        let viewport_px = viewport_to_px(viewport);
        let layout = CellLayout::for_window(viewport_px.0, viewport_px.1, cells_x, cells_y)?;
        Ok(Self {
            cells_x,
            cells_y,
            viewport_px,
            grid: SpatialHashGrid2D::new(layout),
            pos_to_z: Vec::new(),
        })
    }

    /// The grid state after the last pass.
    pub fn grid(&self) -> &SpatialHashGrid2D {
        &self.grid
    }

    fn append(&mut self, rect: kurbo::Rect, z: u32) {
        // Clamped so that records reaching past the grid still collide on the border cells.
        self.grid.add_clamped(rect, z);
        self.pos_to_z.push(z);
    }
}

impl Reorder for GridReorder {
    const CULLS_TO_VIEWPORT: bool = true;

    fn set_viewport(&mut self, viewport: Size) {
        let viewport_px = viewport_to_px(viewport);
        if viewport_px == self.viewport_px {
            return;
        }
        self.viewport_px = viewport_px;
        match CellLayout::for_window(viewport_px.0, viewport_px.1, self.cells_x, self.cells_y) {
            Ok(layout) => {
                log::debug!(
                    "grid rebuilt for {}x{} px: {}x{} cells of {}x{} px",
                    viewport_px.0,
                    viewport_px.1,
                    layout.cell_count_x(),
                    layout.cell_count_y(),
                    layout.cell_width_px(),
                    layout.cell_height_px()
                );
                self.grid.set_layout(layout);
            }
            Err(err) => log::warn!("grid kept its previous layout: {err}"),
        }
    }

    fn reorder(
        &mut self,
        span: &mut [ProcessedCommandRecord],
        cache: &mut MaterialCache,
        max_backtracking: u32,
    ) -> ReorderStats {
        let mut stats = ReorderStats::default();
        self.grid.clear();
        self.pos_to_z.clear();
        let Some(first) = span.first() else {
            return stats;
        };
        cache.set(first.material, 0);
        let first_rect = first.dst_rect;
        self.append(first_rect, 0);
        let max_backtracking = max_backtracking as usize;

        for i in 1..span.len() {
            let src = span[i];
            let material = src.material;
            let z = to_u32(i);
            let candidate = if material == span[i - 1].material {
                None
            } else {
                cache
                    .get(material)
                    .map(|p| p as usize)
                    .filter(|&last| i - 1 - last <= max_backtracking)
            };
            let Some(last) = candidate else {
                self.append(src.dst_rect, z);
                cache.set(material, z);
                continue;
            };
            if self.grid.layout().cell_range(src.dst_rect).is_none() {
                // Unreachable when records were culled to the viewport upstream.
                self.append(src.dst_rect, z);
                cache.set(material, z);
                continue;
            }
            let grid = &self.grid;
            let blocked = grid
                .query_after(src.dst_rect, to_u32(last))
                .any(|other| match grid.position(other) {
                    Some(pos) => span[pos as usize].overlaps(&src),
                    None => true,
                });
            if blocked {
                self.append(src.dst_rect, z);
                cache.set(material, z);
                continue;
            }

            for p in last + 1..i {
                self.grid.set_position(self.pos_to_z[p], to_u32(p + 1));
            }
            shift_cached_positions(span, cache, last + 1..i);
            span[last + 1..=i].rotate_right(1);
            self.pos_to_z.push(z);
            self.pos_to_z[last + 1..=i].rotate_right(1);
            self.grid
                .try_insert_after_pos(to_u32(last), src.dst_rect, z);
            debug_assert!(self.grid.cells_are_ordered(), "grid out of paint order");
            cache.set(material, to_u32(last + 1));
            stats.spliced += 1;
        }
        stats
    }
}

/// Window size in whole pixels, rounded up.
fn viewport_to_px(viewport: Size) -> (u32, u32) {
    (ceil_to_u32(viewport.width), ceil_to_u32(viewport.height))
}

#[inline]
fn ceil_to_u32(v: f64) -> u32 {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "Saturating cast; negative and NaN sizes become zero."
    )]
    let t = v as u32;
    if f64::from(t) < v {
        t.saturating_add(1)
    } else {
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reorder::LinearReorder;
    use crate::reorder::test_util::*;
    use alloc::vec;

    fn grid_reorder(size: f64) -> GridReorder {
        GridReorder::new(8, 8, Size::new(size, size)).unwrap()
    }

    fn run(r: &mut impl Reorder, span: &mut [ProcessedCommandRecord], max: u32) -> ReorderStats {
        let mut cache = MaterialCache::new();
        cache.reset(16);
        r.reorder(span, &mut cache, max)
    }

    #[test]
    fn zero_cells_is_a_config_error() {
        assert!(GridReorder::new(0, 8, Size::new(100.0, 100.0)).is_err());
    }

    #[test]
    fn groups_same_material_past_disjoint_record() {
        let mut span = indexed(vec![
            rec(1, 0., 0., 10., 10.),
            rec(2, 100., 100., 10., 10.),
            rec(1, 0., 0., 10., 10.),
        ]);
        let stats = run(&mut grid_reorder(256.0), &mut span, 32);
        assert_eq!(order(&span), [0, 2, 1]);
        assert_eq!(stats.spliced, 1);
    }

    #[test]
    fn overlap_blocks_the_move() {
        let mut span = indexed(vec![
            rec(1, 0., 0., 10., 10.),
            rec(2, 5., 5., 10., 10.),
            rec(1, 8., 8., 10., 10.),
        ]);
        run(&mut grid_reorder(256.0), &mut span, 32);
        assert_eq!(order(&span), [0, 1, 2]);
    }

    #[test]
    fn grid_tracks_spliced_positions() {
        let mut reorder = grid_reorder(256.0);
        let mut span = indexed(vec![
            rec(1, 0., 0., 10., 10.),
            rec(2, 100., 100., 10., 10.),
            rec(1, 20., 0., 10., 10.),
        ]);
        run(&mut reorder, &mut span, 32);
        let grid = reorder.grid();
        assert_eq!(grid.position(0), Some(0));
        assert_eq!(grid.position(2), Some(1));
        assert_eq!(grid.position(1), Some(2));
        assert!(grid.cells_are_ordered());
    }

    #[test]
    fn outside_record_is_appended_unmoved() {
        let mut span = indexed(vec![
            rec(1, 0., 0., 10., 10.),
            rec(2, 20., 0., 10., 10.),
            rec(1, 1000., 1000., 10., 10.),
        ]);
        run(&mut grid_reorder(256.0), &mut span, 32);
        assert_eq!(order(&span), [0, 1, 2]);
    }

    #[test]
    fn viewport_change_rebuilds_layout() {
        let mut reorder = grid_reorder(256.0);
        assert_eq!(reorder.grid().layout().cell_width_px(), 32);
        reorder.set_viewport(Size::new(1024.0, 1024.0));
        assert_eq!(reorder.grid().layout().cell_width_px(), 128);
        reorder.set_viewport(Size::new(1023.5, 1023.2));
        assert_eq!(reorder.grid().layout().cell_count_x(), 8);
    }

    #[test]
    fn huge_record_blocks_like_linear() {
        let before = indexed(vec![
            rec(1, 0., 0., 10., 10.),
            rec(2, -1e19, 0., 2e19, 300.),
            rec(1, 50., 50., 10., 10.),
        ]);
        let mut gridded = before.clone();
        let mut linear = before;
        run(&mut grid_reorder(300.0), &mut gridded, 32);
        run(&mut LinearReorder, &mut linear, 32);
        assert_eq!(order(&gridded), [0, 1, 2]);
        assert_eq!(order(&gridded), order(&linear));
    }

    #[test]
    fn matches_linear_reorder() {
        let mut rng = Rng::new(0xDEAD_BEEF_CAFE_F00D);
        let mut grid = grid_reorder(512.0);
        for round in 0..60 {
            let extent = if round % 2 == 0 { 24 } else { 160 };
            let before = random_span(&mut rng, 96, 6, 480, extent);
            let mut linear = before.clone();
            let mut gridded = before.clone();
            let a = run(&mut LinearReorder, &mut linear, 12);
            let b = run(&mut grid, &mut gridded, 12);
            assert_eq!(order(&linear), order(&gridded));
            assert_eq!(a, b);
            assert!(preserves_overlap_order(&before, &gridded));
            assert!(is_locally_grouped(&gridded, 12));
        }
    }
}
