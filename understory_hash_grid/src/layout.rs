// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cell geometry: power-of-two cell sizes and pixel to cell mapping.

use kurbo::Rect;

use crate::error::GridError;

/// Largest supported shift; cell sizes above 2^30 pixels are not meaningful.
pub const MAX_SHIFT: u32 = 30;

/// Fixed cell geometry of a [`SpatialHashGrid2D`](crate::SpatialHashGrid2D).
///
/// Cells are `1 << shift_x` by `1 << shift_y` pixels so a pixel coordinate maps to a cell
/// with a single arithmetic shift. The grid covers `[0, cell_count_x << shift_x)` horizontally
/// and `[0, cell_count_y << shift_y)` vertically.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CellLayout {
    cell_count_x: u32,
    cell_count_y: u32,
    shift_x: u32,
    shift_y: u32,
}

impl CellLayout {
    /// Create a layout from explicit cell counts and shifts.
    pub fn new(
        cell_count_x: u32,
        cell_count_y: u32,
        shift_x: u32,
        shift_y: u32,
    ) -> Result<Self, GridError> {
        if cell_count_x == 0 || cell_count_y == 0 {
            return Err(GridError::InvalidCellCount {
                x: cell_count_x,
                y: cell_count_y,
            });
        }
        if shift_x > MAX_SHIFT || shift_y > MAX_SHIFT {
            return Err(GridError::InvalidShift {
                x: shift_x,
                y: shift_y,
            });
        }
        Ok(Self {
            cell_count_x,
            cell_count_y,
            shift_x,
            shift_y,
        })
    }

    /// Pick a layout for a window of `width_px` × `height_px` split into roughly
    /// `desired_cells_x` × `desired_cells_y` cells.
    ///
    /// The cell size on each axis is `window / desired` rounded up to the next power of two,
    /// so the resulting cell count may be lower than requested. A zero window extent still
    /// yields one cell on that axis.
    pub fn for_window(
        width_px: u32,
        height_px: u32,
        desired_cells_x: u32,
        desired_cells_y: u32,
    ) -> Result<Self, GridError> {
        if desired_cells_x == 0 || desired_cells_y == 0 {
            return Err(GridError::InvalidCellCount {
                x: desired_cells_x,
                y: desired_cells_y,
            });
        }
        let (count_x, shift_x) = axis_for_window(width_px, desired_cells_x);
        let (count_y, shift_y) = axis_for_window(height_px, desired_cells_y);
        Self::new(count_x, count_y, shift_x, shift_y)
    }

    /// Number of cells along x.
    pub const fn cell_count_x(&self) -> u32 {
        self.cell_count_x
    }

    /// Number of cells along y.
    pub const fn cell_count_y(&self) -> u32 {
        self.cell_count_y
    }

    /// Total number of cells.
    pub const fn cell_count(&self) -> usize {
        self.cell_count_x as usize * self.cell_count_y as usize
    }

    /// Shift applied to x pixel coordinates.
    pub const fn shift_x(&self) -> u32 {
        self.shift_x
    }

    /// Shift applied to y pixel coordinates.
    pub const fn shift_y(&self) -> u32 {
        self.shift_y
    }

    /// Cell width in pixels.
    pub const fn cell_width_px(&self) -> u32 {
        1 << self.shift_x
    }

    /// Cell height in pixels.
    pub const fn cell_height_px(&self) -> u32 {
        1 << self.shift_y
    }

    /// Width of the area covered by the grid, in pixels.
    pub const fn width_px(&self) -> u64 {
        (self.cell_count_x as u64) << self.shift_x
    }

    /// Height of the area covered by the grid, in pixels.
    pub const fn height_px(&self) -> u64 {
        (self.cell_count_y as u64) << self.shift_y
    }

    /// Map an x pixel coordinate to a (possibly out of range) cell column.
    #[inline]
    pub fn to_x_cell(&self, x: f64) -> i64 {
        floor_to_i64(x) >> self.shift_x
    }

    /// Map a y pixel coordinate to a (possibly out of range) cell row.
    #[inline]
    pub fn to_y_cell(&self, y: f64) -> i64 {
        floor_to_i64(y) >> self.shift_y
    }

    /// Cells covered by `rect`, clamped to the grid.
    ///
    /// Returns `None` when `rect` lies entirely outside the grid.
    pub fn cell_range(&self, rect: Rect) -> Option<CellRange> {
        let x0 = self.to_x_cell(rect.x0);
        let x1 = self.to_x_cell(rect.x1);
        let y0 = self.to_y_cell(rect.y0);
        let y1 = self.to_y_cell(rect.y1);
        let max_x = i64::from(self.cell_count_x) - 1;
        let max_y = i64::from(self.cell_count_y) - 1;
        if x1 < 0 || y1 < 0 || x0 > max_x || y0 > max_y {
            return None;
        }
        Some(CellRange::from_clamped(x0, y0, x1, y1, max_x, max_y))
    }

    /// Cells covered by `rect` with every bound clamped into the grid.
    ///
    /// Rectangles outside the grid map onto the nearest border cells. Clamping is monotone, so
    /// two rectangles that overlap still share at least one cell afterwards.
    pub fn clamped_cell_range(&self, rect: Rect) -> CellRange {
        let max_x = i64::from(self.cell_count_x) - 1;
        let max_y = i64::from(self.cell_count_y) - 1;
        CellRange::from_clamped(
            self.to_x_cell(rect.x0),
            self.to_y_cell(rect.y0),
            self.to_x_cell(rect.x1),
            self.to_y_cell(rect.y1),
            max_x,
            max_y,
        )
    }

    #[inline]
    pub(crate) fn cell_index(&self, x: u32, y: u32) -> usize {
        debug_assert!(
            x < self.cell_count_x && y < self.cell_count_y,
            "cell ({x}, {y}) outside the grid"
        );
        y as usize * self.cell_count_x as usize + x as usize
    }
}

/// Inclusive range of grid cells.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CellRange {
    /// First column.
    pub x0: u32,
    /// First row.
    pub y0: u32,
    /// Last column (inclusive).
    pub x1: u32,
    /// Last row (inclusive).
    pub y1: u32,
}

impl CellRange {
    fn from_clamped(x0: i64, y0: i64, x1: i64, y1: i64, max_x: i64, max_y: i64) -> Self {
        Self {
            x0: clamp_cell(x0, max_x),
            y0: clamp_cell(y0, max_y),
            x1: clamp_cell(x1, max_x),
            y1: clamp_cell(y1, max_y),
        }
    }

    /// Iterate the covered cells row by row.
    pub fn cells(self) -> impl Iterator<Item = (u32, u32)> {
        (self.y0..=self.y1).flat_map(move |y| (self.x0..=self.x1).map(move |x| (x, y)))
    }

    /// Number of covered cells.
    pub const fn len(&self) -> usize {
        (self.x1 - self.x0 + 1) as usize * (self.y1 - self.y0 + 1) as usize
    }

    /// A range always covers at least one cell.
    pub const fn is_empty(&self) -> bool {
        false
    }
}

fn axis_for_window(extent_px: u32, desired_cells: u32) -> (u32, u32) {
    let step = (extent_px / desired_cells).max(1).next_power_of_two();
    let shift = step.trailing_zeros().min(MAX_SHIFT);
    let step = 1_u32 << shift;
    let count = extent_px.div_ceil(step).max(1);
    (count, shift)
}

#[inline]
fn clamp_cell(v: i64, max: i64) -> u32 {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "Value is clamped into [0, max] where max fits in u32."
    )]
    let c = v.clamp(0, max) as u32;
    c
}

#[inline]
fn floor_to_i64(v: f64) -> i64 {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "The cast saturates outside the i64 range and maps NaN to zero."
    )]
    let i = v as i64;
    if (i as f64) > v { i.saturating_sub(1) } else { i }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn for_window_picks_power_of_two_cells() {
        let layout = CellLayout::for_window(1920, 1080, 16, 16).unwrap();
        // 1920 / 16 = 120 -> 128, 1080 / 16 = 67 -> 128
        assert_eq!(layout.cell_width_px(), 128);
        assert_eq!(layout.cell_height_px(), 128);
        assert_eq!(layout.shift_x(), 7);
        assert_eq!(layout.cell_count_x(), 15);
        assert_eq!(layout.cell_count_y(), 9);
        assert!(layout.width_px() >= 1920);
        assert!(layout.height_px() >= 1080);
    }

    #[test]
    fn tiny_window_still_has_one_cell() {
        let layout = CellLayout::for_window(0, 3, 16, 16).unwrap();
        assert_eq!(layout.cell_count_x(), 1);
        assert_eq!(layout.cell_count_y(), 3);
        assert_eq!(layout.cell_width_px(), 1);
    }

    #[test]
    fn zero_cell_count_is_rejected() {
        assert_eq!(
            CellLayout::for_window(800, 600, 0, 4),
            Err(GridError::InvalidCellCount { x: 0, y: 4 })
        );
        assert!(CellLayout::new(4, 0, 3, 3).is_err());
        assert_eq!(
            CellLayout::new(4, 4, 31, 3),
            Err(GridError::InvalidShift { x: 31, y: 3 })
        );
    }

    #[test]
    fn negative_coordinates_floor_towards_negative_cells() {
        let layout = CellLayout::new(4, 4, 4, 4).unwrap();
        assert_eq!(layout.to_x_cell(-0.5), -1);
        assert_eq!(layout.to_x_cell(-16.0), -1);
        assert_eq!(layout.to_x_cell(-16.5), -2);
        assert_eq!(layout.to_x_cell(15.9), 0);
        assert_eq!(layout.to_y_cell(16.0), 1);
    }

    #[test]
    fn huge_coordinates_saturate() {
        let layout = CellLayout::new(4, 4, 4, 4).unwrap();
        assert!(layout.to_x_cell(-1e19) < 0);
        assert!(layout.to_x_cell(1e19) > 3);
        assert_eq!(layout.to_x_cell(f64::NEG_INFINITY), i64::MIN >> 4);
        let r = layout
            .cell_range(Rect::new(-1e19, 0.0, 1e19, 60.0))
            .unwrap();
        assert_eq!(
            r,
            CellRange {
                x0: 0,
                y0: 0,
                x1: 3,
                y1: 3
            }
        );
    }

    #[test]
    fn cell_range_clamps_and_rejects_outside() {
        let layout = CellLayout::new(4, 4, 4, 4).unwrap();
        let r = layout
            .cell_range(Rect::new(-10.0, 8.0, 20.0, 100.0))
            .unwrap();
        assert_eq!(
            r,
            CellRange {
                x0: 0,
                y0: 0,
                x1: 1,
                y1: 3
            }
        );
        assert_eq!(r.len(), 8);
        assert_eq!(r.cells().count(), 8);
        assert!(layout.cell_range(Rect::new(-20.0, 0.0, -1.0, 10.0)).is_none());
        assert!(layout.cell_range(Rect::new(0.0, 64.0, 10.0, 80.0)).is_none());
    }

    #[test]
    fn clamped_range_maps_outside_rects_to_border_cells() {
        let layout = CellLayout::new(4, 4, 4, 4).unwrap();
        let r = layout.clamped_cell_range(Rect::new(100.0, -50.0, 120.0, -40.0));
        assert_eq!(
            r,
            CellRange {
                x0: 3,
                y0: 0,
                x1: 3,
                y1: 0
            }
        );
        let cells: Vec<_> = r.cells().collect();
        assert_eq!(cells, [(3, 0)]);
    }
}
