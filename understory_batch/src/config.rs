// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Preprocessor configuration.

use kurbo::Size;

/// Default limit on how far back a record may be moved.
pub const DEFAULT_MAX_BACKTRACKING: u32 = 32;

/// Default desired number of grid cells per axis.
pub const DEFAULT_GRID_CELLS: u32 = 16;

/// Settings supplied by the embedding renderer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PreprocessConfig {
    /// Split draws into an opaque and a transparent queue. When `false` every draw goes to the
    /// transparent queue in paint order.
    pub allow_depth_buffer: bool,
    /// How many positions a record may be moved back to join an earlier record with the same
    /// material. Zero disables reordering.
    pub max_backtracking: u32,
    /// Desired grid cells along x.
    pub grid_cells_x: u32,
    /// Desired grid cells along y.
    pub grid_cells_y: u32,
    /// Current window size in pixels.
    pub viewport: Size,
    /// Drop records with no area inside the viewport.
    ///
    /// A viewport with zero area disables culling, so the default configuration keeps every
    /// record until a window size is set.
    pub cull_to_viewport: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            allow_depth_buffer: false,
            max_backtracking: DEFAULT_MAX_BACKTRACKING,
            grid_cells_x: DEFAULT_GRID_CELLS,
            grid_cells_y: DEFAULT_GRID_CELLS,
            viewport: Size::ZERO,
            cull_to_viewport: true,
        }
    }
}

impl PreprocessConfig {
    /// Default settings for a window of `viewport` pixels.
    pub fn for_viewport(viewport: Size) -> Self {
        Self {
            viewport,
            ..Self::default()
        }
    }
}
