// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Grid construction errors.

/// Errors raised while building a grid layout.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// A cell count (or desired cell count) was zero.
    #[error("grid needs at least one cell per axis, got {x}x{y}")]
    InvalidCellCount {
        /// Cells along x.
        x: u32,
        /// Cells along y.
        y: u32,
    },
    /// A shift exceeded [`MAX_SHIFT`](crate::MAX_SHIFT).
    #[error("cell shift out of range: ({x}, {y})")]
    InvalidShift {
        /// Shift along x.
        x: u32,
        /// Shift along y.
        y: u32,
    },
}
