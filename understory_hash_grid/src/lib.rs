// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_hash_grid --heading-base-level=0

//! Understory Hash Grid: a screen-space uniform grid over paint-ordered entries.
//!
//! The grid answers one question quickly: "which entries painted after position `p` overlap
//! this rectangle?" It is built for draw-call reordering, where a command may only move
//! backwards past commands it does not overlap.
//!
//! - Cells are power-of-two sized, so mapping a pixel to a cell is a shift.
//! - Each cell keeps the z indices of overlapping entries sorted by their current paint position.
//! - A lookup table maps each z index to its position; positions can be remapped in place.
//! - Entries can be spliced into the middle of the sequence without rebuilding the grid.
//!
//! # Example
//!
//! ```rust
//! use kurbo::Rect;
//! use understory_hash_grid::SpatialHashGrid2D;
//!
//! // A 256×256 window split into 64px cells.
//! let mut grid = SpatialHashGrid2D::for_window(256, 256, 4, 4).unwrap();
//! grid.try_add(Rect::new(0.0, 0.0, 50.0, 50.0), 0);
//! grid.try_add(Rect::new(200.0, 200.0, 250.0, 250.0), 1);
//!
//! // Nothing painted after position 0 overlaps the top-left corner.
//! assert_eq!(grid.query_after(Rect::new(10.0, 10.0, 20.0, 20.0), 0).count(), 0);
//!
//! // Move entry 1 up a slot and splice a new entry in right after position 0.
//! grid.set_position(1, 2);
//! grid.try_insert_after_pos(0, Rect::new(100.0, 100.0, 120.0, 120.0), 2);
//! assert_eq!(grid.position(2), Some(1));
//! ```
//!
//! ### Float semantics
//!
//! This crate assumes no NaNs for coordinates. Coordinates are floored to whole pixels
//! before being mapped to cells.

#![no_std]

extern crate alloc;

pub mod error;
pub mod grid;
pub mod layout;

pub use error::GridError;
pub use grid::SpatialHashGrid2D;
pub use layout::{CellLayout, CellRange, MAX_SHIFT};
