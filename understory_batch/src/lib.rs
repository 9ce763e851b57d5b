// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_batch --heading-base-level=0

//! Understory Batch: draw-command batching for immediate-mode UI renderers.
//!
//! A UI emits draw commands in paint order. Drawing them as-is switches material (texture and
//! blend state) far more often than needed. This crate turns a frame's commands into two
//! queues of [`ProcessedCommandRecord`]s that a renderer can submit with fewer switches:
//!
//! - Meshes and the materials they reference are tracked by a [`MeshManager`].
//! - A preprocessor classifies each command as opaque or transparent, applies trim margins,
//!   clipping and viewport culling, and writes the records into a reusable scratch buffer.
//! - Each queue is then reordered: a record may move back next to an earlier record with the
//!   same material, as long as it jumps over nothing it overlaps and stays within a
//!   backtracking limit. Visual output is unchanged.
//!
//! Three preprocessors share the pipeline and differ in their [`Reorder`] strategy:
//!
//! - [`BasicPreprocessor`]: paint order, no culling.
//! - [`LinearPreprocessor`]: scans the skipped records for overlaps.
//! - [`SpatialGridPreprocessor`]: asks an [`understory_hash_grid`] grid for overlap
//!   candidates. Decisions match the linear preprocessor.
//!
//! # Example
//!
//! ```rust
//! use kurbo::Rect;
//! use understory_batch::{
//!     DrawCommand, LinearPreprocessor, MeshManager, PreprocessConfig, Sprite,
//!     SpriteMaterialId, SpriteMaterialInfo,
//! };
//!
//! let mut meshes = MeshManager::new(SpriteMaterialInfo::new(SpriteMaterialId(0), true));
//! let icon = SpriteMaterialInfo::new(SpriteMaterialId(1), false);
//! let text = SpriteMaterialInfo::new(SpriteMaterialId(2), false);
//! let a = meshes.create_mesh(&Sprite::image(icon), 0, 0, 0).unwrap();
//! let b = meshes.create_mesh(&Sprite::image(text), 0, 0, 0).unwrap();
//!
//! let commands = [
//!     DrawCommand::from_rect(a, Rect::new(0.0, 0.0, 10.0, 10.0)),
//!     DrawCommand::from_rect(b, Rect::new(100.0, 100.0, 110.0, 110.0)),
//!     DrawCommand::from_rect(a, Rect::new(20.0, 0.0, 30.0, 10.0)),
//! ];
//!
//! let mut pre = LinearPreprocessor::new(PreprocessConfig::for_viewport((640.0, 480.0).into()));
//! let result = pre.process(&commands, &meshes);
//! assert_eq!(result.transparent_count, 3);
//!
//! // The second draw of `a` moved up next to the first one.
//! let order: Vec<u32> = pre.transparent_span().iter().map(|r| r.command_index).collect();
//! assert_eq!(order, [0, 2, 1]);
//! # meshes.destroy_mesh(a);
//! # meshes.destroy_mesh(b);
//! ```
//!
//! ### Float semantics
//!
//! This crate assumes no NaNs in command geometry. Overlap tests are strict: rectangles that
//! only share an edge do not overlap.

#![no_std]

extern crate alloc;

pub mod command;
pub mod config;
pub mod error;
pub mod material;
pub mod mesh;
pub mod preprocess;
pub mod reorder;
pub mod sprite;
pub mod types;

pub use command::{DrawCommand, DrawCommandKind};
pub use config::{DEFAULT_GRID_CELLS, DEFAULT_MAX_BACKTRACKING, PreprocessConfig};
pub use error::{ConfigError, MAX_INDEXED_VERTEX_CAPACITY, MeshError};
pub use material::{
    MaterialCache, MaterialHandle, MaterialLookup, SpriteMaterialId, SpriteMaterialInfo,
};
pub use mesh::{Capacity, CapacityTotals, MeshHandle, MeshKind, MeshManager, MeshQuery, ResolvedMesh};
pub use preprocess::{
    BasicPreprocessor, GROW_BY, LinearPreprocessor, PreprocessResult, PreprocessorGeneric,
    SpatialGridPreprocessor,
};
pub use reorder::{GridReorder, LinearReorder, NoReorder, Reorder, ReorderStats, material_switches};
pub use sprite::{NineSliceTransparency, Sprite, SpriteKind};
pub use types::{Color, MaterialId, ProcessedCommandFlags, ProcessedCommandRecord, rects_overlap};
