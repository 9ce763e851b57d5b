// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Draw command preprocessing: classify, cull, split into queues and reorder.
//!
//! A pass turns a list of [`DrawCommand`]s in paint order into [`ProcessedCommandRecord`]s in
//! two queues:
//!
//! - the opaque queue, stored front to back (reverse paint order) so a depth-tested renderer
//!   rejects hidden fragments early;
//! - the transparent queue, stored in paint order.
//!
//! Both queues live in one scratch buffer owned by the preprocessor. The opaque queue grows
//! downward from the middle of the buffer and the transparent queue grows upward from it, so the
//! two never collide and no per-pass allocation is needed once the buffer has grown.
//!
//! When the depth buffer is not allowed every record goes to the transparent queue in paint
//! order, including the opaque part of an optimized nine-slice.

use alloc::vec::Vec;
use core::fmt;
use core::ops::Range;

use kurbo::{Insets, Rect, Size};

use crate::command::{DrawCommand, DrawCommandKind};
use crate::config::PreprocessConfig;
use crate::error::ConfigError;
use crate::material::MaterialCache;
use crate::mesh::{MeshQuery, ResolvedMesh};
use crate::reorder::{GridReorder, LinearReorder, NoReorder, Reorder, ReorderStats, to_u32};
use crate::sprite::NineSliceTransparency;
use crate::types::{MaterialId, ProcessedCommandFlags, ProcessedCommandRecord, rects_overlap};

/// Extra records allocated whenever the scratch buffer has to grow.
pub const GROW_BY: usize = 64;

/// Where the two queues of a pass ended up in the scratch buffer.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PreprocessResult {
    /// First record of the opaque queue.
    pub opaque_start: usize,
    /// Number of opaque records.
    pub opaque_count: usize,
    /// First record of the transparent queue.
    pub transparent_start: usize,
    /// Number of transparent records.
    pub transparent_count: usize,
}

impl PreprocessResult {
    /// Buffer range of the opaque queue.
    pub fn opaque_range(&self) -> Range<usize> {
        self.opaque_start..self.opaque_start + self.opaque_count
    }

    /// Buffer range of the transparent queue.
    pub fn transparent_range(&self) -> Range<usize> {
        self.transparent_start..self.transparent_start + self.transparent_count
    }

    /// Total number of records produced.
    pub fn len(&self) -> usize {
        self.opaque_count + self.transparent_count
    }

    /// `true` if the pass produced no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A preprocessor generic over its [`Reorder`] strategy.
///
/// Use one of the aliases:
///
/// - [`BasicPreprocessor`]: no culling, no reordering.
/// - [`LinearPreprocessor`]: viewport culling and bounded backtracking with a linear overlap
///   scan.
/// - [`SpatialGridPreprocessor`]: the same decisions as the linear one, with overlap candidates
///   from a spatial hash grid.
pub struct PreprocessorGeneric<R: Reorder> {
    config: PreprocessConfig,
    records: Vec<ProcessedCommandRecord>,
    result: PreprocessResult,
    opaque_cache: MaterialCache,
    transparent_cache: MaterialCache,
    reorder: R,
    stats: ReorderStats,
}

/// Splits and culls nothing beyond classification; keeps paint order.
pub type BasicPreprocessor = PreprocessorGeneric<NoReorder>;

/// Reorders with a backward linear overlap scan.
pub type LinearPreprocessor = PreprocessorGeneric<LinearReorder>;

/// Reorders with overlap candidates from a spatial hash grid.
pub type SpatialGridPreprocessor = PreprocessorGeneric<GridReorder>;

impl<R: Reorder + fmt::Debug> fmt::Debug for PreprocessorGeneric<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreprocessorGeneric")
            .field("config", &self.config)
            .field("result", &self.result)
            .field("stats", &self.stats)
            .field("reorder", &self.reorder)
            .finish_non_exhaustive()
    }
}

impl<R: Reorder + Default> PreprocessorGeneric<R> {
    /// Create a preprocessor with a default constructed reorder strategy.
    pub fn new(config: PreprocessConfig) -> Self {
        Self::with_reorder(config, R::default())
    }
}

impl SpatialGridPreprocessor {
    /// Create a grid preprocessor using the grid settings in `config`.
    ///
    /// Fails when a grid cell count is zero.
    pub fn try_new(config: PreprocessConfig) -> Result<Self, ConfigError> {
        let reorder = GridReorder::new(config.grid_cells_x, config.grid_cells_y, config.viewport)?;
        Ok(Self::with_reorder(config, reorder))
    }
}

impl<R: Reorder> PreprocessorGeneric<R> {
    /// Create a preprocessor around `reorder`.
    pub fn with_reorder(config: PreprocessConfig, mut reorder: R) -> Self {
        reorder.set_viewport(config.viewport);
        Self {
            config,
            records: Vec::new(),
            result: PreprocessResult::default(),
            opaque_cache: MaterialCache::new(),
            transparent_cache: MaterialCache::new(),
            reorder,
            stats: ReorderStats::default(),
        }
    }

    /// Current settings.
    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// The reorder strategy.
    pub fn reorder(&self) -> &R {
        &self.reorder
    }

    /// Queue layout of the last pass.
    pub fn result(&self) -> PreprocessResult {
        self.result
    }

    /// Reorder counters of the last pass.
    pub fn stats(&self) -> ReorderStats {
        self.stats
    }

    /// Opaque records of the last pass, front to back.
    pub fn opaque_span(&self) -> &[ProcessedCommandRecord] {
        &self.records[self.result.opaque_range()]
    }

    /// Transparent records of the last pass, in paint order.
    pub fn transparent_span(&self) -> &[ProcessedCommandRecord] {
        &self.records[self.result.transparent_range()]
    }

    /// Number of records the scratch buffer holds without growing.
    pub fn buffer_capacity(&self) -> usize {
        self.records.len()
    }

    /// The window size changed.
    pub fn set_viewport(&mut self, viewport: Size) {
        self.config.viewport = viewport;
        self.reorder.set_viewport(viewport);
    }

    /// Enable or disable the opaque queue.
    pub fn set_allow_depth_buffer(&mut self, allow: bool) {
        self.config.allow_depth_buffer = allow;
    }

    /// Limit how far back a record may be moved.
    pub fn set_max_backtracking(&mut self, max_backtracking: u32) {
        self.config.max_backtracking = max_backtracking;
    }

    /// Enable or disable viewport culling. Ignored by strategies that never cull.
    pub fn set_cull_to_viewport(&mut self, cull: bool) {
        self.config.cull_to_viewport = cull;
    }

    /// Run one pass over `commands`, resolving meshes through `meshes`.
    ///
    /// Commands referencing unknown or stale meshes are skipped with a warning; placeholder
    /// meshes are skipped silently.
    pub fn process<Q: MeshQuery + ?Sized>(
        &mut self,
        commands: &[DrawCommand],
        meshes: &Q,
    ) -> PreprocessResult {
        let n = commands.len();
        if self.records.len() < 2 * n {
            self.records
                .resize(2 * n + GROW_BY, ProcessedCommandRecord::default());
        }
        let split = self.config.allow_depth_buffer;
        let base = if split { n } else { 0 };
        let cull = R::CULLS_TO_VIEWPORT
            && self.config.cull_to_viewport
            && !self.config.viewport.is_zero_area();
        let mut queues = Queues {
            records: &mut self.records,
            split,
            opaque_start: base,
            transparent_end: base,
        };

        for (index, command) in commands.iter().enumerate() {
            let Some(mesh) = meshes.resolve(command.mesh) else {
                log::warn!("draw command {index} references unknown mesh {:?}", command.mesh);
                continue;
            };
            let trim_margin = match mesh {
                ResolvedMesh::Skip => continue,
                ResolvedMesh::Single { trim_margin, .. }
                | ResolvedMesh::Split { trim_margin, .. } => trim_margin,
            };
            let Some(dst_rect) = self.config.clip_and_cull(command, trim_margin, cull) else {
                continue;
            };
            let record = ProcessedCommandRecord {
                material: MaterialId::DEFAULT,
                dst_rect,
                color: command.color,
                command_index: to_u32(index),
                flags: ProcessedCommandFlags::empty(),
            };
            match mesh {
                ResolvedMesh::Skip => {}
                ResolvedMesh::Single {
                    material,
                    is_opaque,
                    ..
                } => queues.push(ProcessedCommandRecord { material, ..record }, is_opaque),
                ResolvedMesh::Split {
                    opaque,
                    transparent,
                    parts,
                    ..
                } => queues.push_split(record, opaque, transparent, parts),
            }
        }

        let result = PreprocessResult {
            opaque_start: queues.opaque_start,
            opaque_count: base - queues.opaque_start,
            transparent_start: base,
            transparent_count: queues.transparent_end - base,
        };
        self.result = result;

        let max_backtracking = self.config.max_backtracking;
        let material_count = meshes.material_count();
        let mut stats = ReorderStats::default();
        if result.opaque_count > 1 {
            self.opaque_cache.reset(material_count);
            stats += self.reorder.reorder(
                &mut self.records[result.opaque_range()],
                &mut self.opaque_cache,
                max_backtracking,
            );
        }
        if result.transparent_count > 1 {
            self.transparent_cache.reset(material_count);
            stats += self.reorder.reorder(
                &mut self.records[result.transparent_range()],
                &mut self.transparent_cache,
                max_backtracking,
            );
        }
        self.stats = stats;
        log::trace!(
            "preprocessed {n} commands into {} opaque and {} transparent records, {} spliced",
            result.opaque_count,
            result.transparent_count,
            stats.spliced
        );
        result
    }
}

impl PreprocessConfig {
    /// Final destination rectangle of `command`, or `None` if it is clipped or culled away.
    fn clip_and_cull(&self, command: &DrawCommand, trim: Insets, cull: bool) -> Option<Rect> {
        let mut rect = trimmed_rect(command, trim);
        if let Some(clip) = command.clip {
            if !rects_overlap(rect, clip) {
                return None;
            }
            rect = rect.intersect(clip);
        }
        if cull {
            let Size { width, height } = self.viewport;
            let visible = rect.x0 < width && rect.x1 > 0.0 && rect.y0 < height && rect.y1 > 0.0;
            if !visible {
                return None;
            }
        }
        Some(rect)
    }
}

/// Destination rectangle of `command` inset by `trim`, with negative sizes clamped to zero.
///
/// Rotated draws swap the axes the margins apply to.
fn trimmed_rect(command: &DrawCommand, trim: Insets) -> Rect {
    let (dx, dy, dw, dh) = match command.kind {
        DrawCommandKind::DrawRot90Cw => (trim.y0, trim.x0, trim.y0 + trim.y1, trim.x0 + trim.x1),
        DrawCommandKind::Draw | DrawCommandKind::DrawCustom(_) => {
            (trim.x0, trim.y0, trim.x0 + trim.x1, trim.y0 + trim.y1)
        }
    };
    let x = command.position.x + dx;
    let y = command.position.y + dy;
    let w = (command.size.width - dw).max(0.0);
    let h = (command.size.height - dh).max(0.0);
    Rect::new(x, y, x + w, y + h)
}

/// Write cursors of the two queues.
struct Queues<'a> {
    records: &'a mut [ProcessedCommandRecord],
    split: bool,
    opaque_start: usize,
    transparent_end: usize,
}

impl Queues<'_> {
    fn push(&mut self, record: ProcessedCommandRecord, is_opaque: bool) {
        if self.split && is_opaque {
            self.opaque_start -= 1;
            self.records[self.opaque_start] = record;
        } else {
            self.records[self.transparent_end] = record;
            self.transparent_end += 1;
        }
    }

    fn push_split(
        &mut self,
        record: ProcessedCommandRecord,
        opaque: MaterialId,
        transparent: MaterialId,
        parts: NineSliceTransparency,
    ) {
        if !record.color.is_opaque() {
            // A translucent tint makes every part translucent.
            self.push(
                ProcessedCommandRecord {
                    material: transparent,
                    flags: ProcessedCommandFlags::RENDER_IGNORE_OPACITY,
                    ..record
                },
                false,
            );
            return;
        }
        if parts.has_opaque() {
            self.push(
                ProcessedCommandRecord {
                    material: opaque,
                    flags: ProcessedCommandFlags::RENDER_OPAQUE,
                    ..record
                },
                true,
            );
        }
        if parts.has_transparent() {
            self.push(
                ProcessedCommandRecord {
                    material: transparent,
                    ..record
                },
                false,
            );
        }
    }
}
