// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reorder strategies for one span of processed records.
//!
//! - `NoReorder`: keeps paint order (used by the basic preprocessor).
//! - `linear`: bounded backtracking with a backward overlap scan.
//! - `grid`: the same policy with overlap candidates taken from a spatial hash grid.
//!
//! Policy
//! ------
//! Records are visited in order. A record whose material differs from its predecessor may be
//! moved back to sit right after the most recent record with the same material when
//!
//! - that record is at most `max_backtracking` positions behind, and
//! - none of the records it would jump over overlaps it.
//!
//! Otherwise it stays where it is. Overlap is strict, so records sharing only an edge commute.
//! With `max_backtracking == 0` nothing moves.

use kurbo::Size;

use crate::material::MaterialCache;
use crate::types::ProcessedCommandRecord;

pub mod grid;
pub mod linear;

pub use grid::GridReorder;
pub use linear::LinearReorder;

/// Counters reported by a reorder pass.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReorderStats {
    /// Records moved back next to an earlier record with the same material.
    pub spliced: u32,
}

impl core::ops::AddAssign for ReorderStats {
    fn add_assign(&mut self, rhs: Self) {
        self.spliced += rhs.spliced;
    }
}

/// A reorder strategy used by [`PreprocessorGeneric`](crate::PreprocessorGeneric).
pub trait Reorder {
    /// Whether preprocessors using this strategy drop records outside the viewport.
    const CULLS_TO_VIEWPORT: bool;

    /// The window size changed.
    fn set_viewport(&mut self, viewport: Size);

    /// Reorder `span` in place.
    ///
    /// `cache` must have been [reset](MaterialCache::reset) to cover every material in `span`.
    fn reorder(
        &mut self,
        span: &mut [ProcessedCommandRecord],
        cache: &mut MaterialCache,
        max_backtracking: u32,
    ) -> ReorderStats;
}

/// Leaves records in paint order.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoReorder;

impl Reorder for NoReorder {
    const CULLS_TO_VIEWPORT: bool = false;

    fn set_viewport(&mut self, _viewport: Size) {}

    fn reorder(
        &mut self,
        _span: &mut [ProcessedCommandRecord],
        _cache: &mut MaterialCache,
        _max_backtracking: u32,
    ) -> ReorderStats {
        ReorderStats::default()
    }
}

/// Number of adjacent record pairs with different materials, i.e. the material switches a
/// renderer drawing `span` in order would perform.
pub fn material_switches(span: &[ProcessedCommandRecord]) -> usize {
    span.windows(2)
        .filter(|w| w[0].material != w[1].material)
        .count()
}

/// Shift every material whose last known position lies in `range` up by one slot.
///
/// Called right before `span[range.start..=range.end]` is rotated right by one.
#[inline]
pub(crate) fn shift_cached_positions(
    span: &[ProcessedCommandRecord],
    cache: &mut MaterialCache,
    range: core::ops::Range<usize>,
) {
    for q in range {
        let material = span[q].material;
        if cache.get(material) == Some(to_u32(q)) {
            cache.set(material, to_u32(q + 1));
        }
    }
}

#[inline]
pub(crate) fn to_u32(i: usize) -> u32 {
    debug_assert!(u32::try_from(i).is_ok(), "span position {i} exceeds u32");
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Spans are bounded by the u32 command index space."
    )]
    let v = i as u32;
    v
}
