// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bounded backtracking with a backward overlap scan.

use kurbo::Size;

use super::{Reorder, ReorderStats, shift_cached_positions, to_u32};
use crate::material::MaterialCache;
use crate::types::ProcessedCommandRecord;

/// Reorders by scanning the records a candidate would jump over.
///
/// Cost per record is bounded by `max_backtracking` overlap tests.
#[derive(Copy, Clone, Debug, Default)]
pub struct LinearReorder;

impl Reorder for LinearReorder {
    const CULLS_TO_VIEWPORT: bool = true;

    fn set_viewport(&mut self, _viewport: Size) {}

    fn reorder(
        &mut self,
        span: &mut [ProcessedCommandRecord],
        cache: &mut MaterialCache,
        max_backtracking: u32,
    ) -> ReorderStats {
        let mut stats = ReorderStats::default();
        let Some(first) = span.first() else {
            return stats;
        };
        cache.set(first.material, 0);
        let max_backtracking = max_backtracking as usize;

        for i in 1..span.len() {
            let src = span[i];
            let material = src.material;
            if material == span[i - 1].material {
                cache.set(material, to_u32(i));
                continue;
            }
            let Some(last) = cache.get(material).map(|p| p as usize) else {
                cache.set(material, to_u32(i));
                continue;
            };
            debug_assert!(last < i - 1, "last position of {material:?} is stale");
            if i - 1 - last > max_backtracking
                || span[last + 1..i].iter().rev().any(|r| r.overlaps(&src))
            {
                cache.set(material, to_u32(i));
                continue;
            }
            shift_cached_positions(span, cache, last + 1..i);
            span[last + 1..=i].rotate_right(1);
            cache.set(material, to_u32(last + 1));
            stats.spliced += 1;
        }
        stats
    }
}
