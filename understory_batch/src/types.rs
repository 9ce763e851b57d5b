// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public value types: colors, dense material ids, and processed command records.

use kurbo::Rect;

/// An 8-bit RGBA color.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha; `0xFF` is fully opaque.
    pub a: u8,
}

impl Color {
    /// Opaque white, the neutral tint.
    pub const WHITE: Self = Self::rgba8(0xFF, 0xFF, 0xFF, 0xFF);

    /// Create a color from its components.
    pub const fn rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Whether the alpha channel is fully opaque.
    pub const fn is_opaque(self) -> bool {
        self.a == 0xFF
    }
}

/// Dense material index used for array indexing during a single processing pass.
///
/// Ids are recomputed whenever materials are added or removed; only a
/// [`MaterialHandle`](crate::MaterialHandle) is a stable identity. Never keep an id across frames.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialId(pub u32);

impl MaterialId {
    /// Id of the reserved default material.
    pub const DEFAULT: Self = Self(0);

    /// The id as an array index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// Render flags attached to a processed record.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ProcessedCommandFlags: u8 {
        /// Render the opaque parts of a multi-material sprite only.
        const RENDER_OPAQUE = 0b0000_0001;
        /// Render every part of a multi-material sprite with the transparent material,
        /// ignoring per-part opacity.
        const RENDER_IGNORE_OPACITY = 0b0000_0010;
    }
}

/// One classified, geometry-resolved draw.
///
/// Records are produced fresh by every `process` call and live in a scratch buffer owned by
/// the preprocessor.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ProcessedCommandRecord {
    /// Dense material id of the draw.
    pub material: MaterialId,
    /// Final destination rectangle, after trim and clipping.
    pub dst_rect: Rect,
    /// Final color.
    pub color: Color,
    /// Index of the command that produced this record.
    pub command_index: u32,
    /// Render flags.
    pub flags: ProcessedCommandFlags,
}

impl ProcessedCommandRecord {
    /// Whether the destination rectangles of two records overlap.
    ///
    /// Rectangles that only share an edge do not overlap.
    #[inline]
    pub fn overlaps(&self, other: &Self) -> bool {
        rects_overlap(self.dst_rect, other.dst_rect)
    }
}

/// Strict overlap test: touching edges do not count.
#[inline]
pub fn rects_overlap(a: Rect, b: Rect) -> bool {
    a.x0 < b.x1 && b.x0 < a.x1 && a.y0 < b.y1 && b.y0 < a.y1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_edges_do_not_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(!rects_overlap(a, Rect::new(10.0, 0.0, 20.0, 10.0)));
        assert!(!rects_overlap(a, Rect::new(0.0, 10.0, 10.0, 20.0)));
        assert!(rects_overlap(a, Rect::new(9.5, 9.5, 20.0, 20.0)));
        assert!(rects_overlap(a, Rect::new(2.0, 2.0, 3.0, 3.0)));
    }

    #[test]
    fn empty_rect_never_overlaps() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(!rects_overlap(a, Rect::new(5.0, 5.0, 5.0, 8.0)));
    }

    #[test]
    fn color_opacity() {
        assert!(Color::WHITE.is_opaque());
        assert!(!Color::rgba8(0xFF, 0xFF, 0xFF, 0xFE).is_opaque());
        assert_eq!(Color::default().a, 0);
    }

    #[test]
    fn default_flags_are_empty() {
        let r = ProcessedCommandRecord::default();
        assert!(r.flags.is_empty());
        assert_eq!(r.material, MaterialId::DEFAULT);
    }
}
