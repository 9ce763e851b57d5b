// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sprite descriptions consumed by the [`MeshManager`](crate::MeshManager).
//!
//! Only the parts of a sprite that affect batching are modeled: its kind, its materials, its
//! trim margin, and for optimized nine-slices which parts are present.

use alloc::vec;
use alloc::vec::Vec;

use kurbo::Insets;

use crate::material::SpriteMaterialInfo;

/// The kind of sprite.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SpriteKind {
    /// Single-quad image without index data.
    BasicImage,
    /// Nine-slice without index data.
    BasicNineSlice,
    /// Indexed single-quad image.
    Image,
    /// Indexed nine-slice with a trim margin.
    NineSlice,
    /// Nine-slice split into an opaque and a transparent material.
    OptimizedNineSlice,
    /// Bitmap font.
    Font,
}

impl SpriteKind {
    /// Whether the sprite has a basic (non-indexed) mesh form.
    pub const fn is_basic(self) -> bool {
        matches!(self, Self::BasicImage | Self::BasicNineSlice)
    }
}

/// Which parts of an optimized nine-slice are present.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum NineSliceTransparency {
    /// Only opaque parts.
    Opaque,
    /// Only transparent parts.
    Transparent,
    /// Both opaque and transparent parts.
    #[default]
    Mixed,
}

impl NineSliceTransparency {
    /// Whether opaque parts are present.
    pub const fn has_opaque(self) -> bool {
        matches!(self, Self::Opaque | Self::Mixed)
    }

    /// Whether transparent parts are present.
    pub const fn has_transparent(self) -> bool {
        matches!(self, Self::Transparent | Self::Mixed)
    }

    /// Number of present parts.
    pub const fn part_count(self) -> u32 {
        match self {
            Self::Opaque | Self::Transparent => 1,
            Self::Mixed => 2,
        }
    }
}

/// A sprite as seen by the batcher.
#[derive(Clone, Debug, PartialEq)]
pub struct Sprite {
    kind: SpriteKind,
    materials: Vec<SpriteMaterialInfo>,
    trim_margin: Insets,
    transparency: NineSliceTransparency,
}

impl Sprite {
    /// Create a sprite of `kind` using `materials`, with no trim margin.
    pub fn new(kind: SpriteKind, materials: Vec<SpriteMaterialInfo>) -> Self {
        Self {
            kind,
            materials,
            trim_margin: Insets::uniform(0.0),
            transparency: NineSliceTransparency::default(),
        }
    }

    /// A basic image.
    pub fn basic_image(material: SpriteMaterialInfo) -> Self {
        Self::new(SpriteKind::BasicImage, vec![material])
    }

    /// A basic nine-slice.
    pub fn basic_nine_slice(material: SpriteMaterialInfo) -> Self {
        Self::new(SpriteKind::BasicNineSlice, vec![material])
    }

    /// An indexed image.
    pub fn image(material: SpriteMaterialInfo) -> Self {
        Self::new(SpriteKind::Image, vec![material])
    }

    /// A nine-slice whose rendered content is inset by `trim_margin`.
    pub fn nine_slice(material: SpriteMaterialInfo, trim_margin: Insets) -> Self {
        Self::new(SpriteKind::NineSlice, vec![material]).with_trim_margin(trim_margin)
    }

    /// A nine-slice rendered with a separate material for its opaque and transparent parts.
    ///
    /// Material 0 is the opaque material and material 1 the transparent one.
    pub fn optimized_nine_slice(
        opaque: SpriteMaterialInfo,
        transparent: SpriteMaterialInfo,
        trim_margin: Insets,
        transparency: NineSliceTransparency,
    ) -> Self {
        let mut sprite = Self::new(SpriteKind::OptimizedNineSlice, vec![opaque, transparent])
            .with_trim_margin(trim_margin);
        sprite.transparency = transparency;
        sprite
    }

    /// A bitmap font.
    pub fn font(material: SpriteMaterialInfo) -> Self {
        Self::new(SpriteKind::Font, vec![material])
    }

    /// Set the trim margin.
    pub fn with_trim_margin(mut self, trim_margin: Insets) -> Self {
        self.trim_margin = trim_margin;
        self
    }

    /// The sprite kind.
    pub fn kind(&self) -> SpriteKind {
        self.kind
    }

    /// All materials of the sprite.
    pub fn materials(&self) -> &[SpriteMaterialInfo] {
        &self.materials
    }

    /// Material `index`, if present.
    pub fn material(&self, index: u32) -> Option<SpriteMaterialInfo> {
        self.materials.get(index as usize).copied()
    }

    /// Number of materials.
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// Margin between the destination rectangle and the rendered content.
    pub fn trim_margin(&self) -> Insets {
        self.trim_margin
    }

    /// Present parts of an optimized nine-slice.
    pub fn transparency(&self) -> NineSliceTransparency {
        self.transparency
    }
}
