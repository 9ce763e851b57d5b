// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Draw commands: the read-only input of a processing pass.

use kurbo::{Point, Rect, Size};

use crate::mesh::MeshHandle;
use crate::types::Color;

/// How a command places its mesh.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DrawCommandKind {
    /// Draw at the destination position and size.
    #[default]
    Draw,
    /// Draw rotated 90° clockwise inside the destination rectangle.
    ///
    /// Trim margins are rotated along with the mesh.
    DrawRot90Cw,
    /// Draw through a custom callback; geometry is handled like [`DrawCommandKind::Draw`].
    DrawCustom(u32),
}

/// A single draw emitted by the UI, in paint order.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DrawCommand {
    /// Mesh to draw.
    pub mesh: MeshHandle,
    /// Placement mode.
    pub kind: DrawCommandKind,
    /// Top-left destination position in pixels.
    pub position: Point,
    /// Destination size in pixels.
    pub size: Size,
    /// Tint color.
    pub color: Color,
    /// Optional clip rectangle; when set, the draw is restricted to it.
    pub clip: Option<Rect>,
}

impl DrawCommand {
    /// A plain draw with no clip.
    pub fn new(mesh: MeshHandle, position: Point, size: Size, color: Color) -> Self {
        Self {
            mesh,
            kind: DrawCommandKind::Draw,
            position,
            size,
            color,
            clip: None,
        }
    }

    /// A plain, untinted draw covering `rect`.
    pub fn from_rect(mesh: MeshHandle, rect: Rect) -> Self {
        Self::new(mesh, rect.origin(), rect.size(), Color::WHITE)
    }

    /// Set the placement mode.
    pub fn with_kind(mut self, kind: DrawCommandKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the tint color.
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Restrict the draw to `clip`.
    pub fn with_clip(mut self, clip: Rect) -> Self {
        self.clip = Some(clip);
        self
    }

    /// Destination rectangle before trim and clipping.
    pub fn dst_rect(&self) -> Rect {
        Rect::from_origin_size(self.position, self.size)
    }
}
