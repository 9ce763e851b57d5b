// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mesh registry: per-mesh render info, material references and capacity accounting.
//!
//! The [`MeshManager`] owns the [`MaterialLookup`] and answers the per-command [`MeshQuery`]
//! the preprocessors run.

use alloc::vec::Vec;
use core::fmt;

use kurbo::Insets;

use crate::error::{MAX_INDEXED_VERTEX_CAPACITY, MeshError};
use crate::material::{MaterialHandle, MaterialLookup, SpriteMaterialInfo};
use crate::sprite::{NineSliceTransparency, Sprite, SpriteKind};
use crate::types::MaterialId;

/// The kind of mesh a handle refers to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MeshKind {
    /// Placeholder for a sprite that cannot be represented; never drawn.
    Dummy = 0,
    /// Non-indexed image.
    BasicImage = 1,
    /// Non-indexed nine-slice.
    BasicNineSlice = 2,
    /// Indexed image.
    Image = 3,
    /// Indexed nine-slice.
    NineSlice = 4,
    /// Nine-slice with separate opaque and transparent materials.
    OptimizedNineSlice = 5,
    /// Text.
    Font = 6,
}

impl MeshKind {
    const fn from_bits(bits: u32) -> Option<Self> {
        Some(match bits {
            0 => Self::Dummy,
            1 => Self::BasicImage,
            2 => Self::BasicNineSlice,
            3 => Self::Image,
            4 => Self::NineSlice,
            5 => Self::OptimizedNineSlice,
            6 => Self::Font,
            _ => return None,
        })
    }

    /// Whether draws of this kind are inset by the sprite trim margin.
    pub const fn uses_trim_margin(self) -> bool {
        matches!(self, Self::NineSlice | Self::OptimizedNineSlice)
    }
}

const KIND_SHIFT: u32 = 24;
const SLOT_MASK: u32 = (1 << KIND_SHIFT) - 1;

/// Handle to a mesh owned by a [`MeshManager`].
///
/// The mesh kind is encoded in the high bits so a command can be dispatched without touching
/// the mesh record. A generation guards against slot reuse.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MeshHandle {
    value: u32,
    generation: u32,
}

impl MeshHandle {
    /// Rebuild a handle from its raw parts, as returned by [`MeshHandle::to_raw`].
    pub const fn from_raw(value: u32, generation: u32) -> Self {
        Self { value, generation }
    }

    /// The raw `(value, generation)` pair.
    pub const fn to_raw(self) -> (u32, u32) {
        (self.value, self.generation)
    }

    /// The encoded mesh kind, or `None` if the kind bits are unknown.
    pub const fn kind(self) -> Option<MeshKind> {
        MeshKind::from_bits(self.value >> KIND_SHIFT)
    }

    const fn new(kind: MeshKind, slot: u32, generation: u32) -> Self {
        Self {
            value: ((kind as u32) << KIND_SHIFT) | (slot & SLOT_MASK),
            generation,
        }
    }

    const fn slot(self) -> usize {
        (self.value & SLOT_MASK) as usize
    }
}

/// Vertex and index capacity.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Capacity {
    /// Vertex capacity.
    pub vertex_capacity: u32,
    /// Index capacity.
    pub index_capacity: u32,
}

impl Capacity {
    const fn new(vertex_capacity: u32, index_capacity: u32) -> Self {
        Self {
            vertex_capacity,
            index_capacity,
        }
    }

    fn at_least(self, vertex_capacity: u32, index_capacity: u32) -> Self {
        Self {
            vertex_capacity: self.vertex_capacity.max(vertex_capacity),
            index_capacity: self.index_capacity.max(index_capacity),
        }
    }
}

/// Running vertex and index totals over all live meshes.
///
/// Kept wider than [`Capacity`] so any number of meshes at full `u32` capacity sums exactly.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CapacityTotals {
    /// Total vertex capacity.
    pub vertex_capacity: u64,
    /// Total index capacity.
    pub index_capacity: u64,
}

impl CapacityTotals {
    #[cfg(test)]
    const fn new(vertex_capacity: u64, index_capacity: u64) -> Self {
        Self {
            vertex_capacity,
            index_capacity,
        }
    }

    fn add(&mut self, capacity: Capacity) {
        self.vertex_capacity += u64::from(capacity.vertex_capacity);
        self.index_capacity += u64::from(capacity.index_capacity);
    }

    fn sub(&mut self, capacity: Capacity) {
        debug_assert!(
            self.vertex_capacity >= u64::from(capacity.vertex_capacity)
                && self.index_capacity >= u64::from(capacity.index_capacity),
            "capacity totals out of sync"
        );
        self.vertex_capacity = self
            .vertex_capacity
            .saturating_sub(u64::from(capacity.vertex_capacity));
        self.index_capacity = self
            .index_capacity
            .saturating_sub(u64::from(capacity.index_capacity));
    }
}

mod min_capacity {
    use super::Capacity;

    pub(super) const DUMMY: Capacity = Capacity::new(1, 1);
    pub(super) const IMAGE: Capacity = Capacity::new(4, 6);
    pub(super) const NINE_SLICE: Capacity = Capacity::new(4 * 4, 18 * 4);
    pub(super) const FONT: Capacity = Capacity::new(4 * 128, 6 * 128);
}

/// Material ids and geometry info of a mesh, as needed to classify one draw.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ResolvedMesh {
    /// Nothing to draw.
    Skip,
    /// A mesh drawn with one material.
    Single {
        /// Dense material id.
        material: MaterialId,
        /// Whether the material is opaque.
        is_opaque: bool,
        /// Inset applied to the destination rectangle.
        trim_margin: Insets,
    },
    /// A mesh split into an opaque and a transparent part.
    Split {
        /// Material of the opaque parts.
        opaque: MaterialId,
        /// Material of the transparent parts.
        transparent: MaterialId,
        /// Parts that are present.
        parts: NineSliceTransparency,
        /// Inset applied to the destination rectangle.
        trim_margin: Insets,
    },
}

/// Read-only mesh query used by the preprocessors.
///
/// Must be side-effect free and stable for the duration of one processing pass.
pub trait MeshQuery {
    /// Resolve `mesh`; `None` for unknown kinds and stale handles.
    fn resolve(&self, mesh: MeshHandle) -> Option<ResolvedMesh>;

    /// Exclusive upper bound of the material ids [`resolve`](Self::resolve) can return.
    fn material_count(&self) -> usize;
}

#[derive(Clone, Debug)]
enum MeshMaterials {
    Single {
        handle: MaterialHandle,
        sprite_index: u32,
        is_opaque: bool,
    },
    Split {
        opaque: MaterialHandle,
        transparent: MaterialHandle,
    },
}

#[derive(Clone, Debug)]
struct MeshRecord {
    kind: MeshKind,
    basic: bool,
    sprite: Sprite,
    materials: MeshMaterials,
    capacity: Capacity,
    glyph_count: u32,
}

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    record: Option<MeshRecord>,
}

/// Owns meshes, their material references and the running capacity totals.
pub struct MeshManager {
    materials: MaterialLookup,
    slots: Vec<Slot>,
    free_list: Vec<usize>,
    live: usize,
    capacity: CapacityTotals,
}

impl fmt::Debug for MeshManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeshManager")
            .field("materials", &self.materials)
            .field("mesh_count", &self.live)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl MeshManager {
    /// Create a manager whose lookup falls back to `default_material`.
    pub fn new(default_material: SpriteMaterialInfo) -> Self {
        Self {
            materials: MaterialLookup::new(default_material),
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
            capacity: CapacityTotals::default(),
        }
    }

    /// The material registry.
    pub fn material_lookup(&self) -> &MaterialLookup {
        &self.materials
    }

    /// Total capacity of all live meshes.
    pub fn capacity(&self) -> CapacityTotals {
        self.capacity
    }

    /// Number of live meshes.
    pub fn mesh_count(&self) -> usize {
        self.live
    }

    /// Capacity of one mesh.
    pub fn mesh_capacity(&self, mesh: MeshHandle) -> Option<Capacity> {
        self.record(mesh).map(|r| r.capacity)
    }

    /// Number of glyphs last set on a font mesh.
    pub fn glyph_count(&self, mesh: MeshHandle) -> Option<u32> {
        self.record(mesh)
            .filter(|r| r.kind == MeshKind::Font)
            .map(|r| r.glyph_count)
    }

    /// Whether `mesh` refers to a live mesh.
    pub fn is_alive(&self, mesh: MeshHandle) -> bool {
        self.record(mesh).is_some()
    }

    /// Create a non-indexed mesh using material 0 of `sprite`.
    ///
    /// Sprites without a basic form get a [`MeshKind::Dummy`] mesh and a warning.
    pub fn create_basic_mesh(&mut self, sprite: &Sprite, vertex_capacity: u32) -> MeshHandle {
        let (kind, min) = match sprite.kind() {
            SpriteKind::BasicImage => (MeshKind::BasicImage, min_capacity::IMAGE),
            SpriteKind::BasicNineSlice => (MeshKind::BasicNineSlice, min_capacity::NINE_SLICE),
            other => {
                log::warn!("basic mesh requested for {other:?} sprite, which has no basic form");
                (MeshKind::Dummy, min_capacity::DUMMY)
            }
        };
        let materials = self.acquire_single(sprite, 0);
        let capacity = Capacity::new(min.vertex_capacity.max(vertex_capacity), 0);
        self.insert(MeshRecord {
            kind,
            basic: true,
            sprite: sprite.clone(),
            materials,
            capacity,
            glyph_count: 0,
        })
    }

    /// Create an indexed mesh drawing `sprite` with material `material_index`.
    ///
    /// Capacities are raised to the minimum of the mesh kind. Optimized nine-slices always
    /// reference both of their materials and only accept `material_index == 0`.
    pub fn create_mesh(
        &mut self,
        sprite: &Sprite,
        material_index: u32,
        vertex_capacity: u32,
        index_capacity: u32,
    ) -> Result<MeshHandle, MeshError> {
        if vertex_capacity > MAX_INDEXED_VERTEX_CAPACITY {
            return Err(MeshError::VertexCapacityExceeded {
                requested: vertex_capacity,
            });
        }
        let (kind, min) = match sprite.kind() {
            SpriteKind::Image => (MeshKind::Image, min_capacity::IMAGE),
            SpriteKind::NineSlice => (MeshKind::NineSlice, min_capacity::NINE_SLICE),
            SpriteKind::OptimizedNineSlice => {
                let parts = sprite.transparency().part_count();
                (
                    MeshKind::OptimizedNineSlice,
                    Capacity::new(
                        min_capacity::NINE_SLICE.vertex_capacity * parts,
                        min_capacity::NINE_SLICE.index_capacity * parts,
                    ),
                )
            }
            SpriteKind::Font => (MeshKind::Font, min_capacity::FONT),
            other @ (SpriteKind::BasicImage | SpriteKind::BasicNineSlice) => {
                log::warn!("indexed mesh requested for {other:?} sprite, which has no indexed form");
                (MeshKind::Dummy, min_capacity::DUMMY)
            }
        };
        let materials = if kind == MeshKind::OptimizedNineSlice {
            if material_index != 0 {
                return Err(MeshError::UnsupportedMaterialIndex {
                    index: material_index,
                });
            }
            if sprite.material_count() < 2 {
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "A sprite with fewer than two materials has a tiny count."
                )]
                let found = sprite.material_count() as u32;
                return Err(MeshError::MissingMaterials { required: 2, found });
            }
            MeshMaterials::Split {
                opaque: self.materials.acquire(sprite, 0),
                transparent: self.materials.acquire(sprite, 1),
            }
        } else {
            self.acquire_single(sprite, material_index)
        };
        let capacity = min.at_least(vertex_capacity, index_capacity);
        Ok(self.insert(MeshRecord {
            kind,
            basic: false,
            sprite: sprite.clone(),
            materials,
            capacity,
            glyph_count: 0,
        }))
    }

    /// Destroy `mesh`, releasing its materials and capacity.
    ///
    /// Returns `false` if the handle is stale.
    pub fn destroy_mesh(&mut self, mesh: MeshHandle) -> bool {
        if mesh.kind().is_none() {
            log::warn!("destroy of mesh handle {mesh:?} with unknown kind");
            return false;
        }
        let Some(idx) = self.live_slot(mesh) else {
            return false;
        };
        let Some(record) = self.slots[idx].record.take() else {
            return false;
        };
        self.free_list.push(idx);
        self.live -= 1;
        self.capacity.sub(record.capacity);
        self.release_materials(&record.materials);
        log::trace!("destroyed {:?} mesh {mesh:?}", record.kind);
        debug_assert!(self.sanity_check(), "capacity totals out of sync");
        true
    }

    /// Replace the sprite of `mesh`. The mesh is recreated with the same material index and
    /// capacity, so a new handle is returned and `mesh` becomes stale.
    pub fn set_mesh_sprite(
        &mut self,
        mesh: MeshHandle,
        sprite: &Sprite,
    ) -> Result<MeshHandle, MeshError> {
        let record = self.record(mesh).ok_or(MeshError::InvalidHandle(mesh))?;
        let capacity = record.capacity;
        let basic = record.basic;
        let material_index = match record.materials {
            MeshMaterials::Single { sprite_index, .. } => sprite_index,
            MeshMaterials::Split { .. } => 0,
        };
        // Create first so shared materials keep their references across the swap.
        let replacement = if basic {
            self.create_basic_mesh(sprite, capacity.vertex_capacity)
        } else if sprite.kind() == SpriteKind::OptimizedNineSlice {
            self.create_mesh(sprite, 0, capacity.vertex_capacity, capacity.index_capacity)?
        } else {
            self.create_mesh(
                sprite,
                material_index,
                capacity.vertex_capacity,
                capacity.index_capacity,
            )?
        };
        self.destroy_mesh(mesh);
        Ok(replacement)
    }

    /// Set the text of a font mesh, growing its capacity to fit.
    pub fn set_mesh_text(&mut self, mesh: MeshHandle, text: &str) -> Result<(), MeshError> {
        let record = self.record(mesh).ok_or(MeshError::InvalidHandle(mesh))?;
        if record.kind != MeshKind::Font {
            return Err(MeshError::NotAFont(mesh));
        }
        let glyphs = text.chars().filter(|c| !c.is_whitespace()).count();
        let glyphs = u32::try_from(glyphs).unwrap_or(u32::MAX);
        self.ensure_capacity(
            mesh,
            glyphs.saturating_mul(4),
            glyphs.saturating_mul(6),
        )?;
        if let Some(idx) = self.live_slot(mesh)
            && let Some(record) = self.slots[idx].record.as_mut()
        {
            record.glyph_count = glyphs;
        }
        Ok(())
    }

    /// Grow the capacity of `mesh`; capacities never shrink.
    ///
    /// An indexed mesh cannot grow past 0xFFFF vertices, and a basic mesh cannot gain index
    /// capacity.
    pub fn ensure_capacity(
        &mut self,
        mesh: MeshHandle,
        vertex_capacity: u32,
        index_capacity: u32,
    ) -> Result<(), MeshError> {
        let idx = self.live_slot(mesh).ok_or(MeshError::InvalidHandle(mesh))?;
        let Some(record) = self.slots[idx].record.as_mut() else {
            return Err(MeshError::InvalidHandle(mesh));
        };
        if record.basic && index_capacity > 0 {
            return Err(MeshError::IndexCapacityOnBasicMesh(mesh));
        }
        if !record.basic && vertex_capacity > MAX_INDEXED_VERTEX_CAPACITY {
            return Err(MeshError::VertexCapacityExceeded {
                requested: vertex_capacity,
            });
        }
        let old = record.capacity;
        record.capacity = old.at_least(vertex_capacity, index_capacity);
        let new = record.capacity;
        self.capacity.sub(old);
        self.capacity.add(new);
        debug_assert!(self.sanity_check(), "capacity totals out of sync");
        Ok(())
    }

    /// Check the running totals against the live meshes.
    pub fn sanity_check(&self) -> bool {
        let mut sum = CapacityTotals::default();
        let mut live = 0;
        for record in self.slots.iter().filter_map(|s| s.record.as_ref()) {
            sum.add(record.capacity);
            live += 1;
        }
        sum == self.capacity && live == self.live
    }

    fn acquire_single(&mut self, sprite: &Sprite, material_index: u32) -> MeshMaterials {
        let handle = self.materials.acquire(sprite, material_index);
        let is_opaque = self
            .materials
            .material_info(handle)
            .is_some_and(|info| info.is_opaque);
        MeshMaterials::Single {
            handle,
            sprite_index: material_index,
            is_opaque,
        }
    }

    fn release_materials(&mut self, materials: &MeshMaterials) {
        match *materials {
            MeshMaterials::Single { handle, .. } => {
                self.materials.release(handle);
            }
            MeshMaterials::Split {
                opaque,
                transparent,
            } => {
                self.materials.release(opaque);
                self.materials.release(transparent);
            }
        }
    }

    fn insert(&mut self, record: MeshRecord) -> MeshHandle {
        let kind = record.kind;
        self.capacity.add(record.capacity);
        self.live += 1;
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let slot = &mut self.slots[idx];
            slot.generation += 1;
            slot.record = Some(record);
            (idx, slot.generation)
        } else {
            self.slots.push(Slot {
                generation: 1,
                record: Some(record),
            });
            (self.slots.len() - 1, 1)
        };
        debug_assert!(idx <= SLOT_MASK as usize, "mesh slot space exhausted");
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Mesh slots are limited to 24 bits by the handle encoding."
        )]
        let handle = MeshHandle::new(kind, idx as u32, generation);
        log::trace!("created {kind:?} mesh {handle:?}");
        debug_assert!(self.sanity_check(), "capacity totals out of sync");
        handle
    }

    fn live_slot(&self, mesh: MeshHandle) -> Option<usize> {
        let idx = mesh.slot();
        let slot = self.slots.get(idx)?;
        let record = slot.record.as_ref()?;
        (slot.generation == mesh.generation && Some(record.kind) == mesh.kind()).then_some(idx)
    }

    fn record(&self, mesh: MeshHandle) -> Option<&MeshRecord> {
        self.live_slot(mesh)
            .and_then(|idx| self.slots[idx].record.as_ref())
    }
}

impl MeshQuery for MeshManager {
    fn resolve(&self, mesh: MeshHandle) -> Option<ResolvedMesh> {
        if mesh.kind()? == MeshKind::Dummy {
            return Some(ResolvedMesh::Skip);
        }
        let record = self.record(mesh)?;
        let trim_margin = if record.kind.uses_trim_margin() {
            record.sprite.trim_margin()
        } else {
            Insets::uniform(0.0)
        };
        Some(match record.materials {
            MeshMaterials::Single {
                handle, is_opaque, ..
            } => ResolvedMesh::Single {
                material: self.materials.material_id(handle),
                is_opaque,
                trim_margin,
            },
            MeshMaterials::Split {
                opaque,
                transparent,
            } => ResolvedMesh::Split {
                opaque: self.materials.material_id(opaque),
                transparent: self.materials.material_id(transparent),
                parts: record.sprite.transparency(),
                trim_margin,
            },
        })
    }

    fn material_count(&self) -> usize {
        self.materials.material_count()
    }
}

impl Drop for MeshManager {
    fn drop(&mut self) {
        if self.live > 0 {
            log::warn!("{} meshes still allocated", self.live);
        }
        for idx in 0..self.slots.len() {
            if let Some(record) = self.slots[idx].record.take() {
                self.release_materials(&record.materials);
            }
        }
        self.live = 0;
        self.capacity = CapacityTotals::default();
    }
}
