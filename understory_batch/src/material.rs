// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reference-counted material registry and the per-pass material position cache.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;

use crate::sprite::Sprite;
use crate::types::MaterialId;

/// Identity of a sprite material (texture plus blend state) as seen by the sprite system.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpriteMaterialId(pub u32);

/// A sprite material and whether it renders fully opaque.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SpriteMaterialInfo {
    /// Material identity.
    pub id: SpriteMaterialId,
    /// Whether every pixel drawn with this material is opaque.
    pub is_opaque: bool,
}

impl SpriteMaterialInfo {
    /// Create a material description.
    pub const fn new(id: SpriteMaterialId, is_opaque: bool) -> Self {
        Self { id, is_opaque }
    }
}

/// Stable, reference-counted handle to a batch material.
///
/// Handles are generational: once the last reference is released the slot may be reused, and
/// the stale handle no longer resolves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MaterialHandle(u32, u32);

impl MaterialHandle {
    /// The reserved default material. It exists for the lifetime of the lookup and is never
    /// released.
    pub const DEFAULT: Self = Self(0, 1);

    const fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug)]
struct MaterialEntry {
    info: SpriteMaterialInfo,
    ref_count: u32,
}

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    entry: Option<MaterialEntry>,
}

/// Registry mapping sprite materials to batch material handles.
///
/// The dense slot index of a handle doubles as its [`MaterialId`]; slot 0 is the default
/// material.
pub struct MaterialLookup {
    slots: Vec<Slot>,
    free_list: Vec<usize>,
    by_sprite_material: BTreeMap<SpriteMaterialId, MaterialHandle>,
    opaque_count: u32,
    transparent_count: u32,
}

impl fmt::Debug for MaterialLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaterialLookup")
            .field("material_count", &self.slots.len())
            .field("opaque_count", &self.opaque_count)
            .field("transparent_count", &self.transparent_count)
            .finish_non_exhaustive()
    }
}

impl MaterialLookup {
    /// Create a lookup holding only the default material.
    pub fn new(default_material: SpriteMaterialInfo) -> Self {
        let mut lookup = Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            by_sprite_material: BTreeMap::new(),
            opaque_count: 0,
            transparent_count: 0,
        };
        let handle = lookup.insert(default_material);
        debug_assert_eq!(
            handle,
            MaterialHandle::DEFAULT,
            "default material must occupy the first slot"
        );
        lookup
    }

    /// Acquire a reference to material `material_index` of `sprite`.
    ///
    /// An out-of-range index logs a warning and yields the default handle.
    pub fn acquire(&mut self, sprite: &Sprite, material_index: u32) -> MaterialHandle {
        match sprite.material(material_index) {
            Some(info) => self.acquire_info(info),
            None => {
                log::warn!(
                    "material index {material_index} out of range for a sprite with {} materials, using the default material",
                    sprite.material_count()
                );
                MaterialHandle::DEFAULT
            }
        }
    }

    /// Acquire a reference to `info`, creating a material on first use.
    pub fn acquire_info(&mut self, info: SpriteMaterialInfo) -> MaterialHandle {
        if let Some(&handle) = self.by_sprite_material.get(&info.id) {
            if let Some(entry) = self.entry_mut(handle)
                && handle != MaterialHandle::DEFAULT
            {
                entry.ref_count += 1;
            }
            return handle;
        }
        self.insert(info)
    }

    /// Release a reference obtained from [`acquire`](Self::acquire).
    ///
    /// The material is destroyed when its last reference goes. Releasing the default handle is
    /// a successful no-op; releasing a stale handle logs a warning and returns `false`.
    pub fn release(&mut self, handle: MaterialHandle) -> bool {
        if handle == MaterialHandle::DEFAULT {
            return true;
        }
        let Some(entry) = self.entry_mut(handle) else {
            log::warn!("release of unknown material handle {handle:?}");
            return false;
        };
        entry.ref_count -= 1;
        if entry.ref_count > 0 {
            return true;
        }
        let info = entry.info;
        self.slots[handle.idx()].entry = None;
        self.free_list.push(handle.idx());
        self.by_sprite_material.remove(&info.id);
        if info.is_opaque {
            self.opaque_count -= 1;
        } else {
            self.transparent_count -= 1;
        }
        true
    }

    /// Non-owning lookup of material `material_index` of `sprite`.
    ///
    /// Returns `None` if the material was never acquired, or (with a warning) if the index is
    /// out of range.
    pub fn try_get_handle(&self, sprite: &Sprite, material_index: u32) -> Option<MaterialHandle> {
        let Some(info) = sprite.material(material_index) else {
            log::warn!(
                "material index {material_index} out of range for a sprite with {} materials",
                sprite.material_count()
            );
            return None;
        };
        self.by_sprite_material.get(&info.id).copied()
    }

    /// Dense id of `handle` for the current pass.
    ///
    /// Stale handles map to [`MaterialId::DEFAULT`].
    #[inline]
    pub fn material_id(&self, handle: MaterialHandle) -> MaterialId {
        debug_assert!(
            self.entry(handle).is_some(),
            "material id requested for stale handle {handle:?}"
        );
        if self.entry(handle).is_none() {
            return MaterialId::DEFAULT;
        }
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Material slots are addressed by u32 handles."
        )]
        let id = MaterialId(handle.idx() as u32);
        id
    }

    /// Description of the material behind `handle`.
    pub fn material_info(&self, handle: MaterialHandle) -> Option<SpriteMaterialInfo> {
        self.entry(handle).map(|e| e.info)
    }

    /// Number of outstanding references to `handle` (zero if stale).
    pub fn ref_count(&self, handle: MaterialHandle) -> u32 {
        self.entry(handle).map_or(0, |e| e.ref_count)
    }

    /// Upper bound (exclusive) of every [`MaterialId`] handed out; use it to size per-material
    /// tables.
    pub fn material_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of live opaque materials, the default included.
    pub fn opaque_count(&self) -> u32 {
        self.opaque_count
    }

    /// Number of live transparent materials, the default included.
    pub fn transparent_count(&self) -> u32 {
        self.transparent_count
    }

    fn insert(&mut self, info: SpriteMaterialInfo) -> MaterialHandle {
        let entry = MaterialEntry { info, ref_count: 1 };
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let slot = &mut self.slots[idx];
            slot.generation += 1;
            slot.entry = Some(entry);
            (idx, slot.generation)
        } else {
            self.slots.push(Slot {
                generation: 1,
                entry: Some(entry),
            });
            (self.slots.len() - 1, 1)
        };
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Material slots are addressed by u32 handles."
        )]
        let handle = MaterialHandle(idx as u32, generation);
        self.by_sprite_material.insert(info.id, handle);
        if info.is_opaque {
            self.opaque_count += 1;
        } else {
            self.transparent_count += 1;
        }
        handle
    }

    fn entry(&self, handle: MaterialHandle) -> Option<&MaterialEntry> {
        self.slots
            .get(handle.idx())
            .filter(|s| s.generation == handle.1)
            .and_then(|s| s.entry.as_ref())
    }

    fn entry_mut(&mut self, handle: MaterialHandle) -> Option<&mut MaterialEntry> {
        self.slots
            .get_mut(handle.idx())
            .filter(|s| s.generation == handle.1)
            .and_then(|s| s.entry.as_mut())
    }
}

/// Position value marking a material not seen yet in the current pass.
const NOT_SEEN: u32 = u32::MAX;

/// Per-material "last known position" table used during one reorder pass.
///
/// Every entry starts out invalid at the start of a pass.
#[derive(Clone, Debug, Default)]
pub struct MaterialCache {
    positions: Vec<u32>,
}

impl MaterialCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resize to `material_count` entries and mark every entry invalid.
    ///
    /// The backing storage only grows.
    pub fn reset(&mut self, material_count: usize) {
        self.positions.clear();
        self.positions.resize(material_count, NOT_SEEN);
    }

    /// Last known position of `material`, or `None` if it has not been seen in this pass.
    #[inline]
    pub fn get(&self, material: MaterialId) -> Option<u32> {
        self.positions
            .get(material.index())
            .copied()
            .filter(|&p| p != NOT_SEEN)
    }

    /// Record `position` as the last known position of `material`.
    #[inline]
    pub fn set(&mut self, material: MaterialId, position: u32) {
        debug_assert!(
            material.index() < self.positions.len(),
            "material {material:?} outside a cache of {} entries",
            self.positions.len()
        );
        debug_assert!(position != NOT_SEEN, "position collides with the sentinel");
        if let Some(slot) = self.positions.get_mut(material.index()) {
            *slot = position;
        }
    }

    /// Number of materials covered.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the cache covers no materials.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite::Sprite;

    fn info(id: u32, is_opaque: bool) -> SpriteMaterialInfo {
        SpriteMaterialInfo::new(SpriteMaterialId(id), is_opaque)
    }

    #[test]
    fn default_material_is_slot_zero() {
        let lookup = MaterialLookup::new(info(0, true));
        assert_eq!(lookup.material_count(), 1);
        assert_eq!(lookup.material_id(MaterialHandle::DEFAULT), MaterialId::DEFAULT);
        assert_eq!(lookup.opaque_count(), 1);
        assert_eq!(lookup.transparent_count(), 0);
    }

    #[test]
    fn acquire_shares_and_release_destroys() {
        let mut lookup = MaterialLookup::new(info(0, true));
        let sprite = Sprite::image(info(7, false));
        let a = lookup.acquire(&sprite, 0);
        let b = lookup.acquire(&sprite, 0);
        assert_eq!(a, b);
        assert_eq!(lookup.ref_count(a), 2);
        assert_eq!(lookup.transparent_count(), 1);
        assert_eq!(lookup.material_id(a), MaterialId(1));

        assert!(lookup.release(a));
        assert_eq!(lookup.try_get_handle(&sprite, 0), Some(a));
        assert!(lookup.release(b));
        assert_eq!(lookup.try_get_handle(&sprite, 0), None);
        assert_eq!(lookup.transparent_count(), 0);
        assert!(lookup.material_info(a).is_none());
        // Stale handles are rejected.
        assert!(!lookup.release(a));
    }

    #[test]
    fn freed_slot_is_reused_with_new_generation() {
        let mut lookup = MaterialLookup::new(info(0, true));
        let a = lookup.acquire_info(info(1, true));
        lookup.release(a);
        let b = lookup.acquire_info(info(2, false));
        assert_ne!(a, b);
        assert_eq!(lookup.material_id(b), MaterialId(1));
        assert_eq!(lookup.material_count(), 2);
        assert_eq!(lookup.ref_count(a), 0);
    }

    #[test]
    fn default_handle_is_never_released() {
        let mut lookup = MaterialLookup::new(info(0, true));
        assert!(lookup.release(MaterialHandle::DEFAULT));
        assert!(lookup.release(MaterialHandle::DEFAULT));
        assert!(lookup.material_info(MaterialHandle::DEFAULT).is_some());
        // Acquiring the default material's identity hands back the default handle.
        assert_eq!(lookup.acquire_info(info(0, true)), MaterialHandle::DEFAULT);
        assert_eq!(lookup.ref_count(MaterialHandle::DEFAULT), 1);
    }

    #[test]
    fn out_of_range_index_falls_back_to_default() {
        let mut lookup = MaterialLookup::new(info(0, true));
        let sprite = Sprite::image(info(3, true));
        assert_eq!(lookup.acquire(&sprite, 4), MaterialHandle::DEFAULT);
        assert_eq!(lookup.try_get_handle(&sprite, 4), None);
        assert_eq!(lookup.material_count(), 1);
    }

    #[test]
    fn cache_reset_marks_everything_invalid() {
        let mut cache = MaterialCache::new();
        cache.reset(3);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(MaterialId(2)), None);
        cache.set(MaterialId(2), 0);
        assert_eq!(cache.get(MaterialId(2)), Some(0));
        // Positions are span indices and may exceed the material count.
        cache.set(MaterialId(1), 3);
        assert_eq!(cache.get(MaterialId(1)), Some(3));
        cache.reset(4);
        assert_eq!(cache.get(MaterialId(2)), None);
        assert_eq!(cache.get(MaterialId(9)), None);
    }
}
