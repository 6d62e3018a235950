//! CPU-side sprite storage.
//!
//! Sprites live in parallel per-attribute arrays that mirror the GPU
//! storage buffers one-to-one, so syncing an attribute is a single
//! contiguous upload. Removal never shifts attribute data: the index is
//! pushed on a free list and its generation bumps, which
//! invalidates outstanding [`SpriteId`]s for that index. Draw order is
//! a separate dense list of live indices.

use std::num::NonZeroU64;

use glam::{Vec2, Vec3};

use super::{SpriteError, SpriteResult};

bitflags::bitflags! {
    /// Attribute arrays touched since the last GPU sync.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub(crate) struct DirtyFlags: u32 {
        const POSITIONS = 1 << 0;
        const SIZES     = 1 << 1;
        const ANGLES    = 1 << 2;
        const COLORS    = 1 << 3;
        const SLOTS     = 1 << 4;
        const ORDER     = 1 << 5;
    }
}

/// Handle to a sprite in a [`SpriteList`](super::SpriteList).
///
/// Packs a slot index and a generation counter; ids for removed sprites
/// stop resolving even after the slot is reused. `Option<SpriteId>` is
/// the same size as `SpriteId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpriteId(NonZeroU64);

static_assertions::assert_eq_size!(Option<SpriteId>, u64);

impl SpriteId {
    fn new(index: u32, generation: u32) -> Self {
        let bits = (u64::from(generation) << 32) | (u64::from(index) + 1);
        Self(NonZeroU64::new(bits).expect("index + 1 is nonzero"))
    }

    fn index(self) -> u32 {
        (self.0.get() as u32) - 1
    }

    fn generation(self) -> u32 {
        (self.0.get() >> 32) as u32
    }
}

/// Dense attribute arrays plus the draw-order permutation.
#[derive(Debug, Default)]
pub(crate) struct SpriteStore {
    // xyz plus one pad float: `array<vec3<f32>>` has a 16-byte stride.
    positions: Vec<[f32; 4]>,
    sizes: Vec<[f32; 2]>,
    angles: Vec<f32>,
    colors: Vec<u32>,
    slots: Vec<u32>,

    generations: Vec<u32>,
    alive: Vec<bool>,
    free: Vec<u32>,

    /// Live sprite indices in draw order, back-to-front.
    order: Vec<u32>,
    /// Position of each index within `order`; stale for dead indices.
    order_index: Vec<u32>,

    dirty: DirtyFlags,
}

impl SpriteStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of live sprites.
    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Length of the attribute arrays, dead entries included. This is
    /// what the GPU attribute buffers must hold.
    pub(crate) fn attribute_len(&self) -> usize {
        self.positions.len()
    }

    pub(crate) fn create(
        &mut self,
        position: Vec3,
        size: Vec2,
        angle: f32,
        color: u32,
        slot: u32,
    ) -> SpriteId {
        let index = match self.free.pop() {
            Some(index) => {
                let i = index as usize;
                self.positions[i] = [position.x, position.y, position.z, 0.0];
                self.sizes[i] = size.to_array();
                self.angles[i] = angle;
                self.colors[i] = color;
                self.slots[i] = slot;
                self.alive[i] = true;
                index
            }
            None => {
                self.positions
                    .push([position.x, position.y, position.z, 0.0]);
                self.sizes.push(size.to_array());
                self.angles.push(angle);
                self.colors.push(color);
                self.slots.push(slot);
                self.generations.push(0);
                self.alive.push(true);
                self.order_index.push(0);
                (self.positions.len() - 1) as u32
            }
        };

        self.order_index[index as usize] = self.order.len() as u32;
        self.order.push(index);
        self.dirty |= DirtyFlags::all();

        SpriteId::new(index, self.generations[index as usize])
    }

    /// Remove a sprite. The draw order fills the gap by moving its last
    /// entry into place, so removal reorders the two sprites involved
    /// but nothing else.
    pub(crate) fn remove(&mut self, id: SpriteId) -> SpriteResult<()> {
        let index = self.check(id)?;
        let i = index as usize;

        self.alive[i] = false;
        self.generations[i] = self.generations[i].wrapping_add(1);
        self.free.push(index);

        let pos = self.order_index[i] as usize;
        self.order.swap_remove(pos);
        if pos < self.order.len() {
            let moved = self.order[pos] as usize;
            self.order_index[moved] = pos as u32;
        }
        self.dirty |= DirtyFlags::ORDER;
        Ok(())
    }

    /// Remove every sprite, invalidating all outstanding ids.
    ///
    /// Attribute arrays keep their length; the indices are recycled
    /// through the free list, lowest first.
    pub(crate) fn clear(&mut self) {
        self.free.clear();
        for i in (0..self.alive.len()).rev() {
            if self.alive[i] {
                self.alive[i] = false;
                self.generations[i] = self.generations[i].wrapping_add(1);
            }
            self.free.push(i as u32);
        }
        self.order.clear();
        self.dirty |= DirtyFlags::ORDER;
    }

    pub(crate) fn contains(&self, id: SpriteId) -> bool {
        self.check(id).is_ok()
    }

    /// Resolve an id to its index, rejecting removed and reused slots.
    fn check(&self, id: SpriteId) -> SpriteResult<u32> {
        let i = id.index() as usize;
        if i < self.alive.len() && self.alive[i] && self.generations[i] == id.generation() {
            Ok(id.index())
        } else {
            Err(SpriteError::StaleId(id))
        }
    }

    pub(crate) fn position(&self, id: SpriteId) -> SpriteResult<Vec3> {
        let [x, y, z, _] = self.positions[self.check(id)? as usize];
        Ok(Vec3::new(x, y, z))
    }

    pub(crate) fn set_position(&mut self, id: SpriteId, position: Vec3) -> SpriteResult<()> {
        let i = self.check(id)? as usize;
        self.positions[i] = [position.x, position.y, position.z, 0.0];
        self.dirty |= DirtyFlags::POSITIONS;
        Ok(())
    }

    pub(crate) fn size(&self, id: SpriteId) -> SpriteResult<Vec2> {
        Ok(Vec2::from(self.sizes[self.check(id)? as usize]))
    }

    pub(crate) fn set_size(&mut self, id: SpriteId, size: Vec2) -> SpriteResult<()> {
        let i = self.check(id)? as usize;
        self.sizes[i] = size.to_array();
        self.dirty |= DirtyFlags::SIZES;
        Ok(())
    }

    pub(crate) fn angle(&self, id: SpriteId) -> SpriteResult<f32> {
        Ok(self.angles[self.check(id)? as usize])
    }

    pub(crate) fn set_angle(&mut self, id: SpriteId, angle: f32) -> SpriteResult<()> {
        let i = self.check(id)? as usize;
        self.angles[i] = angle;
        self.dirty |= DirtyFlags::ANGLES;
        Ok(())
    }

    pub(crate) fn color(&self, id: SpriteId) -> SpriteResult<u32> {
        Ok(self.colors[self.check(id)? as usize])
    }

    pub(crate) fn set_color(&mut self, id: SpriteId, color: u32) -> SpriteResult<()> {
        let i = self.check(id)? as usize;
        self.colors[i] = color;
        self.dirty |= DirtyFlags::COLORS;
        Ok(())
    }

    pub(crate) fn slot(&self, id: SpriteId) -> SpriteResult<u32> {
        Ok(self.slots[self.check(id)? as usize])
    }

    pub(crate) fn set_slot(&mut self, id: SpriteId, slot: u32) -> SpriteResult<()> {
        let i = self.check(id)? as usize;
        self.slots[i] = slot;
        self.dirty |= DirtyFlags::SLOTS;
        Ok(())
    }

    /// Replace the draw order with an explicit permutation of every
    /// live sprite.
    pub(crate) fn set_draw_order(&mut self, ids: &[SpriteId]) -> SpriteResult<()> {
        if ids.len() != self.order.len() {
            return Err(SpriteError::InvalidDrawOrder {
                expected: self.order.len(),
                actual: ids.len(),
            });
        }

        let mut seen = vec![false; self.alive.len()];
        let mut new_order = Vec::with_capacity(ids.len());
        for &id in ids {
            let index = self.check(id)?;
            if std::mem::replace(&mut seen[index as usize], true) {
                return Err(SpriteError::DuplicateInDrawOrder(id));
            }
            new_order.push(index);
        }

        self.order = new_order;
        for (pos, &index) in self.order.iter().enumerate() {
            self.order_index[index as usize] = pos as u32;
        }
        self.dirty |= DirtyFlags::ORDER;
        Ok(())
    }

    /// Stable-sort the draw order by position z, ascending.
    pub(crate) fn sort_by_z(&mut self) {
        let positions = &self.positions;
        self.order.sort_by(|&a, &b| {
            positions[a as usize][2]
                .partial_cmp(&positions[b as usize][2])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for (pos, &index) in self.order.iter().enumerate() {
            self.order_index[index as usize] = pos as u32;
        }
        self.dirty |= DirtyFlags::ORDER;
    }

    pub(crate) fn order(&self) -> &[u32] {
        &self.order
    }

    pub(crate) fn positions(&self) -> &[[f32; 4]] {
        &self.positions
    }

    pub(crate) fn sizes(&self) -> &[[f32; 2]] {
        &self.sizes
    }

    pub(crate) fn angles(&self) -> &[f32] {
        &self.angles
    }

    pub(crate) fn colors(&self) -> &[u32] {
        &self.colors
    }

    pub(crate) fn slots(&self) -> &[u32] {
        &self.slots
    }

    /// Read and clear the dirty flags.
    pub(crate) fn take_dirty(&mut self) -> DirtyFlags {
        std::mem::replace(&mut self.dirty, DirtyFlags::empty())
    }
}
