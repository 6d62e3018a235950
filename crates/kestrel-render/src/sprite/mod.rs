//! GPU-driven sprite batching.
//!
//! A [`SpriteList`] keeps every sprite attribute in its own storage
//! buffer (positions, sizes, angles, packed colors, atlas slots) plus a
//! draw-order buffer of live indices. The vertex shader fetches
//! attributes by index and resolves texture coordinates through the
//! atlas UV table, so the whole list renders as one instanced draw with
//! no per-sprite CPU work beyond the attribute writes themselves.
//!
//! # Example
//!
//! ```ignore
//! use kestrel_render::{SpriteDescriptor, SpriteList, SpriteListOptions};
//!
//! let mut sprites = SpriteList::new(&ctx, SpriteListOptions::default());
//! let player = sprites.create(&atlas, &SpriteDescriptor::new("player", Vec3::ZERO))?;
//!
//! sprites.set_position(player, Vec3::new(64.0, 32.0, 0.0))?;
//!
//! // Once per frame, before rendering:
//! let stats = sprites.sync();
//! tracing::trace!("sprite sync uploaded {} bytes", stats.bytes_uploaded);
//! ```

pub mod renderer;
mod store;

pub use store::SpriteId;

use std::sync::Arc;

use glam::{Vec2, Vec3};
use kestrel_core::profiling::profile_function;

use crate::atlas::{AtlasKey, TextureAtlas};
use crate::color::Color;
use crate::context::GraphicsContext;
use crate::types::TypedBuffer;
use store::{DirtyFlags, SpriteStore};

/// Sprite list operation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteError {
    /// The atlas has no entry for the requested key.
    UnknownTexture(AtlasKey),
    /// The sprite was removed, or its slot has been reused.
    StaleId(SpriteId),
    /// A draw order permutation did not cover every live sprite.
    InvalidDrawOrder { expected: usize, actual: usize },
    /// A draw order permutation named the same sprite twice.
    DuplicateInDrawOrder(SpriteId),
}

impl std::fmt::Display for SpriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownTexture(key) => write!(f, "no atlas entry for {key:?}"),
            Self::StaleId(id) => write!(f, "sprite {id:?} was removed"),
            Self::InvalidDrawOrder { expected, actual } => write!(
                f,
                "draw order must list all {expected} live sprites, got {actual}"
            ),
            Self::DuplicateInDrawOrder(id) => {
                write!(f, "sprite {id:?} appears twice in the draw order")
            }
        }
    }
}

impl std::error::Error for SpriteError {}

pub type SpriteResult<T> = Result<T, SpriteError>;

/// Configuration for a [`SpriteList`].
#[derive(Debug, Clone, Copy)]
pub struct SpriteListOptions {
    /// Initial capacity of the attribute buffers, in sprites.
    pub capacity: u32,
    /// Atlas sampling filter for this list.
    pub filter: wgpu::FilterMode,
    /// Tint multiplied into every sprite's color.
    pub color: Color,
}

impl Default for SpriteListOptions {
    fn default() -> Self {
        Self {
            capacity: 256,
            filter: wgpu::FilterMode::Linear,
            color: Color::WHITE,
        }
    }
}

/// Initial state for a sprite created in a [`SpriteList`].
#[derive(Debug, Clone, Copy)]
pub struct SpriteDescriptor {
    /// Atlas key for the sprite's texture.
    pub texture: AtlasKey,
    /// World position; z orders sprites via
    /// [`SpriteList::sort_draw_order_by_z`].
    pub position: Vec3,
    /// Size in world units. `None` uses the atlas entry's pixel size.
    pub size: Option<Vec2>,
    /// Rotation in degrees, counter-clockwise.
    pub angle: f32,
    /// Per-sprite color multiplier.
    pub color: Color,
}

impl SpriteDescriptor {
    pub fn new(texture: impl Into<AtlasKey>, position: Vec3) -> Self {
        Self {
            texture: texture.into(),
            position,
            size: None,
            angle: 0.0,
            color: Color::WHITE,
        }
    }

    pub fn with_size(mut self, size: Vec2) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
}

/// What a [`SpriteList::sync`] call uploaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpriteSyncStats {
    /// Attribute buffers rewritten this sync.
    pub buffers_rewritten: u32,
    /// Total bytes handed to the queue.
    pub bytes_uploaded: u64,
    /// Whether any buffer was reallocated (bind groups rebuilt).
    pub reallocated: bool,
}

/// A batch of sprites drawn with one instanced draw call.
pub struct SpriteList {
    context: Arc<GraphicsContext>,
    store: SpriteStore,
    positions: TypedBuffer<[f32; 4]>,
    sizes: TypedBuffer<[f32; 2]>,
    angles: TypedBuffer<f32>,
    colors: TypedBuffer<u32>,
    slots: TypedBuffer<u32>,
    order: TypedBuffer<u32>,
    tint: Color,
    filter: wgpu::FilterMode,
    /// Bumped when any attribute buffer is reallocated.
    buffers_epoch: u64,
}

impl SpriteList {
    pub fn new(context: &Arc<GraphicsContext>, options: SpriteListOptions) -> Self {
        let device = context.device();
        let capacity = options.capacity.max(1);
        let usage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST;

        Self {
            positions: TypedBuffer::with_capacity(
                device,
                Some("sprite_positions"),
                capacity,
                usage,
            ),
            sizes: TypedBuffer::with_capacity(device, Some("sprite_sizes"), capacity, usage),
            angles: TypedBuffer::with_capacity(device, Some("sprite_angles"), capacity, usage),
            colors: TypedBuffer::with_capacity(device, Some("sprite_colors"), capacity, usage),
            slots: TypedBuffer::with_capacity(device, Some("sprite_slots"), capacity, usage),
            order: TypedBuffer::with_capacity(device, Some("sprite_order"), capacity, usage),
            store: SpriteStore::new(),
            context: context.clone(),
            tint: options.color,
            filter: options.filter,
            buffers_epoch: 0,
        }
    }

    /// Create a sprite from a descriptor, resolving its texture through
    /// the atlas.
    pub fn create(
        &mut self,
        atlas: &TextureAtlas,
        descriptor: &SpriteDescriptor,
    ) -> SpriteResult<SpriteId> {
        let entry = atlas
            .entry(descriptor.texture)
            .ok_or(SpriteError::UnknownTexture(descriptor.texture))?;
        let size = descriptor
            .size
            .unwrap_or_else(|| Vec2::new(entry.rect.width as f32, entry.rect.height as f32));

        Ok(self.store.create(
            descriptor.position,
            size,
            descriptor.angle,
            descriptor.color.pack_rgba8(),
            entry.slot,
        ))
    }

    pub fn remove(&mut self, id: SpriteId) -> SpriteResult<()> {
        self.store.remove(id)
    }

    /// Remove every sprite. Outstanding ids become stale.
    pub fn clear(&mut self) {
        self.store.clear();
    }

    pub fn contains(&self, id: SpriteId) -> bool {
        self.store.contains(id)
    }

    /// Number of live sprites.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn position(&self, id: SpriteId) -> SpriteResult<Vec3> {
        self.store.position(id)
    }

    pub fn set_position(&mut self, id: SpriteId, position: Vec3) -> SpriteResult<()> {
        self.store.set_position(id, position)
    }

    pub fn size(&self, id: SpriteId) -> SpriteResult<Vec2> {
        self.store.size(id)
    }

    pub fn set_size(&mut self, id: SpriteId, size: Vec2) -> SpriteResult<()> {
        self.store.set_size(id, size)
    }

    /// Rotation in degrees, counter-clockwise.
    pub fn angle(&self, id: SpriteId) -> SpriteResult<f32> {
        self.store.angle(id)
    }

    pub fn set_angle(&mut self, id: SpriteId, angle: f32) -> SpriteResult<()> {
        self.store.set_angle(id, angle)
    }

    pub fn color(&self, id: SpriteId) -> SpriteResult<Color> {
        Ok(Color::unpack_rgba8(self.store.color(id)?))
    }

    pub fn set_color(&mut self, id: SpriteId, color: Color) -> SpriteResult<()> {
        self.store.set_color(id, color.pack_rgba8())
    }

    /// The sprite's atlas slot.
    pub fn texture_slot(&self, id: SpriteId) -> SpriteResult<u32> {
        self.store.slot(id)
    }

    /// Point the sprite at a different atlas entry.
    pub fn set_texture(
        &mut self,
        atlas: &TextureAtlas,
        id: SpriteId,
        texture: impl Into<AtlasKey>,
    ) -> SpriteResult<()> {
        let key = texture.into();
        let slot = atlas.slot(key).ok_or(SpriteError::UnknownTexture(key))?;
        self.store.set_slot(id, slot)
    }

    /// Tint multiplied into every sprite of this list.
    pub fn tint(&self) -> Color {
        self.tint
    }

    pub fn set_tint(&mut self, tint: Color) {
        self.tint = tint;
    }

    pub fn filter(&self) -> wgpu::FilterMode {
        self.filter
    }

    /// Replace the draw order with an explicit back-to-front
    /// permutation of every live sprite.
    pub fn set_draw_order(&mut self, ids: &[SpriteId]) -> SpriteResult<()> {
        self.store.set_draw_order(ids)
    }

    /// Stable-sort the draw order by position z, ascending.
    pub fn sort_draw_order_by_z(&mut self) {
        self.store.sort_by_z();
    }

    /// Upload attribute arrays touched since the last sync. Buffers
    /// grow as needed; [`SpriteSyncStats::reallocated`] reports when
    /// bind groups against them went stale.
    pub fn sync(&mut self) -> SpriteSyncStats {
        profile_function!();
        let dirty = self.store.take_dirty();
        let mut stats = SpriteSyncStats::default();
        if dirty.is_empty() || self.store.attribute_len() == 0 {
            return stats;
        }

        let device = self.context.device();
        let queue = self.context.queue();

        if dirty.contains(DirtyFlags::POSITIONS) {
            let data = self.store.positions();
            stats.reallocated |= self.positions.write_grow(device, queue, data);
            stats.buffers_rewritten += 1;
            stats.bytes_uploaded += std::mem::size_of_val(data) as u64;
        }
        if dirty.contains(DirtyFlags::SIZES) {
            let data = self.store.sizes();
            stats.reallocated |= self.sizes.write_grow(device, queue, data);
            stats.buffers_rewritten += 1;
            stats.bytes_uploaded += std::mem::size_of_val(data) as u64;
        }
        if dirty.contains(DirtyFlags::ANGLES) {
            let data = self.store.angles();
            stats.reallocated |= self.angles.write_grow(device, queue, data);
            stats.buffers_rewritten += 1;
            stats.bytes_uploaded += std::mem::size_of_val(data) as u64;
        }
        if dirty.contains(DirtyFlags::COLORS) {
            let data = self.store.colors();
            stats.reallocated |= self.colors.write_grow(device, queue, data);
            stats.buffers_rewritten += 1;
            stats.bytes_uploaded += std::mem::size_of_val(data) as u64;
        }
        if dirty.contains(DirtyFlags::SLOTS) {
            let data = self.store.slots();
            stats.reallocated |= self.slots.write_grow(device, queue, data);
            stats.buffers_rewritten += 1;
            stats.bytes_uploaded += std::mem::size_of_val(data) as u64;
        }
        if dirty.contains(DirtyFlags::ORDER) && !self.store.order().is_empty() {
            let data = self.store.order();
            stats.reallocated |= self.order.write_grow(device, queue, data);
            stats.buffers_rewritten += 1;
            stats.bytes_uploaded += std::mem::size_of_val(data) as u64;
        }

        if stats.reallocated {
            self.buffers_epoch += 1;
        }

        stats
    }

    /// Bumped when a buffer reallocation invalidates bind groups.
    pub(crate) fn buffers_epoch(&self) -> u64 {
        self.buffers_epoch
    }

    pub(crate) fn positions_buffer(&self) -> &TypedBuffer<[f32; 4]> {
        &self.positions
    }

    pub(crate) fn sizes_buffer(&self) -> &TypedBuffer<[f32; 2]> {
        &self.sizes
    }

    pub(crate) fn angles_buffer(&self) -> &TypedBuffer<f32> {
        &self.angles
    }

    pub(crate) fn colors_buffer(&self) -> &TypedBuffer<u32> {
        &self.colors
    }

    pub(crate) fn slots_buffer(&self) -> &TypedBuffer<u32> {
        &self.slots
    }

    pub(crate) fn order_buffer(&self) -> &TypedBuffer<u32> {
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::AtlasOptions;
    use crate::image::ImageData;

    fn test_atlas(ctx: &Arc<GraphicsContext>) -> TextureAtlas {
        let mut atlas = TextureAtlas::new(ctx, AtlasOptions::default()).unwrap();
        atlas
            .add_image("tile", &ImageData::filled(16, 8, Color::WHITE))
            .unwrap();
        atlas
    }

    #[test]
    fn test_create_uses_entry_size() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let atlas = test_atlas(&ctx);
        let mut sprites = SpriteList::new(&ctx, SpriteListOptions::default());

        let id = sprites
            .create(&atlas, &SpriteDescriptor::new("tile", Vec3::ZERO))
            .unwrap();
        assert_eq!(sprites.size(id).unwrap(), Vec2::new(16.0, 8.0));

        let sized = sprites
            .create(
                &atlas,
                &SpriteDescriptor::new("tile", Vec3::ZERO).with_size(Vec2::splat(4.0)),
            )
            .unwrap();
        assert_eq!(sprites.size(sized).unwrap(), Vec2::splat(4.0));
    }

    #[test]
    fn test_create_unknown_texture() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let atlas = test_atlas(&ctx);
        let mut sprites = SpriteList::new(&ctx, SpriteListOptions::default());

        let err = sprites
            .create(&atlas, &SpriteDescriptor::new("missing", Vec3::ZERO))
            .unwrap_err();
        assert_eq!(err, SpriteError::UnknownTexture(AtlasKey::from("missing")));
    }

    #[test]
    fn test_color_round_trip() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let atlas = test_atlas(&ctx);
        let mut sprites = SpriteList::new(&ctx, SpriteListOptions::default());

        let id = sprites
            .create(
                &atlas,
                &SpriteDescriptor::new("tile", Vec3::ZERO)
                    .with_color(Color::from_rgba_u8(10, 20, 30, 40)),
            )
            .unwrap();
        assert_eq!(
            sprites.color(id).unwrap().to_rgba_u8(),
            [10, 20, 30, 40]
        );
    }

    #[test]
    fn test_sync_uploads_only_dirty_attributes() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let atlas = test_atlas(&ctx);
        let mut sprites = SpriteList::new(&ctx, SpriteListOptions::default());
        let id = sprites
            .create(&atlas, &SpriteDescriptor::new("tile", Vec3::ZERO))
            .unwrap();

        let first = sprites.sync();
        assert_eq!(first.buffers_rewritten, 6);
        assert!(!first.reallocated);

        let idle = sprites.sync();
        assert_eq!(idle, SpriteSyncStats::default());

        sprites.set_position(id, Vec3::ONE).unwrap();
        let moved = sprites.sync();
        assert_eq!(moved.buffers_rewritten, 1);
        assert_eq!(moved.bytes_uploaded, 16);
    }

    #[test]
    fn test_sync_grows_buffers_and_bumps_epoch() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let atlas = test_atlas(&ctx);
        let mut sprites = SpriteList::new(
            &ctx,
            SpriteListOptions {
                capacity: 2,
                ..SpriteListOptions::default()
            },
        );

        for _ in 0..2 {
            sprites
                .create(&atlas, &SpriteDescriptor::new("tile", Vec3::ZERO))
                .unwrap();
        }
        let epoch = sprites.buffers_epoch();
        assert!(!sprites.sync().reallocated);
        assert_eq!(sprites.buffers_epoch(), epoch);

        sprites
            .create(&atlas, &SpriteDescriptor::new("tile", Vec3::ZERO))
            .unwrap();
        assert!(sprites.sync().reallocated);
        assert!(sprites.buffers_epoch() > epoch);
    }

    #[test]
    fn test_clear_invalidates_ids() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let atlas = test_atlas(&ctx);
        let mut sprites = SpriteList::new(&ctx, SpriteListOptions::default());
        let id = sprites
            .create(&atlas, &SpriteDescriptor::new("tile", Vec3::ZERO))
            .unwrap();
        sprites.sync();

        sprites.clear();
        assert!(sprites.is_empty());
        assert_eq!(sprites.position(id), Err(SpriteError::StaleId(id)));
        // Nothing to upload for an empty list.
        assert_eq!(sprites.sync(), SpriteSyncStats::default());
    }

    #[test]
    fn test_removed_sprites_leave_order_only() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let atlas = test_atlas(&ctx);
        let mut sprites = SpriteList::new(&ctx, SpriteListOptions::default());

        let a = sprites
            .create(&atlas, &SpriteDescriptor::new("tile", Vec3::ZERO))
            .unwrap();
        let _b = sprites
            .create(&atlas, &SpriteDescriptor::new("tile", Vec3::ZERO))
            .unwrap();
        sprites.sync();

        sprites.remove(a).unwrap();
        let stats = sprites.sync();
        // Attribute data for the dead index stays; only the order
        // buffer shrinks.
        assert_eq!(stats.buffers_rewritten, 1);
        assert_eq!(sprites.len(), 1);
    }
}
