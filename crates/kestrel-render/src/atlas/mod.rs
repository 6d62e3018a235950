//! Dynamic texture atlas with border extrusion.
//!
//! Images are packed into one GPU texture so whole sprite lists can be
//! drawn with a single bind group. Each image gets a stable slot index;
//! the normalized UV corners for every slot live in a lookup texture
//! (see [`UvRecord`]) that shaders index by slot, so repacking or
//! growing the atlas never invalidates sprite data.
//!
//! Around every image the atlas writes an extruded border: the edge
//! pixels repeated outward. Linear filtering at sprite edges then reads
//! the image's own colors instead of a neighbor packed next to it.
//!
//! # Example
//!
//! ```ignore
//! use kestrel_render::{AtlasOptions, Color, ImageData, TextureAtlas};
//!
//! let mut atlas = TextureAtlas::new(&ctx, AtlasOptions::default())?;
//! let slot = atlas.add_image("player", &ImageData::filled(16, 16, Color::RED))?;
//!
//! // Adding the same key again is free and returns the same slot.
//! assert_eq!(atlas.add_image("player", &player_image)?, slot);
//! ```

pub mod allocator;
pub mod blit;
mod uv_table;

pub use uv_table::UvRecord;

use std::sync::Arc;

use ahash::HashMap;
use kestrel_core::geometry::{Pos, Rect, Size};
use kestrel_core::profiling::profile_function;

use crate::context::GraphicsContext;
use crate::image::ImageData;
use crate::types::GpuTexture;
use allocator::AtlasAllocator;
use uv_table::UvTable;

/// Key identifying an image in the atlas.
///
/// Keys are opaque 64-bit values; string names hash to a key, so the
/// same name always finds the same entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtlasKey(u64);

impl AtlasKey {
    pub fn from_name(name: &str) -> Self {
        use std::hash::{Hash, Hasher};
        let mut hasher = ahash::AHasher::default();
        name.hash(&mut hasher);
        Self(hasher.finish())
    }
}

impl From<&str> for AtlasKey {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}

impl From<u64> for AtlasKey {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Atlas operation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtlasError {
    /// The image (plus border) can never fit, even at the device's
    /// maximum texture size.
    ImageTooLarge { width: u32, height: u32, max: u32 },
    /// No space left, and growth is disabled or exhausted.
    AtlasFull { size: u32, requested: Size<u32> },
    /// A requested size exceeds the device's maximum texture size.
    SizeLimitExceeded { size: u32, max: u32 },
    /// No entry with the given key.
    UnknownKey,
}

impl std::fmt::Display for AtlasError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ImageTooLarge { width, height, max } => write!(
                f,
                "image {width}x{height} plus border exceeds the {max}x{max} texture limit"
            ),
            Self::AtlasFull { size, requested } => write!(
                f,
                "no space for a {}x{} region in a {size}x{size} atlas",
                requested.width, requested.height
            ),
            Self::SizeLimitExceeded { size, max } => {
                write!(f, "atlas size {size} exceeds the device limit {max}")
            }
            Self::UnknownKey => write!(f, "no atlas entry with that key"),
        }
    }
}

impl std::error::Error for AtlasError {}

pub type AtlasResult<T> = Result<T, AtlasError>;

/// Configuration for a [`TextureAtlas`].
#[derive(Debug, Clone, Copy)]
pub struct AtlasOptions {
    /// Initial side length in pixels.
    pub size: u32,
    /// Extruded border width around each image, in pixels.
    pub border: u32,
    /// Grow (double) the atlas when an image does not fit.
    pub auto_resize: bool,
    /// Color texture format.
    pub format: wgpu::TextureFormat,
}

impl Default for AtlasOptions {
    fn default() -> Self {
        Self {
            size: 512,
            border: 2,
            auto_resize: true,
            format: wgpu::TextureFormat::Rgba8Unorm,
        }
    }
}

/// Where an image ended up in the atlas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtlasEntry {
    /// Stable slot index into the UV table.
    pub slot: u32,
    /// Content rect in pixels, border excluded.
    pub rect: Rect<u32>,
    /// Normalized UV rect of the content.
    pub uv_rect: Rect<f32>,
}

#[derive(Debug, Clone, Copy)]
struct EntryData {
    slot: u32,
    /// Content rect in pixels, border excluded.
    rect: Rect<u32>,
}

/// Replicate the edge pixels of an RGBA image outward by `border`
/// pixels, returning `(width + 2 * border) * (height + 2 * border)`
/// pixels.
pub fn extrude_rgba(image: &ImageData, border: u32) -> Vec<u8> {
    let (width, height) = (image.width(), image.height());
    let out_width = width + 2 * border;
    let out_height = height + 2 * border;
    let src = image.pixels();
    let mut out = Vec::with_capacity((out_width * out_height * 4) as usize);

    for out_y in 0..out_height {
        // Clamp to the nearest content row.
        let src_y = out_y.saturating_sub(border).min(height - 1);
        let row = &src[(src_y * width * 4) as usize..((src_y + 1) * width * 4) as usize];

        let left = &row[0..4];
        let right = &row[((width - 1) * 4) as usize..];
        for _ in 0..border {
            out.extend_from_slice(left);
        }
        out.extend_from_slice(row);
        for _ in 0..border {
            out.extend_from_slice(right);
        }
    }
    out
}

/// A dynamically packed texture atlas.
///
/// See the module docs for the packing and UV table scheme. All GPU
/// writes go through the queue owned by the shared [`GraphicsContext`];
/// calls that repack (grow, [`TextureAtlas::rebuild`]) submit their own
/// texture-to-texture copies.
pub struct TextureAtlas {
    context: Arc<GraphicsContext>,
    texture: GpuTexture,
    allocator: AtlasAllocator,
    uv_table: UvTable,
    entries: HashMap<AtlasKey, EntryData>,
    options: AtlasOptions,
    /// Device texture size cap, cached at creation.
    max_size: u32,
    /// Bumped whenever the color or UV texture is recreated.
    epoch: u64,
}

impl TextureAtlas {
    pub fn new(context: &Arc<GraphicsContext>, options: AtlasOptions) -> AtlasResult<Self> {
        let max_size = context.max_texture_dimension_2d();
        if options.size == 0 || options.size > max_size {
            return Err(AtlasError::SizeLimitExceeded {
                size: options.size,
                max: max_size,
            });
        }

        tracing::debug!(
            "creating {}x{} atlas (border {}, {:?})",
            options.size,
            options.size,
            options.border,
            options.format
        );

        Ok(Self {
            texture: Self::create_texture(context.device(), options.size, options.format),
            allocator: AtlasAllocator::new(options.size),
            uv_table: UvTable::new(context.device(), 256),
            entries: HashMap::default(),
            context: context.clone(),
            options,
            max_size,
            epoch: 0,
        })
    }

    fn create_texture(device: &wgpu::Device, size: u32, format: wgpu::TextureFormat) -> GpuTexture {
        GpuTexture::new_2d(
            device,
            Some("texture_atlas"),
            size,
            size,
            format,
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::RENDER_ATTACHMENT,
        )
    }

    /// Pack an image and upload its pixels, returning the slot index.
    ///
    /// A key that is already packed returns its existing slot without
    /// touching the texture. When space runs out and `auto_resize` is
    /// on, the atlas doubles (up to the device limit) and migrates
    /// packed pixels on the GPU.
    pub fn add_image(&mut self, key: impl Into<AtlasKey>, image: &ImageData) -> AtlasResult<u32> {
        profile_function!();
        let key = key.into();
        if let Some(entry) = self.entries.get(&key) {
            return Ok(entry.slot);
        }

        let border = self.options.border;
        let padded = Size::new(
            image.width() + 2 * border,
            image.height() + 2 * border,
        );
        if padded.width > self.max_size || padded.height > self.max_size {
            return Err(AtlasError::ImageTooLarge {
                width: image.width(),
                height: image.height(),
                max: self.max_size,
            });
        }

        let pos = loop {
            if let Some(pos) = self.allocator.allocate(padded) {
                break pos;
            }
            if !self.options.auto_resize {
                return Err(AtlasError::AtlasFull {
                    size: self.size(),
                    requested: padded,
                });
            }
            let mut next = self.size() * 2;
            while next < padded.width.max(padded.height) {
                next *= 2;
            }
            if next > self.max_size {
                return Err(AtlasError::AtlasFull {
                    size: self.size(),
                    requested: padded,
                });
            }
            self.migrate(next)?;
        };

        let data = extrude_rgba(image, border);
        self.upload_region(
            &data,
            Rect::new(pos.x, pos.y, padded.width, padded.height),
        );

        let rect = Rect::new(pos.x + border, pos.y + border, image.width(), image.height());
        let (slot, uv_grew) = self.uv_table.allocate(self.context.device());
        if uv_grew {
            self.epoch += 1;
        }
        self.uv_table
            .set(slot, UvRecord::from_pixel_rect(rect, self.size()));
        self.entries.insert(key, EntryData { slot, rect });

        tracing::debug!(
            "atlas packed {}x{} at ({}, {}) in slot {}",
            image.width(),
            image.height(),
            rect.x,
            rect.y,
            slot
        );
        Ok(slot)
    }

    fn upload_region(&self, data: &[u8], rect: Rect<u32>) {
        let bpp = self.options.format.block_copy_size(None).unwrap_or(4);
        self.context.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: self.texture.texture(),
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: rect.x,
                    y: rect.y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(rect.width * bpp),
                rows_per_image: Some(rect.height),
            },
            wgpu::Extent3d {
                width: rect.width,
                height: rect.height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Drop an entry. Its UV slot is reused by later images; the pixels
    /// stay in the texture until the next [`TextureAtlas::rebuild`] or
    /// growth migration reclaims the space.
    pub fn remove(&mut self, key: impl Into<AtlasKey>) -> AtlasResult<()> {
        let key = key.into();
        let entry = self.entries.remove(&key).ok_or(AtlasError::UnknownKey)?;
        self.uv_table.free(entry.slot);
        Ok(())
    }

    /// Repack all live entries at the current size, reclaiming space
    /// left behind by removed images. Slots are unchanged.
    pub fn rebuild(&mut self) -> AtlasResult<()> {
        self.migrate(self.size())
    }

    /// Repack all live entries into a texture of side `new_size`.
    /// Shrinking fails with [`AtlasError::AtlasFull`] if the entries no
    /// longer fit; the atlas is left untouched on error.
    pub fn resize(&mut self, new_size: u32) -> AtlasResult<()> {
        if new_size == 0 || new_size > self.max_size {
            return Err(AtlasError::SizeLimitExceeded {
                size: new_size,
                max: self.max_size,
            });
        }
        self.migrate(new_size)
    }

    /// Repack every live entry into a fresh texture and copy the pixels
    /// over on the GPU, border rings included.
    fn migrate(&mut self, new_size: u32) -> AtlasResult<()> {
        profile_function!();
        let border = self.options.border;

        // Plan first so failure leaves the atlas untouched. Tallest
        // entries pack first; the slot tiebreak keeps order total.
        let mut order: Vec<(AtlasKey, EntryData)> =
            self.entries.iter().map(|(k, e)| (*k, *e)).collect();
        order.sort_by(|(_, a), (_, b)| {
            b.rect
                .height
                .cmp(&a.rect.height)
                .then(b.rect.width.cmp(&a.rect.width))
                .then(a.slot.cmp(&b.slot))
        });

        let mut allocator = AtlasAllocator::new(new_size);
        let mut placements: Vec<Pos<u32>> = Vec::with_capacity(order.len());
        for (_, entry) in &order {
            let padded = Size::new(
                entry.rect.width + 2 * border,
                entry.rect.height + 2 * border,
            );
            match allocator.allocate(padded) {
                Some(pos) => placements.push(pos),
                None => {
                    return Err(AtlasError::AtlasFull {
                        size: new_size,
                        requested: padded,
                    });
                }
            }
        }

        let texture = Self::create_texture(self.context.device(), new_size, self.options.format);
        let mut encoder =
            self.context
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("atlas_migrate"),
                });
        for ((_, entry), pos) in order.iter().zip(&placements) {
            let padded = Size::new(
                entry.rect.width + 2 * border,
                entry.rect.height + 2 * border,
            );
            encoder.copy_texture_to_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: self.texture.texture(),
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: entry.rect.x - border,
                        y: entry.rect.y - border,
                        z: 0,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::TexelCopyTextureInfo {
                    texture: texture.texture(),
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: pos.x,
                        y: pos.y,
                        z: 0,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::Extent3d {
                    width: padded.width,
                    height: padded.height,
                    depth_or_array_layers: 1,
                },
            );
        }
        self.context.queue().submit(Some(encoder.finish()));

        for ((key, entry), pos) in order.iter().zip(&placements) {
            let rect = Rect::new(
                pos.x + border,
                pos.y + border,
                entry.rect.width,
                entry.rect.height,
            );
            self.uv_table
                .set(entry.slot, UvRecord::from_pixel_rect(rect, new_size));
            if let Some(live) = self.entries.get_mut(key) {
                live.rect = rect;
            }
        }

        tracing::info!(
            "atlas migrated to {new_size}x{new_size} ({} entries)",
            order.len()
        );
        self.texture = texture;
        self.allocator = allocator;
        self.epoch += 1;
        Ok(())
    }

    /// Upload pending UV records. Call once per frame before rendering;
    /// the sprite renderer does this in `prepare`.
    pub fn flush(&mut self) -> bool {
        self.uv_table.upload(self.context.queue())
    }

    /// Current side length in pixels.
    #[inline]
    pub fn size(&self) -> u32 {
        self.allocator.size()
    }

    #[inline]
    pub fn border(&self) -> u32 {
        self.options.border
    }

    /// Number of packed images.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: impl Into<AtlasKey>) -> bool {
        self.entries.contains_key(&key.into())
    }

    /// Slot index for a key.
    pub fn slot(&self, key: impl Into<AtlasKey>) -> Option<u32> {
        self.entries.get(&key.into()).map(|e| e.slot)
    }

    /// Placement of a key: slot, pixel rect and normalized UVs.
    pub fn entry(&self, key: impl Into<AtlasKey>) -> Option<AtlasEntry> {
        let scale = self.size() as f32;
        self.entries.get(&key.into()).map(|e| AtlasEntry {
            slot: e.slot,
            rect: e.rect,
            uv_rect: Rect::new(
                e.rect.x as f32 / scale,
                e.rect.y as f32 / scale,
                e.rect.width as f32 / scale,
                e.rect.height as f32 / scale,
            ),
        })
    }

    /// The UV record a slot currently resolves to.
    pub fn uv_record(&self, key: impl Into<AtlasKey>) -> Option<UvRecord> {
        self.entries
            .get(&key.into())
            .map(|e| UvRecord::from_pixel_rect(e.rect, self.size()))
    }

    /// Fraction of the texture area covered by packed regions
    /// (borders included).
    pub fn usage_ratio(&self) -> f32 {
        let border = self.options.border;
        let used: u64 = self
            .entries
            .values()
            .map(|e| {
                ((e.rect.width + 2 * border) as u64) * ((e.rect.height + 2 * border) as u64)
            })
            .sum();
        used as f32 / (self.size() as u64 * self.size() as u64) as f32
    }

    /// Bumped whenever the color or UV texture is recreated. Bind groups
    /// built against an older epoch must be rebuilt.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The packed color texture.
    pub fn texture(&self) -> &wgpu::Texture {
        self.texture.texture()
    }

    pub fn texture_view(&self) -> &wgpu::TextureView {
        self.texture.view()
    }

    /// The UV lookup texture (`Rgba32Float`, two texels per slot).
    pub fn uv_texture_view(&self) -> &wgpu::TextureView {
        self.uv_table.view()
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.options.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::readback::GpuReadback;

    fn solid(width: u32, height: u32, color: Color) -> ImageData {
        ImageData::filled(width, height, color)
    }

    fn read_atlas(atlas: &TextureAtlas) -> ImageData {
        GpuReadback::from_texture(&atlas.context, atlas.texture())
            .unwrap()
            .read_image()
            .unwrap()
    }

    fn options(size: u32, border: u32, auto_resize: bool) -> AtlasOptions {
        AtlasOptions {
            size,
            border,
            auto_resize,
            ..AtlasOptions::default()
        }
    }

    #[test]
    fn test_extrude_border_zero_is_identity() {
        let image = solid(3, 2, Color::GREEN);
        assert_eq!(extrude_rgba(&image, 0), image.pixels());
    }

    #[test]
    fn test_extrude_replicates_edges() {
        let mut image = solid(2, 2, Color::BLACK);
        image.set_pixel(0, 0, Color::RED);
        image.set_pixel(1, 0, Color::GREEN);
        image.set_pixel(0, 1, Color::BLUE);

        let out = extrude_rgba(&image, 2);
        let extruded = ImageData::from_pixels(6, 6, out).unwrap();

        // Corners replicate the nearest content corner.
        assert_eq!(extruded.pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(extruded.pixel(5, 0), Some([0, 255, 0, 255]));
        assert_eq!(extruded.pixel(0, 5), Some([0, 0, 255, 255]));
        assert_eq!(extruded.pixel(5, 5), Some([0, 0, 0, 255]));
        // Edges replicate the nearest edge pixel.
        assert_eq!(extruded.pixel(2, 0), Some([255, 0, 0, 255]));
        assert_eq!(extruded.pixel(0, 3), Some([0, 0, 255, 255]));
        // Content is untouched.
        assert_eq!(extruded.pixel(2, 2), Some([255, 0, 0, 255]));
        assert_eq!(extruded.pixel(3, 3), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_key_from_name_is_stable() {
        assert_eq!(AtlasKey::from_name("player"), AtlasKey::from_name("player"));
        assert_ne!(AtlasKey::from_name("player"), AtlasKey::from_name("enemy"));
    }

    #[test]
    fn test_add_image_uploads_extruded_pixels() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let mut atlas = TextureAtlas::new(&ctx, options(64, 2, false)).unwrap();
        atlas.add_image("red", &solid(4, 4, Color::RED)).unwrap();

        let entry = atlas.entry("red").unwrap();
        assert_eq!(entry.rect.size(), Size::new(4, 4));

        let pixels = read_atlas(&atlas);
        // Content.
        assert_eq!(
            pixels.pixel(entry.rect.x, entry.rect.y),
            Some([255, 0, 0, 255])
        );
        // Border ring, one pixel outside the content rect.
        assert_eq!(
            pixels.pixel(entry.rect.x - 1, entry.rect.y - 1),
            Some([255, 0, 0, 255])
        );
        // Outside the padded region the texture is untouched.
        assert_eq!(
            pixels.pixel(entry.rect.right() + 2, entry.rect.bottom() + 2),
            Some([0, 0, 0, 0])
        );
    }

    #[test]
    fn test_same_key_is_deduplicated() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let mut atlas = TextureAtlas::new(&ctx, options(64, 2, false)).unwrap();
        let first = atlas.add_image("tile", &solid(8, 8, Color::BLUE)).unwrap();
        let second = atlas.add_image("tile", &solid(8, 8, Color::RED)).unwrap();
        assert_eq!(first, second);
        assert_eq!(atlas.len(), 1);
    }

    #[test]
    fn test_auto_resize_migrates_pixels_and_keeps_slots() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let mut atlas = TextureAtlas::new(&ctx, options(32, 2, true)).unwrap();

        // Four 12x12 images pad to 16x16 and exactly fill 32x32.
        let colors = [
            Color::RED,
            Color::GREEN,
            Color::BLUE,
            Color::from_rgba_u8(255, 255, 0, 255),
        ];
        let mut slots = Vec::new();
        for (i, color) in colors.iter().enumerate() {
            slots.push(
                atlas
                    .add_image(format!("img{i}").as_str(), &solid(12, 12, *color))
                    .unwrap(),
            );
        }
        assert_eq!(atlas.size(), 32);
        let epoch_before = atlas.epoch();

        // The fifth image forces a doubling to 64.
        let fifth = atlas
            .add_image("img4", &solid(12, 12, Color::WHITE))
            .unwrap();
        assert_eq!(atlas.size(), 64);
        assert!(atlas.epoch() > epoch_before);
        assert!(!slots.contains(&fifth));

        // Slots survived the migration.
        for (i, slot) in slots.iter().enumerate() {
            assert_eq!(atlas.slot(format!("img{i}").as_str()), Some(*slot));
        }

        // Every image's pixels moved with it.
        let pixels = read_atlas(&atlas);
        for (i, color) in colors.iter().enumerate() {
            let rect = atlas.entry(format!("img{i}").as_str()).unwrap().rect;
            let center = pixels.pixel(rect.x + 6, rect.y + 6);
            assert_eq!(center, Some(color.to_rgba_u8()), "img{i} at {rect:?}");
        }
    }

    #[test]
    fn test_atlas_full_without_auto_resize() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let mut atlas = TextureAtlas::new(&ctx, options(32, 0, false)).unwrap();
        for i in 0..4 {
            atlas
                .add_image(format!("img{i}").as_str(), &solid(16, 16, Color::WHITE))
                .unwrap();
        }
        let err = atlas
            .add_image("one_too_many", &solid(16, 16, Color::WHITE))
            .unwrap_err();
        assert!(matches!(err, AtlasError::AtlasFull { size: 32, .. }));
    }

    #[test]
    fn test_remove_then_rebuild_reclaims_space() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let mut atlas = TextureAtlas::new(&ctx, options(32, 0, false)).unwrap();
        for i in 0..4 {
            atlas
                .add_image(format!("img{i}").as_str(), &solid(16, 16, Color::GREEN))
                .unwrap();
        }
        let kept_slot = atlas.slot("img0").unwrap();

        atlas.remove("img3").unwrap();
        assert!(!atlas.contains("img3"));
        assert!(matches!(
            atlas.remove("img3"),
            Err(AtlasError::UnknownKey)
        ));

        // Space is only reclaimed by the rebuild.
        assert!(atlas.add_image("next", &solid(16, 16, Color::RED)).is_err());
        atlas.rebuild().unwrap();
        atlas
            .add_image("next", &solid(16, 16, Color::RED))
            .unwrap();

        // Surviving entries kept their slots and pixels.
        assert_eq!(atlas.slot("img0"), Some(kept_slot));
        let pixels = read_atlas(&atlas);
        let rect = atlas.entry("img0").unwrap().rect;
        assert_eq!(pixels.pixel(rect.x + 8, rect.y + 8), Some([0, 255, 0, 255]));
    }

    #[test]
    fn test_removed_slot_is_reused() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let mut atlas = TextureAtlas::new(&ctx, options(64, 2, true)).unwrap();
        atlas.add_image("a", &solid(4, 4, Color::RED)).unwrap();
        let b_slot = atlas.add_image("b", &solid(4, 4, Color::GREEN)).unwrap();
        atlas.remove("b").unwrap();
        let c_slot = atlas.add_image("c", &solid(4, 4, Color::BLUE)).unwrap();
        assert_eq!(b_slot, c_slot);
    }

    #[test]
    fn test_image_too_large() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let mut atlas = TextureAtlas::new(&ctx, options(32, 2, true)).unwrap();
        let max = ctx.max_texture_dimension_2d();
        let err = atlas
            .add_image("huge", &solid(max + 1, 4, Color::WHITE))
            .unwrap_err();
        assert!(matches!(err, AtlasError::ImageTooLarge { .. }));
    }

    #[test]
    fn test_resize_checks_device_limit() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let mut atlas = TextureAtlas::new(&ctx, options(32, 2, true)).unwrap();
        let max = ctx.max_texture_dimension_2d();
        assert!(matches!(
            atlas.resize(max * 2),
            Err(AtlasError::SizeLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_shrink_fails_when_entries_do_not_fit() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let mut atlas = TextureAtlas::new(&ctx, options(64, 0, false)).unwrap();
        for i in 0..4 {
            atlas
                .add_image(format!("img{i}").as_str(), &solid(32, 32, Color::WHITE))
                .unwrap();
        }
        let err = atlas.resize(32).unwrap_err();
        assert!(matches!(err, AtlasError::AtlasFull { size: 32, .. }));
        // Failed shrink leaves everything in place.
        assert_eq!(atlas.size(), 64);
        assert_eq!(atlas.len(), 4);

        // Dropping three entries makes the shrink legal.
        for i in 1..4 {
            atlas.remove(format!("img{i}").as_str()).unwrap();
        }
        atlas.resize(32).unwrap();
        assert_eq!(atlas.size(), 32);
        assert!(atlas.contains("img0"));
    }

    #[test]
    fn test_usage_ratio() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let mut atlas = TextureAtlas::new(&ctx, options(32, 0, false)).unwrap();
        assert_eq!(atlas.usage_ratio(), 0.0);
        atlas.add_image("a", &solid(16, 16, Color::WHITE)).unwrap();
        assert!((atlas.usage_ratio() - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn test_uv_record_tracks_migration() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let mut atlas = TextureAtlas::new(&ctx, options(32, 2, true)).unwrap();
        atlas.add_image("a", &solid(12, 12, Color::RED)).unwrap();
        let before = atlas.uv_record("a").unwrap();

        atlas.resize(64).unwrap();
        let after = atlas.uv_record("a").unwrap();
        assert_ne!(before, after);

        // The record still matches the entry's pixel rect.
        let entry = atlas.entry("a").unwrap();
        assert_eq!(
            after,
            UvRecord::from_pixel_rect(entry.rect, atlas.size())
        );
    }
}
