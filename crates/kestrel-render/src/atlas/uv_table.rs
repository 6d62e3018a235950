//! UV lookup texture for atlas slots.
//!
//! Every packed image owns a stable slot index. The table stores four UV
//! corner pairs per slot in an `Rgba32Float` texture, two texels per
//! slot, and the sprite vertex shader fetches them with `textureLoad`
//! using the slot it reads from the sprite's attribute buffer. Repacking
//! the atlas rewrites records in place, so sprite data on the GPU never
//! has to change when images move.

use kestrel_core::geometry::Rect;

use crate::types::GpuTexture;

/// Texels per slot record (four vec2 corners packed into two vec4s).
pub(crate) const TEXELS_PER_SLOT: u32 = 2;
/// Width of the lookup texture in texels.
pub(crate) const TABLE_WIDTH: u32 = 1024;
/// Slot records per texture row.
pub(crate) const SLOTS_PER_ROW: u32 = TABLE_WIDTH / TEXELS_PER_SLOT;

/// Texel coordinates of the first texel of a slot record.
pub(crate) fn slot_texel_origin(slot: u32) -> (u32, u32) {
    ((slot % SLOTS_PER_ROW) * TEXELS_PER_SLOT, slot / SLOTS_PER_ROW)
}

/// The four UV corners of one atlas slot, ordered top-left, top-right,
/// bottom-left, bottom-right with v growing downward. This matches the
/// corner table in the sprite vertex shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct UvRecord {
    pub corners: [[f32; 2]; 4],
}

static_assertions::assert_eq_size!(UvRecord, [u8; 32]);

impl UvRecord {
    /// Normalize a pixel rect against an atlas of side `atlas_size`.
    pub fn from_pixel_rect(rect: Rect<u32>, atlas_size: u32) -> Self {
        let scale = atlas_size as f32;
        let u0 = rect.x as f32 / scale;
        let v0 = rect.y as f32 / scale;
        let u1 = rect.right() as f32 / scale;
        let v1 = rect.bottom() as f32 / scale;
        Self {
            corners: [[u0, v0], [u1, v0], [u0, v1], [u1, v1]],
        }
    }
}

/// CPU mirror plus GPU texture for all slot records.
pub(crate) struct UvTable {
    texture: GpuTexture,
    /// One record per slot, length always `rows * SLOTS_PER_ROW`.
    records: Vec<UvRecord>,
    /// Freed slots, reused LIFO.
    free: Vec<u32>,
    next_slot: u32,
    dirty: bool,
}

impl UvTable {
    pub fn new(device: &wgpu::Device, initial_slots: u32) -> Self {
        let rows = initial_slots.div_ceil(SLOTS_PER_ROW).max(1);
        Self {
            texture: Self::create_texture(device, rows),
            records: vec![UvRecord::default(); (rows * SLOTS_PER_ROW) as usize],
            free: Vec::new(),
            next_slot: 0,
            dirty: false,
        }
    }

    fn create_texture(device: &wgpu::Device, rows: u32) -> GpuTexture {
        GpuTexture::new_2d(
            device,
            Some("atlas_uv_table"),
            TABLE_WIDTH,
            rows,
            wgpu::TextureFormat::Rgba32Float,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        )
    }

    /// Total slots the texture can hold before growing.
    pub fn capacity(&self) -> u32 {
        self.records.len() as u32
    }

    /// Slots currently handed out.
    pub fn live_slots(&self) -> u32 {
        self.next_slot - self.free.len() as u32
    }

    /// Claim a slot, growing the texture if every slot is taken.
    /// Returns the slot and whether the texture was recreated (which
    /// invalidates bind groups referencing it).
    pub fn allocate(&mut self, device: &wgpu::Device) -> (u32, bool) {
        if let Some(slot) = self.free.pop() {
            return (slot, false);
        }

        let slot = self.next_slot;
        self.next_slot += 1;

        let mut grew = false;
        if self.next_slot > self.capacity() {
            let rows = (self.capacity() / SLOTS_PER_ROW) * 2;
            tracing::debug!("uv table growing to {} rows", rows);
            self.texture = Self::create_texture(device, rows);
            self.records
                .resize((rows * SLOTS_PER_ROW) as usize, UvRecord::default());
            self.dirty = true;
            grew = true;
        }
        (slot, grew)
    }

    /// Release a slot for reuse and zero its record.
    pub fn free(&mut self, slot: u32) {
        self.records[slot as usize] = UvRecord::default();
        self.free.push(slot);
        self.dirty = true;
    }

    pub fn set(&mut self, slot: u32, record: UvRecord) {
        self.records[slot as usize] = record;
        self.dirty = true;
    }

    #[cfg(test)]
    pub fn get(&self, slot: u32) -> UvRecord {
        self.records[slot as usize]
    }

    /// Upload the records if anything changed since the last call.
    pub fn upload(&mut self, queue: &wgpu::Queue) -> bool {
        if !self.dirty {
            return false;
        }
        let rows = self.capacity() / SLOTS_PER_ROW;
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: self.texture.texture(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&self.records),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(TABLE_WIDTH * 16),
                rows_per_image: Some(rows),
            },
            wgpu::Extent3d {
                width: TABLE_WIDTH,
                height: rows,
                depth_or_array_layers: 1,
            },
        );
        self.dirty = false;
        true
    }

    pub fn view(&self) -> &wgpu::TextureView {
        self.texture.view()
    }
}
