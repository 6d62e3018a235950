//! Typed wrappers over raw wgpu buffers and textures.
//!
//! [`TypedBuffer`] carries the element type and the written length next
//! to the allocation so upload code never juggles byte offsets by hand;
//! [`GpuTexture`] pairs a texture with its default view and metadata.
//! Neither hides wgpu: the raw resources stay reachable for bind groups
//! and copies.

use std::marker::PhantomData;

/// Smallest capacity [`TypedBuffer::write_grow`] will allocate.
pub(crate) const MIN_GROW_CAPACITY: u32 = 16;

/// Next capacity for a buffer that must hold `needed` elements.
pub(crate) fn grow_capacity(needed: u32) -> u32 {
    needed.next_power_of_two().max(MIN_GROW_CAPACITY)
}

/// A GPU buffer with type-safe element tracking.
///
/// Tracks the element type, the number of elements written, and the
/// allocation size. The underlying buffer stays accessible through
/// [`TypedBuffer::buffer`].
pub struct TypedBuffer<T: bytemuck::Pod> {
    buffer: wgpu::Buffer,
    label: Option<String>,
    len: u32,
    usage: wgpu::BufferUsages,
    _ty: PhantomData<T>,
}

impl<T: bytemuck::Pod> TypedBuffer<T> {
    const STRIDE: u64 = size_of::<T>() as u64;

    /// Create a buffer initialized with `data`.
    pub fn new(
        device: &wgpu::Device,
        label: Option<&str>,
        data: &[T],
        usage: wgpu::BufferUsages,
    ) -> Self {
        use wgpu::util::DeviceExt;
        Self {
            buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label,
                contents: bytemuck::cast_slice(data),
                usage,
            }),
            label: label.map(str::to_owned),
            len: data.len() as u32,
            usage,
            _ty: PhantomData,
        }
    }

    /// Create an empty buffer sized for `capacity` elements.
    pub fn with_capacity(
        device: &wgpu::Device,
        label: Option<&str>,
        capacity: u32,
        usage: wgpu::BufferUsages,
    ) -> Self {
        Self {
            buffer: Self::allocate(device, label, capacity, usage),
            label: label.map(str::to_owned),
            len: 0,
            usage,
            _ty: PhantomData,
        }
    }

    fn allocate(
        device: &wgpu::Device,
        label: Option<&str>,
        capacity: u32,
        usage: wgpu::BufferUsages,
    ) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label,
            size: capacity as u64 * Self::STRIDE,
            usage,
            mapped_at_creation: false,
        })
    }

    /// Number of elements written to the buffer.
    #[inline]
    pub fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the written elements in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.len as u64 * Self::STRIDE
    }

    /// Allocation size in bytes.
    #[inline]
    pub fn capacity_bytes(&self) -> u64 {
        self.buffer.size()
    }

    /// Allocation size in elements.
    #[inline]
    pub fn capacity(&self) -> u32 {
        (self.buffer.size() / Self::STRIDE) as u32
    }

    #[inline]
    pub fn usage(&self) -> wgpu::BufferUsages {
        self.usage
    }

    /// Slice covering the entire allocation.
    #[inline]
    pub fn slice(&self) -> wgpu::BufferSlice<'_> {
        self.buffer.slice(..)
    }

    /// Slice covering an element range.
    #[inline]
    pub fn slice_range(&self, range: std::ops::Range<u32>) -> wgpu::BufferSlice<'_> {
        self.buffer
            .slice(range.start as u64 * Self::STRIDE..range.end as u64 * Self::STRIDE)
    }

    /// Write data to the start of the buffer and update the length.
    ///
    /// The data must fit the current allocation; the buffer must have
    /// been created with `COPY_DST` usage.
    pub fn write(&mut self, queue: &wgpu::Queue, data: &[T]) {
        debug_assert!(data.len() as u32 <= self.capacity());
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(data));
        self.len = data.len() as u32;
    }

    /// Write data at an element offset without changing the length.
    pub fn write_at(&self, queue: &wgpu::Queue, offset: u32, data: &[T]) {
        queue.write_buffer(
            &self.buffer,
            offset as u64 * Self::STRIDE,
            bytemuck::cast_slice(data),
        );
    }

    /// Write data, reallocating to the next power of two if it does not
    /// fit the current allocation.
    ///
    /// Returns `true` when the buffer was reallocated; bind groups that
    /// reference it must then be rebuilt.
    pub fn write_grow(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, data: &[T]) -> bool {
        let needed = data.len() as u32;
        let reallocated = needed > self.capacity();
        if reallocated {
            let capacity = grow_capacity(needed);
            tracing::trace!(
                "growing buffer {:?}: {} -> {} elements",
                self.label,
                self.capacity(),
                capacity
            );
            self.buffer = Self::allocate(device, self.label.as_deref(), capacity, self.usage);
        }
        self.write(queue, data);
        reallocated
    }

    /// Binding resource for bind group creation.
    #[inline]
    pub fn as_binding(&self) -> wgpu::BindingResource<'_> {
        self.buffer.as_entire_binding()
    }

    /// The underlying buffer.
    #[inline]
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

/// A uniform buffer holding a single value of `T`.
pub type UniformBuffer<T> = TypedBuffer<T>;

impl<T: bytemuck::Pod> TypedBuffer<T> {
    /// Create a uniform buffer holding one value.
    pub fn new_uniform(device: &wgpu::Device, label: Option<&str>, data: &T) -> Self {
        Self::new(
            device,
            label,
            std::slice::from_ref(data),
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        )
    }

    /// Overwrite the single uniform value.
    pub fn write_uniform(&self, queue: &wgpu::Queue, data: &T) {
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(data));
    }
}

/// A GPU texture with cached default view and metadata.
pub struct GpuTexture {
    view: wgpu::TextureView,
    texture: wgpu::Texture,
    extent: wgpu::Extent3d,
    format: wgpu::TextureFormat,
}

fn extent_2d(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

fn descriptor_2d<'a>(
    label: Option<&'a str>,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> wgpu::TextureDescriptor<'a> {
    wgpu::TextureDescriptor {
        label,
        size: extent_2d(width, height),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    }
}

impl GpuTexture {
    /// Create a texture from a full descriptor, caching its default view.
    pub fn new(device: &wgpu::Device, descriptor: &wgpu::TextureDescriptor) -> Self {
        let texture = device.create_texture(descriptor);
        Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            texture,
            extent: descriptor.size,
            format: descriptor.format,
        }
    }

    /// Create a single-mip 2D texture.
    pub fn new_2d(
        device: &wgpu::Device,
        label: Option<&str>,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        Self::new(device, &descriptor_2d(label, width, height, format, usage))
    }

    /// Create a 2D texture initialized from raw pixel data.
    ///
    /// `data` must be tightly packed rows of `width` blocks.
    pub fn from_data(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: Option<&str>,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        data: &[u8],
    ) -> Self {
        let texture = Self::new_2d(
            device,
            label,
            width,
            height,
            format,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        let stride = width * format.block_copy_size(None).unwrap_or(4);
        queue.write_texture(
            texture.texture.as_image_copy(),
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(stride),
                rows_per_image: Some(height),
            },
            extent_2d(width, height),
        );
        texture
    }

    /// The default (full) texture view.
    #[inline]
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// The underlying texture.
    #[inline]
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    #[inline]
    pub fn size(&self) -> wgpu::Extent3d {
        self.extent
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.extent.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.extent.height
    }

    #[inline]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Binding resource for bind group creation.
    #[inline]
    pub fn as_binding(&self) -> wgpu::BindingResource<'_> {
        wgpu::BindingResource::TextureView(&self.view)
    }

    /// Create a custom view with different parameters.
    pub fn create_view(&self, descriptor: &wgpu::TextureViewDescriptor) -> wgpu::TextureView {
        self.texture.create_view(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grow_capacity() {
        assert_eq!(grow_capacity(0), MIN_GROW_CAPACITY);
        assert_eq!(grow_capacity(1), MIN_GROW_CAPACITY);
        assert_eq!(grow_capacity(16), 16);
        assert_eq!(grow_capacity(17), 32);
        assert_eq!(grow_capacity(1000), 1024);
        assert_eq!(grow_capacity(1024), 1024);
    }

    #[test]
    fn test_buffer_write_and_grow() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let mut buffer = TypedBuffer::<f32>::with_capacity(
            ctx.device(),
            Some("test"),
            4,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        );
        assert_eq!(buffer.capacity(), 4);
        assert!(buffer.is_empty());

        buffer.write(ctx.queue(), &[1.0, 2.0]);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.size(), 8);

        assert!(!buffer.write_grow(ctx.device(), ctx.queue(), &[0.0; 4]));
        assert!(buffer.write_grow(ctx.device(), ctx.queue(), &[0.0; 5]));
        assert_eq!(buffer.capacity(), MIN_GROW_CAPACITY);
        assert_eq!(buffer.len(), 5);
    }

    #[test]
    fn test_texture_metadata() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let texture = GpuTexture::new_2d(
            ctx.device(),
            Some("test"),
            32,
            16,
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureUsages::TEXTURE_BINDING,
        );
        assert_eq!(texture.width(), 32);
        assert_eq!(texture.height(), 16);
        assert_eq!(texture.format(), wgpu::TextureFormat::Rgba8Unorm);
    }
}
