//! GPU-to-CPU texture readback.
//!
//! Copies a texture into a mappable staging buffer at creation, then
//! blocks on the map when [`GpuReadback::read`] is called. Used by the
//! test suite to verify atlas contents and render output pixel by pixel,
//! and available to applications for screenshots.
//!
//! # Example
//!
//! ```ignore
//! use kestrel_render::GpuReadback;
//!
//! let readback = GpuReadback::from_texture(&context, atlas.texture())?;
//! let image = readback.read_image()?;
//! let top_left = image.pixel(0, 0);
//! ```

use std::sync::Arc;

use crate::{GraphicsContext, ImageData};

/// GPU readback error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadbackError {
    /// Mapping the staging buffer failed or the callback never fired.
    MapFailed(String),
    /// The mapped bytes could not be converted into an image.
    EncodeFailed(String),
    /// Writing the output file failed.
    IoError(String),
    /// The source texture has a zero dimension.
    InvalidDimensions,
    /// The source format is not a 4-byte-per-pixel color format.
    UnsupportedFormat(wgpu::TextureFormat),
}

impl std::fmt::Display for ReadbackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MapFailed(msg) => write!(f, "buffer mapping failed: {msg}"),
            Self::EncodeFailed(msg) => write!(f, "image encoding failed: {msg}"),
            Self::IoError(msg) => write!(f, "io error: {msg}"),
            Self::InvalidDimensions => write!(f, "invalid dimensions for readback"),
            Self::UnsupportedFormat(format) => {
                write!(f, "unsupported texture format for readback: {format:?}")
            }
        }
    }
}

impl std::error::Error for ReadbackError {}

pub type ReadbackResult<T> = Result<T, ReadbackError>;

/// Row stride a buffer copy of `width` pixels must use.
///
/// wgpu requires `bytes_per_row` in texture-buffer copies to be a
/// multiple of [`wgpu::COPY_BYTES_PER_ROW_ALIGNMENT`].
fn padded_row_stride(width: u32, bytes_per_pixel: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (width * bytes_per_pixel).div_ceil(align) * align
}

/// Staged copy of a texture, ready to be mapped into CPU memory.
pub struct GpuReadback {
    context: Arc<GraphicsContext>,
    buffer: wgpu::Buffer,
    dimensions: (u32, u32),
    /// Stride of one row in the staging buffer, including padding.
    row_stride: u32,
    format: wgpu::TextureFormat,
}

impl GpuReadback {
    /// Copy `texture` into a staging buffer.
    ///
    /// The texture must have `COPY_SRC` usage and a 4-byte-per-pixel
    /// format. The copy is submitted immediately.
    pub fn from_texture(
        context: &Arc<GraphicsContext>,
        texture: &wgpu::Texture,
    ) -> ReadbackResult<Self> {
        let (width, height) = (texture.width(), texture.height());
        if width == 0 || height == 0 {
            return Err(ReadbackError::InvalidDimensions);
        }

        let format = texture.format();
        let bytes_per_pixel = match format {
            wgpu::TextureFormat::Rgba8Unorm
            | wgpu::TextureFormat::Rgba8UnormSrgb
            | wgpu::TextureFormat::Bgra8Unorm
            | wgpu::TextureFormat::Bgra8UnormSrgb => 4,
            _ => return Err(ReadbackError::UnsupportedFormat(format)),
        };
        let row_stride = padded_row_stride(width, bytes_per_pixel);

        let buffer = context.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback_buffer"),
            size: row_stride as wgpu::BufferAddress * height as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder =
            context
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("readback_encoder"),
                });
        encoder.copy_texture_to_buffer(
            texture.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(row_stride),
                    rows_per_image: Some(height),
                },
            },
            texture.size(),
        );
        context.queue().submit(Some(encoder.finish()));

        Ok(Self {
            context: context.clone(),
            buffer,
            dimensions: (width, height),
            row_stride,
            format,
        })
    }

    /// Map the staging buffer and return the pixels, blocking until the
    /// GPU finishes. Row padding is stripped; the result is tightly
    /// packed `width * height * 4` bytes.
    pub fn read(&self) -> ReadbackResult<Vec<u8>> {
        let slice = self.buffer.slice(..);

        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        let _ = self.context.device().poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        });

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(ReadbackError::MapFailed(e.to_string())),
            Err(_) => {
                return Err(ReadbackError::MapFailed(
                    "map callback never fired".to_string(),
                ));
            }
        }

        let (width, height) = self.dimensions;
        let row_bytes = width as usize * 4;
        let mapped = slice.get_mapped_range();

        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for row in mapped.chunks_exact(self.row_stride as usize) {
            pixels.extend_from_slice(&row[..row_bytes]);
        }

        drop(mapped);
        self.buffer.unmap();

        Ok(pixels)
    }

    /// Read the pixels into an [`ImageData`].
    ///
    /// Only RGBA-ordered formats are accepted; BGRA readbacks would need
    /// a channel swizzle first.
    pub fn read_image(&self) -> ReadbackResult<ImageData> {
        match self.format {
            wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => {}
            format => return Err(ReadbackError::UnsupportedFormat(format)),
        }
        let pixels = self.read()?;
        ImageData::from_pixels(self.dimensions.0, self.dimensions.1, pixels)
            .map_err(|e| ReadbackError::EncodeFailed(e.to_string()))
    }

    /// Save the pixels as a PNG file.
    #[cfg(feature = "image")]
    pub fn save_png(&self, path: impl AsRef<std::path::Path>) -> ReadbackResult<()> {
        let (width, height) = self.dimensions;
        let pixels = self.read()?;
        image::RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| ReadbackError::EncodeFailed("pixel buffer size mismatch".to_string()))?
            .save(path)
            .map_err(|e| ReadbackError::IoError(e.to_string()))
    }

    /// Texture dimensions (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    /// Format of the source texture.
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Color, GpuTexture};

    #[test]
    fn test_error_display() {
        let err = ReadbackError::MapFailed("test".to_string());
        assert!(err.to_string().contains("buffer mapping failed"));

        let err = ReadbackError::UnsupportedFormat(wgpu::TextureFormat::R32Float);
        assert!(err.to_string().contains("R32Float"));
    }

    #[test]
    fn test_padded_row_stride() {
        // 256-aligned widths pass through untouched.
        assert_eq!(padded_row_stride(64, 4), 256);
        assert_eq!(padded_row_stride(128, 4), 512);
        // Everything else rounds up to the next multiple of 256.
        assert_eq!(padded_row_stride(1, 4), 256);
        assert_eq!(padded_row_stride(33, 4), 256);
        assert_eq!(padded_row_stride(100, 4), 512);
    }

    #[test]
    fn test_round_trip_through_texture() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };

        // Width 33 forces row padding in the staging buffer.
        let source = ImageData::filled(33, 7, Color::from_rgba_u8(10, 20, 30, 255));
        let texture = GpuTexture::new_2d(
            ctx.device(),
            Some("readback_test"),
            source.width(),
            source.height(),
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
        );
        ctx.queue().write_texture(
            texture.texture().as_image_copy(),
            source.pixels(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(source.width() * 4),
                rows_per_image: Some(source.height()),
            },
            texture.size(),
        );

        let readback = GpuReadback::from_texture(&ctx, texture.texture()).unwrap();
        let image = readback.read_image().unwrap();
        assert_eq!(image.size(), source.size());
        assert_eq!(image.pixels(), source.pixels());
    }
}
