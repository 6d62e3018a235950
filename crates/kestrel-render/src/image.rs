//! CPU-side RGBA8 image data.
//!
//! [`ImageData`] is what the texture atlas accepts: a width, a height,
//! and tightly packed RGBA bytes. Images can be built procedurally,
//! cropped out of a larger sheet, or (with the `image` feature) decoded
//! from PNG bytes.

use crate::color::Color;
use kestrel_core::geometry::{Rect, Size};

/// Error constructing or manipulating an [`ImageData`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    /// The pixel byte count does not match `width * height * 4`.
    SizeMismatch {
        width: u32,
        height: u32,
        bytes: usize,
    },
    /// A requested region falls outside the image.
    OutOfBounds {
        rect: Rect<u32>,
        size: Size<u32>,
    },
    /// Decoding compressed image bytes failed.
    #[cfg(feature = "image")]
    Decode { reason: String },
    /// Reading an image file failed.
    #[cfg(feature = "image")]
    Load { path: String, reason: String },
}

impl std::fmt::Display for ImageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SizeMismatch {
                width,
                height,
                bytes,
            } => write!(
                f,
                "expected {} bytes for a {width}x{height} RGBA image, got {bytes}",
                width * height * 4
            ),
            Self::OutOfBounds { rect, size } => write!(
                f,
                "region {}x{} at ({}, {}) is outside a {}x{} image",
                rect.width, rect.height, rect.x, rect.y, size.width, size.height
            ),
            #[cfg(feature = "image")]
            Self::Decode { reason } => write!(f, "image decode failed: {reason}"),
            #[cfg(feature = "image")]
            Self::Load { path, reason } => write!(f, "failed to load {path}: {reason}"),
        }
    }
}

impl std::error::Error for ImageError {}

pub type ImageResult<T> = Result<T, ImageError>;

/// A CPU-side image with tightly packed RGBA8 pixels, row-major from the
/// top-left corner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl ImageData {
    /// Wrap existing RGBA bytes. Fails if the byte count does not match
    /// the dimensions or either dimension is zero.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u8>) -> ImageResult<Self> {
        if width == 0 || height == 0 || pixels.len() != (width * height * 4) as usize {
            return Err(ImageError::SizeMismatch {
                width,
                height,
                bytes: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Create an image filled with a single color.
    ///
    /// # Panics
    /// Panics if either dimension is zero.
    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        assert!(
            width > 0 && height > 0,
            "image dimensions must be non-zero"
        );
        let rgba = color.to_rgba_u8();
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            pixels.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Decode a PNG (or any format the `image` crate recognizes) into
    /// RGBA8 pixels.
    #[cfg(feature = "image")]
    pub fn from_png_bytes(bytes: &[u8]) -> ImageResult<Self> {
        let decoded = ::image::load_from_memory(bytes)
            .map_err(|e| ImageError::Decode {
                reason: e.to_string(),
            })?
            .to_rgba8();
        let (width, height) = decoded.dimensions();
        Self::from_pixels(width, height, decoded.into_raw())
    }

    /// Load and decode an image file.
    #[cfg(feature = "image")]
    pub fn load(path: impl AsRef<std::path::Path>) -> ImageResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| ImageError::Load {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_png_bytes(&bytes)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn size(&self) -> Size<u32> {
        Size::new(self.width, self.height)
    }

    /// The raw RGBA bytes.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Consume the image, returning the raw RGBA bytes.
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// The RGBA bytes of one pixel, or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y * self.width + x) * 4) as usize;
        Some([
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
            self.pixels[offset + 3],
        ])
    }

    /// Overwrite one pixel. Ignored outside the image.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = ((y * self.width + x) * 4) as usize;
        self.pixels[offset..offset + 4].copy_from_slice(&color.to_rgba_u8());
    }

    /// Copy a region into a new image. Used to cut individual tiles out
    /// of a spritesheet before packing them into the atlas.
    pub fn sub_image(&self, rect: Rect<u32>) -> ImageResult<ImageData> {
        if rect.width == 0
            || rect.height == 0
            || rect.right() > self.width
            || rect.bottom() > self.height
        {
            return Err(ImageError::OutOfBounds {
                rect,
                size: self.size(),
            });
        }

        let mut pixels = Vec::with_capacity((rect.width * rect.height * 4) as usize);
        for row in 0..rect.height {
            let start = (((rect.y + row) * self.width + rect.x) * 4) as usize;
            pixels.extend_from_slice(&self.pixels[start..start + (rect.width * 4) as usize]);
        }

        Ok(ImageData {
            width: rect.width,
            height: rect.height,
            pixels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pixels_validates_length() {
        assert!(ImageData::from_pixels(2, 2, vec![0; 16]).is_ok());
        assert!(matches!(
            ImageData::from_pixels(2, 2, vec![0; 15]),
            Err(ImageError::SizeMismatch { bytes: 15, .. })
        ));
        assert!(ImageData::from_pixels(0, 2, vec![]).is_err());
    }

    #[test]
    fn test_filled_and_pixel() {
        let image = ImageData::filled(3, 2, Color::RED);
        assert_eq!(image.pixels().len(), 24);
        assert_eq!(image.pixel(2, 1), Some([255, 0, 0, 255]));
        assert_eq!(image.pixel(3, 0), None);
    }

    #[test]
    fn test_set_pixel() {
        let mut image = ImageData::filled(2, 2, Color::BLACK);
        image.set_pixel(1, 0, Color::GREEN);
        assert_eq!(image.pixel(1, 0), Some([0, 255, 0, 255]));
        assert_eq!(image.pixel(0, 0), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_sub_image_copies_region() {
        let mut sheet = ImageData::filled(4, 4, Color::BLACK);
        sheet.set_pixel(2, 1, Color::BLUE);

        let tile = sheet.sub_image(Rect::new(2, 1, 2, 2)).unwrap();
        assert_eq!(tile.size(), Size::new(2, 2));
        assert_eq!(tile.pixel(0, 0), Some([0, 0, 255, 255]));
        assert_eq!(tile.pixel(1, 1), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_sub_image_out_of_bounds() {
        let sheet = ImageData::filled(4, 4, Color::BLACK);
        assert!(sheet.sub_image(Rect::new(3, 3, 2, 2)).is_err());
        assert!(sheet.sub_image(Rect::new(0, 0, 0, 1)).is_err());
    }
}
