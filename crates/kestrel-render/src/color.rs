/// An RGBA color with `f32` components in the `0.0..=1.0` range.
///
/// Sprites store their per-instance color packed into a single `u32`
/// (see [`Color::pack_rgba8`]), which the sprite shader expands with
/// `unpack4x8unorm`. Uniforms take the full-precision form via
/// [`Color::to_array`].
///
/// ```
/// use kestrel_render::Color;
///
/// let tint = Color::rgba(1.0, 1.0, 1.0, 0.5);
/// let sky = Color::from_hex(0x87CEEB);
/// let packed = tint.pack_rgba8();
/// ```
///
/// `Color` is `Pod` and laid out as four consecutive `f32`s, matching a
/// WGSL `vec4<f32>`, so uniform structs can embed it directly.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    pub const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    /// Opaque color from RGB components.
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Color from 8-bit components, mapped into `0.0..=1.0`.
    pub fn from_rgba_u8(r: u8, g: u8, b: u8, a: u8) -> Self {
        let normalize = |c: u8| c as f32 / 255.0;
        Self {
            r: normalize(r),
            g: normalize(g),
            b: normalize(b),
            a: normalize(a),
        }
    }

    /// Opaque color from a 24-bit RGB hex value (e.g. `0x87CEEB`).
    pub fn from_hex(hex: u32) -> Self {
        let [_, r, g, b] = hex.to_be_bytes();
        Self::from_rgba_u8(r, g, b, 255)
    }

    /// Returns the same color with a different alpha.
    pub const fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// Convert to 8-bit RGBA values, clamping each component.
    pub fn to_rgba_u8(self) -> [u8; 4] {
        let quantize = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [
            quantize(self.r),
            quantize(self.g),
            quantize(self.b),
            quantize(self.a),
        ]
    }

    /// Pack into a `u32` with R in the low byte and A in the high byte.
    ///
    /// This matches WGSL `unpack4x8unorm`, which maps bits 0..8 of the
    /// value to `.x` (red) and bits 24..32 to `.w` (alpha).
    pub fn pack_rgba8(self) -> u32 {
        u32::from_le_bytes(self.to_rgba_u8())
    }

    /// Unpack a color packed with [`Color::pack_rgba8`].
    pub fn unpack_rgba8(packed: u32) -> Self {
        let [r, g, b, a] = packed.to_le_bytes();
        Self::from_rgba_u8(r, g, b, a)
    }

    /// Widen to the `f64`-based `wgpu::Color`, e.g. for clear values.
    pub fn to_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: self.r as f64,
            g: self.g as f64,
            b: self.b as f64,
            a: self.a as f64,
        }
    }

    /// Components as an `[r, g, b, a]` array.
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl From<[f32; 4]> for Color {
    fn from([r, g, b, a]: [f32; 4]) -> Self {
        Self { r, g, b, a }
    }
}

impl From<Color> for [f32; 4] {
    fn from(color: Color) -> Self {
        color.to_array()
    }
}
