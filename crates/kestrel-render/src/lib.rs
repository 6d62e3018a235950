//! Kestrel Render
//!
//! GPU rendering for the Kestrel engine: a graphics context, a dynamic
//! texture atlas with border extrusion, GPU-driven sprite batching, and a
//! small 2D lighting / post-processing stack. Everything renders into
//! caller-provided command encoders and render passes, so the crate works
//! headless as well as against a window surface.

pub mod atlas;
pub mod camera;
pub mod color;
pub mod context;
pub mod image;
pub mod light;
pub mod post;
pub mod readback;
pub mod sampler_cache;
pub mod sprite;
pub mod types;

pub use atlas::blit::{AtlasBlitter, clamp_blit_uv};
pub use atlas::{
    AtlasEntry, AtlasError, AtlasKey, AtlasOptions, AtlasResult, TextureAtlas, UvRecord,
    extrude_rgba,
};
pub use camera::{Camera2D, WindowBlock};
pub use color::Color;
pub use context::{ContextError, ContextResult, GraphicsContext, GraphicsContextDescriptor};
pub use image::{ImageData, ImageError, ImageResult};
pub use light::{Light, LightLayer};
pub use post::{Bloom, BloomSettings, GaussianBlur, RenderTarget};
pub use readback::{GpuReadback, ReadbackError, ReadbackResult};
pub use sampler_cache::{SamplerCache, SamplerKey};
pub use sprite::{
    SpriteDescriptor, SpriteError, SpriteId, SpriteList, SpriteListOptions, SpriteResult,
    SpriteSyncStats, renderer::SpriteRenderer,
};
pub use types::{GpuTexture, TypedBuffer, UniformBuffer};
