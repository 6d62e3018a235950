//! GPU blits into atlas entries.
//!
//! [`AtlasBlitter`] draws a source texture into an entry's padded rect,
//! extruding the border in the same draw: the quad covers the border
//! ring, and the fragment shader clamps UVs to the source's content
//! region. Use it when the pixels already live on the GPU (render-to-
//! texture content, video frames); [`TextureAtlas::add_image`] stays
//! the path for CPU-side pixels.
//!
//! [`TextureAtlas::add_image`]: super::TextureAtlas::add_image

use std::sync::Arc;

use glam::Vec2;
use kestrel_core::geometry::Size;
use kestrel_core::profiling::profile_function;

use crate::context::GraphicsContext;
use super::{AtlasError, AtlasKey, AtlasResult, TextureAtlas};

/// Mirror of the blit shader's UV adjustment.
///
/// `uv` in content space maps to a source-texture coordinate clamped to
/// `[0, content_ratio - 2 / tex_size]`, where `content_ratio` is the
/// content size over the source texture size. The two-texel inset keeps
/// linear filtering inside the content even at the clamp boundary.
pub fn clamp_blit_uv(uv: Vec2, content_ratio: Vec2, tex_size: Vec2) -> Vec2 {
    let hi = (content_ratio - 2.0 / tex_size).max(Vec2::ZERO);
    (uv * content_ratio).clamp(Vec2::ZERO, hi)
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct BlitParams {
    uv_scale: [f32; 2],
    uv_offset: [f32; 2],
    content_ratio: [f32; 2],
    tex_size: [f32; 2],
}

/// Renders a source texture into a [`TextureAtlas`] entry.
pub struct AtlasBlitter {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    format: wgpu::TextureFormat,
    context: Arc<GraphicsContext>,
}

impl AtlasBlitter {
    /// `format` must match the atlas color format.
    pub fn new(context: &Arc<GraphicsContext>, format: wgpu::TextureFormat) -> Self {
        profile_function!();
        let device = context.device();

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("atlas_blit"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/blit.wgsl").into()),
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("atlas_blit"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("atlas_blit"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("atlas_blit"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("atlas_blit"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            bind_group_layout,
            sampler,
            format,
            context: context.clone(),
        }
    }

    /// Draw `source` into the entry for `key`, border ring included.
    ///
    /// The top-left `content_size` pixels of `source` (whose full size
    /// is `source_size`) are scaled to fill the entry's content rect.
    /// Submits its own command buffer.
    pub fn blit_into(
        &self,
        atlas: &TextureAtlas,
        key: impl Into<AtlasKey>,
        source: &wgpu::TextureView,
        content_size: Size<u32>,
        source_size: Size<u32>,
    ) -> AtlasResult<()> {
        profile_function!();
        debug_assert!(self.format == atlas.format(), "blitter format mismatch");
        debug_assert!(
            content_size.width > 0
                && content_size.height > 0
                && content_size.width <= source_size.width
                && content_size.height <= source_size.height,
            "content must be a non-empty region of the source texture"
        );

        let entry = atlas.entry(key).ok_or(AtlasError::UnknownKey)?;
        let border = atlas.border();
        let rect = entry.rect;

        let content = Vec2::new(rect.width as f32, rect.height as f32);
        let padded = content + 2.0 * border as f32;
        let params = BlitParams {
            uv_scale: (padded / content).to_array(),
            uv_offset: (-Vec2::splat(border as f32) / content).to_array(),
            content_ratio: [
                content_size.width as f32 / source_size.width as f32,
                content_size.height as f32 / source_size.height as f32,
            ],
            tex_size: [source_size.width as f32, source_size.height as f32],
        };

        let device = self.context.device();
        let params_buffer = {
            use wgpu::util::DeviceExt;
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("atlas_blit_params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            })
        };

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("atlas_blit"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("atlas_blit"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("atlas_blit"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: atlas.texture_view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.push_debug_group("AtlasBlitter::blit_into");
            pass.set_viewport(
                (rect.x - border) as f32,
                (rect.y - border) as f32,
                padded.x,
                padded.y,
                0.0,
                1.0,
            );
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..6, 0..1);
            pass.pop_debug_group();
        }
        self.context.queue().submit(Some(encoder.finish()));
        Ok(())
    }
}
