//! 2D point light accumulation.
//!
//! Lights accumulate additively into an off-screen `Rgba16Float`
//! buffer cleared to the ambient color each frame, then the combine
//! pass multiplies a diffuse image by the accumulated lighting. The
//! high-precision target lets stacked lights exceed 1.0 for bloom to
//! pick up later.
//!
//! # Example
//!
//! ```ignore
//! let mut lights = LightLayer::new(&ctx, 800, 600, surface_format);
//!
//! // Each frame:
//! lights.render(&mut encoder, &mut camera, &frame_lights, Color::rgb(0.1, 0.1, 0.15));
//! lights.combine(&mut encoder, scene.view(), &surface_view);
//! ```

use std::sync::Arc;

use glam::Vec2;
use kestrel_core::profiling::profile_function;

use crate::camera::{Camera2D, WindowBlock};
use crate::color::Color;
use crate::context::GraphicsContext;
use crate::types::{GpuTexture, TypedBuffer, UniformBuffer};

/// Format of the accumulation buffer.
pub const LIGHT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// A point light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    /// World position.
    pub position: Vec2,
    /// Reach in world units.
    pub radius: f32,
    /// Falloff exponent; zero gives a hard-edged disc.
    pub attenuation: f32,
    /// Light color; alpha scales brightness.
    pub color: Color,
}

impl Light {
    pub fn new(position: Vec2, radius: f32, color: Color) -> Self {
        Self {
            position,
            radius,
            attenuation: 1.0,
            color,
        }
    }

    pub fn with_attenuation(mut self, attenuation: f32) -> Self {
        self.attenuation = attenuation;
        self
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct LightInstance {
    position: [f32; 2],
    radius: f32,
    attenuation: f32,
    color: [f32; 4],
}

static_assertions::assert_eq_size!(LightInstance, [u8; 32]);

impl LightInstance {
    const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<LightInstance>() as u64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &wgpu::vertex_attr_array![
            0 => Float32x2,
            1 => Float32,
            2 => Float32,
            3 => Float32x4,
        ],
    };
}

impl From<&Light> for LightInstance {
    fn from(light: &Light) -> Self {
        Self {
            position: light.position.to_array(),
            radius: light.radius,
            attenuation: light.attenuation,
            color: light.color.to_array(),
        }
    }
}

/// Accumulates point lights and modulates a diffuse image by them.
pub struct LightLayer {
    context: Arc<GraphicsContext>,
    accumulation: GpuTexture,
    accumulate_pipeline: wgpu::RenderPipeline,
    combine_pipeline: wgpu::RenderPipeline,
    combine_layout: wgpu::BindGroupLayout,
    window_buffer: UniformBuffer<WindowBlock>,
    window_bind_group: wgpu::BindGroup,
    instances: TypedBuffer<LightInstance>,
    sampler: wgpu::Sampler,
    light_count: u32,
}

impl LightLayer {
    /// `output_format` is the format [`LightLayer::combine`] renders to.
    pub fn new(
        context: &Arc<GraphicsContext>,
        width: u32,
        height: u32,
        output_format: wgpu::TextureFormat,
    ) -> Self {
        profile_function!();
        let device = context.device();

        let accumulate_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("light_accumulate"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/light.wgsl").into()),
        });
        let combine_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("light_combine"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/light_combine.wgsl").into()),
        });

        let window_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("light_window"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let accumulate_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("light_accumulate"),
            bind_group_layouts: &[&window_layout],
            push_constant_ranges: &[],
        });

        let additive = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        };
        let accumulate_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("light_accumulate"),
            layout: Some(&accumulate_layout),
            vertex: wgpu::VertexState {
                module: &accumulate_shader,
                entry_point: Some("vs_main"),
                buffers: &[LightInstance::LAYOUT],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &accumulate_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: LIGHT_FORMAT,
                    blend: Some(wgpu::BlendState {
                        color: additive,
                        alpha: additive,
                    }),
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

        let combine_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("light_combine"),
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
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let combine_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("light_combine"),
                bind_group_layouts: &[&combine_layout],
                push_constant_ranges: &[],
            });
        let combine_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("light_combine"),
            layout: Some(&combine_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &combine_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &combine_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: output_format,
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

        let window_buffer =
            UniformBuffer::new_uniform(device, Some("light_window"), &WindowBlock::default());
        let window_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("light_window"),
            layout: &window_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: window_buffer.as_binding(),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("light_combine"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            accumulation: Self::create_accumulation(device, width, height),
            accumulate_pipeline,
            combine_pipeline,
            combine_layout,
            window_buffer,
            window_bind_group,
            instances: TypedBuffer::with_capacity(
                device,
                Some("light_instances"),
                64,
                wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            ),
            sampler,
            light_count: 0,
            context: context.clone(),
        }
    }

    fn create_accumulation(device: &wgpu::Device, width: u32, height: u32) -> GpuTexture {
        GpuTexture::new_2d(
            device,
            Some("light_accumulation"),
            width,
            height,
            LIGHT_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        )
    }

    /// Accumulate `lights` over an ambient base. Encodes one render
    /// pass; call once per frame before [`LightLayer::combine`].
    pub fn render(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        camera: &mut Camera2D,
        lights: &[Light],
        ambient: Color,
    ) {
        profile_function!();
        let queue = self.context.queue();
        self.window_buffer
            .write_uniform(queue, &WindowBlock::from_camera(camera));

        self.light_count = lights.len() as u32;
        if !lights.is_empty() {
            let instances: Vec<LightInstance> = lights.iter().map(LightInstance::from).collect();
            self.instances
                .write_grow(self.context.device(), queue, &instances);
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("light_accumulate"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: self.accumulation.view(),
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(ambient.to_wgpu()),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        if !lights.is_empty() {
            pass.push_debug_group("LightLayer::render");
            pass.set_pipeline(&self.accumulate_pipeline);
            pass.set_bind_group(0, &self.window_bind_group, &[]);
            pass.set_vertex_buffer(0, self.instances.slice());
            pass.draw(0..6, 0..self.light_count);
            pass.pop_debug_group();
        }
    }

    /// Multiply `diffuse` by the accumulated lighting into `output`.
    pub fn combine(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        diffuse: &wgpu::TextureView,
        output: &wgpu::TextureView,
    ) {
        profile_function!();
        let bind_group = self
            .context
            .device()
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("light_combine"),
                layout: &self.combine_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(diffuse),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(self.accumulation.view()),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("light_combine"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.push_debug_group("LightLayer::combine");
        pass.set_pipeline(&self.combine_pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..6, 0..1);
        pass.pop_debug_group();
    }

    /// Recreate the accumulation buffer, e.g. after a window resize.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.accumulation.width() == width && self.accumulation.height() == height {
            return;
        }
        self.accumulation = Self::create_accumulation(self.context.device(), width, height);
    }

    /// The accumulated lighting, e.g. for debug display.
    pub fn view(&self) -> &wgpu::TextureView {
        self.accumulation.view()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.accumulation.width(), self.accumulation.height())
    }
}
