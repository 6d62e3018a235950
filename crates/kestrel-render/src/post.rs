//! Post-processing passes: gaussian blur and bloom.
//!
//! [`Bloom`] is the usual pipeline: bright pixels are extracted into a
//! half-resolution target with a soft threshold, blurred with a few
//! separable gaussian passes, and added back onto the scene.
//!
//! # Example
//!
//! ```ignore
//! let mut bloom = Bloom::new(&ctx, 800, 600, surface_format);
//! bloom.settings.intensity = 1.5;
//!
//! // Each frame, after rendering the scene to an offscreen target:
//! bloom.apply(&mut encoder, scene.view(), &surface_view);
//! ```

use std::sync::Arc;

use kestrel_core::profiling::profile_function;

use crate::context::GraphicsContext;
use crate::types::{GpuTexture, UniformBuffer};

/// An offscreen color target that can be sampled by later passes.
pub struct RenderTarget {
    context: Arc<GraphicsContext>,
    texture: GpuTexture,
    label: Option<String>,
}

impl RenderTarget {
    pub fn new(
        context: &Arc<GraphicsContext>,
        label: Option<&str>,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            texture: Self::create_texture(context.device(), label, width, height, format),
            label: label.map(str::to_owned),
            context: context.clone(),
        }
    }

    fn create_texture(
        device: &wgpu::Device,
        label: Option<&str>,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> GpuTexture {
        GpuTexture::new_2d(
            device,
            label,
            width,
            height,
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
        )
    }

    /// Recreate the texture at a new size. Contents are lost.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.texture.width() == width && self.texture.height() == height {
            return;
        }
        self.texture = Self::create_texture(
            self.context.device(),
            self.label.as_deref(),
            width,
            height,
            self.texture.format(),
        );
    }

    #[inline]
    pub fn view(&self) -> &wgpu::TextureView {
        self.texture.view()
    }

    #[inline]
    pub fn texture(&self) -> &wgpu::Texture {
        self.texture.texture()
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.texture.width(), self.texture.height())
    }

    #[inline]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct BlurParams {
    texel_step: [f32; 2],
    _pad: [f32; 2],
}

/// Separable 9-tap gaussian blur.
///
/// Each pass runs the kernel horizontally into the scratch target and
/// vertically back out. Step sizes are uploaded per [`GaussianBlur::apply`]
/// call, so two applies on differently sized targets need a queue submit
/// between them.
pub struct GaussianBlur {
    context: Arc<GraphicsContext>,
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    h_params: UniformBuffer<BlurParams>,
    v_params: UniformBuffer<BlurParams>,
    format: wgpu::TextureFormat,
}

impl GaussianBlur {
    /// `format` is the format of the targets passed to [`GaussianBlur::apply`].
    pub fn new(context: &Arc<GraphicsContext>, format: wgpu::TextureFormat) -> Self {
        profile_function!();
        let device = context.device();

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("gaussian_blur"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/blur.wgsl").into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("gaussian_blur"),
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
                    visibility: wgpu::ShaderStages::FRAGMENT,
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
            label: Some("gaussian_blur"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("gaussian_blur"),
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

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("gaussian_blur"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let zero = BlurParams {
            texel_step: [0.0, 0.0],
            _pad: [0.0, 0.0],
        };
        Self {
            pipeline,
            layout,
            sampler,
            h_params: UniformBuffer::new_uniform(device, Some("blur_h_params"), &zero),
            v_params: UniformBuffer::new_uniform(device, Some("blur_v_params"), &zero),
            format,
            context: context.clone(),
        }
    }

    fn bind(&self, source: &wgpu::TextureView, params: &UniformBuffer<BlurParams>) -> wgpu::BindGroup {
        self.context
            .device()
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("gaussian_blur"),
                layout: &self.layout,
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
                        resource: params.as_binding(),
                    },
                ],
            })
    }

    fn run(&self, encoder: &mut wgpu::CommandEncoder, bind_group: &wgpu::BindGroup, output: &wgpu::TextureView) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("gaussian_blur"),
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
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..6, 0..1);
    }

    /// Blur `src` into `dst`, ping-ponging through `scratch`.
    ///
    /// `src` and `dst` may be the same target. All three must share the
    /// blur's format and one size. Does nothing when `passes` is zero.
    pub fn apply(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        src: &RenderTarget,
        scratch: &RenderTarget,
        dst: &RenderTarget,
        passes: u32,
    ) {
        profile_function!();
        debug_assert_eq!(src.format(), self.format);
        debug_assert_eq!(scratch.format(), self.format);
        debug_assert_eq!(dst.format(), self.format);
        debug_assert_eq!(src.size(), scratch.size());
        debug_assert_eq!(src.size(), dst.size());

        let (width, height) = src.size();
        let queue = self.context.queue();
        self.h_params.write_uniform(
            queue,
            &BlurParams {
                texel_step: [1.0 / width as f32, 0.0],
                _pad: [0.0, 0.0],
            },
        );
        self.v_params.write_uniform(
            queue,
            &BlurParams {
                texel_step: [0.0, 1.0 / height as f32],
                _pad: [0.0, 0.0],
            },
        );

        for pass in 0..passes {
            let source = if pass == 0 { src } else { dst };
            let horizontal = self.bind(source.view(), &self.h_params);
            self.run(encoder, &horizontal, scratch.view());

            let vertical = self.bind(scratch.view(), &self.v_params);
            self.run(encoder, &vertical, dst.view());
        }
    }
}

/// Format of the intermediate bloom targets.
const BLOOM_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct BloomParams {
    threshold: f32,
    knee: f32,
    intensity: f32,
    _pad: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomSettings {
    /// Brightness where pixels start to bloom.
    pub threshold: f32,
    /// Fraction of the threshold over which the knee curve ramps in.
    pub soft_knee: f32,
    /// Scale applied to the blurred contribution on combine.
    pub intensity: f32,
    /// Number of blur passes over the half-resolution bright target.
    pub passes: u32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            soft_knee: 0.5,
            intensity: 1.0,
            passes: 2,
        }
    }
}

/// Bright-pass bloom over a rendered scene.
pub struct Bloom {
    context: Arc<GraphicsContext>,
    extract_pipeline: wgpu::RenderPipeline,
    extract_layout: wgpu::BindGroupLayout,
    combine_pipeline: wgpu::RenderPipeline,
    combine_layout: wgpu::BindGroupLayout,
    params: UniformBuffer<BloomParams>,
    blur: GaussianBlur,
    bright: RenderTarget,
    scratch: RenderTarget,
    sampler: wgpu::Sampler,
    pub settings: BloomSettings,
}

impl Bloom {
    /// `width`/`height` is the scene size; the bright pass runs at half
    /// that. `output_format` is the format [`Bloom::apply`] renders to.
    pub fn new(
        context: &Arc<GraphicsContext>,
        width: u32,
        height: u32,
        output_format: wgpu::TextureFormat,
    ) -> Self {
        profile_function!();
        let device = context.device();

        let extract_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("bloom_extract"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/bloom_extract.wgsl").into()),
        });
        let combine_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("bloom_combine"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/bloom_combine.wgsl").into()),
        });

        let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
            },
            count: None,
        };
        let sampler_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };
        let uniform_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let extract_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bloom_extract"),
            entries: &[texture_entry(0), sampler_entry(1), uniform_entry(2)],
        });
        let combine_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bloom_combine"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                sampler_entry(2),
                uniform_entry(3),
            ],
        });

        let extract_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("bloom_extract"),
                bind_group_layouts: &[&extract_layout],
                push_constant_ranges: &[],
            });
        let extract_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("bloom_extract"),
            layout: Some(&extract_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &extract_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &extract_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: BLOOM_FORMAT,
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

        let combine_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("bloom_combine"),
                bind_group_layouts: &[&combine_layout],
                push_constant_ranges: &[],
            });
        let combine_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("bloom_combine"),
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

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("bloom"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let settings = BloomSettings::default();
        let (bright, scratch) = Self::create_targets(context, width, height);
        Self {
            extract_pipeline,
            extract_layout,
            combine_pipeline,
            combine_layout,
            params: UniformBuffer::new_uniform(
                device,
                Some("bloom_params"),
                &Self::params_for(&settings),
            ),
            blur: GaussianBlur::new(context, BLOOM_FORMAT),
            bright,
            scratch,
            sampler,
            settings,
            context: context.clone(),
        }
    }

    fn params_for(settings: &BloomSettings) -> BloomParams {
        BloomParams {
            threshold: settings.threshold,
            knee: settings.threshold * settings.soft_knee,
            intensity: settings.intensity,
            _pad: 0.0,
        }
    }

    fn create_targets(
        context: &Arc<GraphicsContext>,
        width: u32,
        height: u32,
    ) -> (RenderTarget, RenderTarget) {
        let half_width = (width / 2).max(1);
        let half_height = (height / 2).max(1);
        (
            RenderTarget::new(
                context,
                Some("bloom_bright"),
                half_width,
                half_height,
                BLOOM_FORMAT,
            ),
            RenderTarget::new(
                context,
                Some("bloom_scratch"),
                half_width,
                half_height,
                BLOOM_FORMAT,
            ),
        )
    }

    /// Bloom `scene` into `output`. Encodes the extract, blur, and
    /// combine passes; call once per frame.
    pub fn apply(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        scene: &wgpu::TextureView,
        output: &wgpu::TextureView,
    ) {
        profile_function!();
        let device = self.context.device();
        self.params
            .write_uniform(self.context.queue(), &Self::params_for(&self.settings));

        let extract_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("bloom_extract"),
            layout: &self.extract_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(scene),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.params.as_binding(),
                },
            ],
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("bloom_extract"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.bright.view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.push_debug_group("Bloom::extract");
            pass.set_pipeline(&self.extract_pipeline);
            pass.set_bind_group(0, &extract_group, &[]);
            pass.draw(0..6, 0..1);
            pass.pop_debug_group();
        }

        self.blur.apply(
            encoder,
            &self.bright,
            &self.scratch,
            &self.bright,
            self.settings.passes,
        );

        let combine_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("bloom_combine"),
            layout: &self.combine_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(scene),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(self.bright.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.params.as_binding(),
                },
            ],
        });
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("bloom_combine"),
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
        pass.push_debug_group("Bloom::combine");
        pass.set_pipeline(&self.combine_pipeline);
        pass.set_bind_group(0, &combine_group, &[]);
        pass.draw(0..6, 0..1);
        pass.pop_debug_group();
    }

    /// Recreate the intermediate targets for a new scene size.
    pub fn resize(&mut self, width: u32, height: u32) {
        let half_width = (width / 2).max(1);
        let half_height = (height / 2).max(1);
        self.bright.resize(half_width, half_height);
        self.scratch.resize(half_width, half_height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::image::ImageData;
    use crate::readback::GpuReadback;

    const SIZE: u32 = 64;

    fn clear_target(ctx: &Arc<GraphicsContext>, target: &RenderTarget, color: Color) {
        let mut encoder = ctx
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("post_test_clear"),
            });
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("post_test_clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.view(),
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(color.to_wgpu()),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        ctx.queue().submit(Some(encoder.finish()));
    }

    fn run_bloom(
        ctx: &Arc<GraphicsContext>,
        scene: &ImageData,
        settings: BloomSettings,
    ) -> ImageData {
        let scene_texture = GpuTexture::from_data(
            ctx.device(),
            ctx.queue(),
            Some("post_test_scene"),
            scene.width(),
            scene.height(),
            wgpu::TextureFormat::Rgba8Unorm,
            scene.pixels(),
        );
        let output = RenderTarget::new(
            ctx,
            Some("post_test_output"),
            scene.width(),
            scene.height(),
            wgpu::TextureFormat::Rgba8Unorm,
        );

        let mut bloom = Bloom::new(
            ctx,
            scene.width(),
            scene.height(),
            wgpu::TextureFormat::Rgba8Unorm,
        );
        bloom.settings = settings;

        let mut encoder = ctx
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("post_test"),
            });
        bloom.apply(&mut encoder, scene_texture.view(), output.view());
        ctx.queue().submit(Some(encoder.finish()));

        GpuReadback::from_texture(ctx, output.texture())
            .unwrap()
            .read_image()
            .unwrap()
    }

    #[test]
    fn test_blur_preserves_flat_field() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let format = wgpu::TextureFormat::Rgba8Unorm;
        let target = RenderTarget::new(&ctx, Some("blur_test"), SIZE, SIZE, format);
        let scratch = RenderTarget::new(&ctx, Some("blur_test_scratch"), SIZE, SIZE, format);
        clear_target(&ctx, &target, Color::rgb(0.5, 0.5, 0.5));

        let blur = GaussianBlur::new(&ctx, format);
        let mut encoder = ctx
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("blur_test"),
            });
        blur.apply(&mut encoder, &target, &scratch, &target, 2);
        ctx.queue().submit(Some(encoder.finish()));

        let image = GpuReadback::from_texture(&ctx, target.texture())
            .unwrap()
            .read_image()
            .unwrap();
        // A constant image is a fixed point of the kernel; edge clamping
        // keeps it flat at the borders too.
        for (x, y) in [(32, 32), (0, 0), (63, 0), (0, 63), (63, 63)] {
            let value = image.pixel(x, y).unwrap()[0] as i32;
            assert!((value - 128).abs() <= 2, "({x}, {y}) drifted to {value}");
        }
    }

    #[test]
    fn test_bloom_leaves_dark_scene_untouched() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let gray = Color::from_rgba_u8(64, 64, 64, 255);
        let scene = ImageData::filled(SIZE, SIZE, gray);
        let image = run_bloom(&ctx, &scene, BloomSettings::default());

        assert_eq!(image.pixel(32, 32), Some([64, 64, 64, 255]));
        assert_eq!(image.pixel(1, 62), Some([64, 64, 64, 255]));
    }

    #[test]
    fn test_bloom_glows_around_bright_region() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let mut scene = ImageData::filled(SIZE, SIZE, Color::rgba(0.0, 0.0, 0.0, 1.0));
        for y in 28..36 {
            for x in 28..36 {
                scene.set_pixel(x, y, Color::WHITE);
            }
        }
        let image = run_bloom(&ctx, &scene, BloomSettings::default());

        // The block itself stays saturated, pixels just outside pick up
        // the blurred spill, and far corners stay black.
        assert_eq!(image.pixel(32, 32), Some([255, 255, 255, 255]));
        let spill = image.pixel(40, 32).unwrap()[0];
        assert!(spill > 0, "no glow outside the bright block");
        assert_eq!(image.pixel(4, 4), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_bloom_applies_after_resize() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let gray = Color::from_rgba_u8(64, 64, 64, 255);
        let scene = ImageData::filled(32, 32, gray);
        let scene_texture = GpuTexture::from_data(
            ctx.device(),
            ctx.queue(),
            Some("post_test_scene"),
            32,
            32,
            wgpu::TextureFormat::Rgba8Unorm,
            scene.pixels(),
        );
        let output = RenderTarget::new(
            &ctx,
            Some("post_test_output"),
            32,
            32,
            wgpu::TextureFormat::Rgba8Unorm,
        );

        let mut bloom = Bloom::new(&ctx, SIZE, SIZE, wgpu::TextureFormat::Rgba8Unorm);
        bloom.resize(32, 32);

        let mut encoder = ctx
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("post_test"),
            });
        bloom.apply(&mut encoder, scene_texture.view(), output.view());
        ctx.queue().submit(Some(encoder.finish()));

        let image = GpuReadback::from_texture(&ctx, output.texture())
            .unwrap()
            .read_image()
            .unwrap();
        assert_eq!(image.pixel(16, 16), Some([64, 64, 64, 255]));
    }

    #[test]
    fn test_render_target_resize_keeps_format() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let mut target = RenderTarget::new(
            &ctx,
            Some("resize_test"),
            32,
            32,
            wgpu::TextureFormat::Rgba16Float,
        );
        target.resize(64, 48);
        assert_eq!(target.size(), (64, 48));
        assert_eq!(target.format(), wgpu::TextureFormat::Rgba16Float);
    }
}
