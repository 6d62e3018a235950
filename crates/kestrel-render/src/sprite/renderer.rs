//! Instanced sprite list rendering.

use std::sync::Arc;

use kestrel_core::profiling::profile_function;

use crate::atlas::TextureAtlas;
use crate::camera::{Camera2D, WindowBlock};
use crate::context::GraphicsContext;
use crate::sampler_cache::{SamplerCache, SamplerKey};
use crate::types::UniformBuffer;

use super::{SpriteList, SpriteSyncStats};

/// Default half-texel UV correction, in texels.
pub const DEFAULT_UV_OFFSET_BIAS: f32 = 0.5;

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct SpriteParams {
    spritelist_color: [f32; 4],
    uv_offset_bias: f32,
    culling_enabled: u32,
    _pad: [f32; 2],
}

static_assertions::assert_eq_size!(SpriteParams, [u8; 32]);

/// Draws a [`SpriteList`] against a [`TextureAtlas`] in one instanced
/// draw call.
///
/// Call [`SpriteRenderer::prepare`] once per frame outside the render
/// pass, then [`SpriteRenderer::render`] inside it. The renderer caches
/// its bind groups and rebuilds them only when the atlas or the list
/// reallocates a texture or buffer.
///
/// # Example
///
/// ```ignore
/// let stats = renderer.prepare(&mut camera, &mut atlas, &mut sprites);
///
/// let mut pass = encoder.begin_render_pass(&descriptor).forget_lifetime();
/// renderer.render(&mut pass, &sprites);
/// ```
pub struct SpriteRenderer {
    context: Arc<GraphicsContext>,
    pipeline: wgpu::RenderPipeline,
    texture_layout: wgpu::BindGroupLayout,
    data_layout: wgpu::BindGroupLayout,
    window_buffer: UniformBuffer<WindowBlock>,
    params_buffer: UniformBuffer<SpriteParams>,
    window_bind_group: wgpu::BindGroup,
    samplers: SamplerCache,
    /// Cached against the atlas epoch.
    texture_bind_group: Option<(u64, wgpu::BindGroup)>,
    /// Cached against the sprite list's buffer epoch.
    data_bind_group: Option<(u64, wgpu::BindGroup)>,
    uv_offset_bias: f32,
    culling_enabled: bool,
}

impl SpriteRenderer {
    pub fn new(context: &Arc<GraphicsContext>, target_format: wgpu::TextureFormat) -> Self {
        profile_function!();
        let device = context.device();

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sprite"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/sprite.wgsl").into()),
        });

        let window_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprite_window"),
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

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprite_texture"),
            entries: &[
                // Sampled in the fragment stage; the vertex stage also
                // reads its dimensions for the half-texel UV bias.
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
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
                // UV table, read with textureLoad in the vertex stage.
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    },
                    count: None,
                },
            ],
        });

        let storage_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let data_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprite_data"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_entry(1),
                storage_entry(2),
                storage_entry(3),
                storage_entry(4),
                storage_entry(5),
                storage_entry(6),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sprite"),
            bind_group_layouts: &[&window_layout, &texture_layout, &data_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sprite"),
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
                    format: target_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
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

        let window_buffer = UniformBuffer::new_uniform(
            device,
            Some("sprite_window"),
            &WindowBlock::default(),
        );
        let params_buffer = UniformBuffer::new_uniform(
            device,
            Some("sprite_params"),
            &SpriteParams {
                spritelist_color: [1.0; 4],
                uv_offset_bias: DEFAULT_UV_OFFSET_BIAS,
                culling_enabled: 0,
                _pad: [0.0; 2],
            },
        );
        let window_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sprite_window"),
            layout: &window_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: window_buffer.as_binding(),
            }],
        });

        Self {
            pipeline,
            texture_layout,
            data_layout,
            window_buffer,
            params_buffer,
            window_bind_group,
            samplers: SamplerCache::new(),
            texture_bind_group: None,
            data_bind_group: None,
            uv_offset_bias: DEFAULT_UV_OFFSET_BIAS,
            culling_enabled: false,
            context: context.clone(),
        }
    }

    /// UV correction in texels; see the `uv_offset_bias` shader param.
    pub fn set_uv_offset_bias(&mut self, bias: f32) {
        self.uv_offset_bias = bias;
    }

    /// Cull off-screen sprites in the vertex stage.
    pub fn set_culling_enabled(&mut self, enabled: bool) {
        self.culling_enabled = enabled;
    }

    /// Sync sprite and atlas data and refresh bind groups. Call once
    /// per frame, outside the render pass.
    pub fn prepare(
        &mut self,
        camera: &mut Camera2D,
        atlas: &mut TextureAtlas,
        sprites: &mut SpriteList,
    ) -> SpriteSyncStats {
        profile_function!();
        let stats = sprites.sync();
        atlas.flush();

        let queue = self.context.queue();
        self.window_buffer
            .write_uniform(queue, &WindowBlock::from_camera(camera));
        self.params_buffer.write_uniform(
            queue,
            &SpriteParams {
                spritelist_color: sprites.tint().to_array(),
                uv_offset_bias: self.uv_offset_bias,
                culling_enabled: u32::from(self.culling_enabled),
                _pad: [0.0; 2],
            },
        );

        let atlas_epoch = atlas.epoch();
        if !matches!(&self.texture_bind_group, Some((epoch, _)) if *epoch == atlas_epoch) {
            self.texture_bind_group = Some((atlas_epoch, self.create_texture_bind_group(atlas, sprites)));
        }

        let buffers_epoch = sprites.buffers_epoch();
        if !matches!(&self.data_bind_group, Some((epoch, _)) if *epoch == buffers_epoch) {
            self.data_bind_group = Some((buffers_epoch, self.create_data_bind_group(sprites)));
        }

        stats
    }

    fn create_texture_bind_group(
        &self,
        atlas: &TextureAtlas,
        sprites: &SpriteList,
    ) -> wgpu::BindGroup {
        let device = self.context.device();
        let sampler = self
            .samplers
            .get_or_create(device, SamplerKey::for_filter(sprites.filter()));
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sprite_texture"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(atlas.texture_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(atlas.uv_texture_view()),
                },
            ],
        })
    }

    fn create_data_bind_group(&self, sprites: &SpriteList) -> wgpu::BindGroup {
        self.context
            .device()
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("sprite_data"),
                layout: &self.data_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.params_buffer.as_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: sprites.positions_buffer().as_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: sprites.sizes_buffer().as_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: sprites.angles_buffer().as_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: sprites.colors_buffer().as_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: sprites.slots_buffer().as_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 6,
                        resource: sprites.order_buffer().as_binding(),
                    },
                ],
            })
    }

    /// Draw the list. [`SpriteRenderer::prepare`] must have run this
    /// frame with the same atlas and list.
    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>, sprites: &SpriteList) {
        profile_function!();
        if sprites.is_empty() {
            return;
        }
        let (Some((_, texture_bg)), Some((_, data_bg))) =
            (&self.texture_bind_group, &self.data_bind_group)
        else {
            tracing::warn!("SpriteRenderer::render called before prepare, skipping");
            return;
        };

        pass.push_debug_group("SpriteRenderer::render");
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.window_bind_group, &[]);
        pass.set_bind_group(1, texture_bg, &[]);
        pass.set_bind_group(2, data_bg, &[]);
        pass.draw(0..6, 0..sprites.len() as u32);
        pass.pop_debug_group();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::AtlasOptions;
    use crate::color::Color;
    use crate::image::ImageData;
    use crate::readback::GpuReadback;
    use crate::sprite::{SpriteDescriptor, SpriteListOptions};
    use crate::types::GpuTexture;
    use glam::{Vec2, Vec3};

    const TARGET: u32 = 64;

    struct Scene {
        ctx: Arc<GraphicsContext>,
        atlas: TextureAtlas,
        sprites: SpriteList,
        camera: Camera2D,
        renderer: SpriteRenderer,
        target: GpuTexture,
    }

    impl Scene {
        fn new(ctx: Arc<GraphicsContext>) -> Self {
            let mut atlas = TextureAtlas::new(
                &ctx,
                AtlasOptions {
                    size: 64,
                    ..AtlasOptions::default()
                },
            )
            .unwrap();
            atlas
                .add_image("white", &ImageData::filled(4, 4, Color::WHITE))
                .unwrap();
            atlas
                .add_image("red", &ImageData::filled(4, 4, Color::RED))
                .unwrap();
            atlas
                .add_image("blue", &ImageData::filled(4, 4, Color::BLUE))
                .unwrap();

            let target = GpuTexture::new_2d(
                ctx.device(),
                Some("sprite_test_target"),
                TARGET,
                TARGET,
                wgpu::TextureFormat::Rgba8Unorm,
                wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            );

            Self {
                atlas,
                sprites: SpriteList::new(&ctx, SpriteListOptions::default()),
                camera: Camera2D::new(TARGET as f32, TARGET as f32),
                renderer: SpriteRenderer::new(&ctx, wgpu::TextureFormat::Rgba8Unorm),
                target,
                ctx,
            }
        }

        fn draw(&mut self) -> ImageData {
            self.renderer
                .prepare(&mut self.camera, &mut self.atlas, &mut self.sprites);

            let mut encoder =
                self.ctx
                    .device()
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("sprite_test"),
                    });
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("sprite_test"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: self.target.view(),
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
                self.renderer.render(&mut pass, &self.sprites);
            }
            self.ctx.queue().submit(Some(encoder.finish()));

            GpuReadback::from_texture(&self.ctx, self.target.texture())
                .unwrap()
                .read_image()
                .unwrap()
        }

        /// World position to readback pixel. World y points up, rows
        /// point down.
        fn pixel(image: &ImageData, world_x: u32, world_y: u32) -> [u8; 4] {
            image.pixel(world_x, TARGET - 1 - world_y).unwrap()
        }
    }

    #[test]
    fn test_draws_sprite_at_world_position() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let mut scene = Scene::new(ctx);
        scene
            .sprites
            .create(
                &scene.atlas,
                &SpriteDescriptor::new("red", Vec3::new(32.0, 32.0, 0.0))
                    .with_size(Vec2::splat(16.0)),
            )
            .unwrap();

        let image = scene.draw();
        assert_eq!(Scene::pixel(&image, 32, 32), [255, 0, 0, 255]);
        // Well outside the 16x16 quad nothing was written.
        assert_eq!(Scene::pixel(&image, 8, 8), [0, 0, 0, 0]);
        assert_eq!(Scene::pixel(&image, 56, 56), [0, 0, 0, 0]);
    }

    #[test]
    fn test_each_sprite_samples_its_own_atlas_entry() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let mut scene = Scene::new(ctx);
        for (key, x) in [("red", 16.0), ("blue", 48.0)] {
            scene
                .sprites
                .create(
                    &scene.atlas,
                    &SpriteDescriptor::new(key, Vec3::new(x, 32.0, 0.0))
                        .with_size(Vec2::splat(16.0)),
                )
                .unwrap();
        }

        let image = scene.draw();
        assert_eq!(Scene::pixel(&image, 16, 32), [255, 0, 0, 255]);
        assert_eq!(Scene::pixel(&image, 48, 32), [0, 0, 255, 255]);
    }

    #[test]
    fn test_sprite_color_and_list_tint() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let mut scene = Scene::new(ctx);
        scene
            .sprites
            .create(
                &scene.atlas,
                &SpriteDescriptor::new("white", Vec3::new(32.0, 32.0, 0.0))
                    .with_size(Vec2::splat(16.0))
                    .with_color(Color::rgb(1.0, 0.0, 0.0)),
            )
            .unwrap();
        scene.sprites.set_tint(Color::rgb(1.0, 0.0, 1.0));

        // white texel * red sprite color * magenta tint = red.
        let image = scene.draw();
        assert_eq!(Scene::pixel(&image, 32, 32), [255, 0, 0, 255]);
    }

    #[test]
    fn test_rotation_quarter_turn() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let mut scene = Scene::new(ctx);
        let id = scene
            .sprites
            .create(
                &scene.atlas,
                &SpriteDescriptor::new("red", Vec3::new(32.0, 32.0, 0.0))
                    .with_size(Vec2::new(16.0, 8.0)),
            )
            .unwrap();

        // Unrotated: wide. (32 +- 6, 32) inside, (32, 32 +- 6) outside.
        let image = scene.draw();
        assert_eq!(Scene::pixel(&image, 38, 32), [255, 0, 0, 255]);
        assert_eq!(Scene::pixel(&image, 32, 38), [0, 0, 0, 0]);

        // Quarter turn: tall.
        scene.sprites.set_angle(id, 90.0).unwrap();
        let image = scene.draw();
        assert_eq!(Scene::pixel(&image, 38, 32), [0, 0, 0, 0]);
        assert_eq!(Scene::pixel(&image, 32, 38), [255, 0, 0, 255]);
    }

    #[test]
    fn test_draw_order_controls_overlap() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let mut scene = Scene::new(ctx);
        let red = scene
            .sprites
            .create(
                &scene.atlas,
                &SpriteDescriptor::new("red", Vec3::new(32.0, 32.0, 0.0))
                    .with_size(Vec2::splat(16.0)),
            )
            .unwrap();
        let blue = scene
            .sprites
            .create(
                &scene.atlas,
                &SpriteDescriptor::new("blue", Vec3::new(32.0, 32.0, 0.0))
                    .with_size(Vec2::splat(16.0)),
            )
            .unwrap();

        // Creation order: blue drew last.
        let image = scene.draw();
        assert_eq!(Scene::pixel(&image, 32, 32), [0, 0, 255, 255]);

        scene.sprites.set_draw_order(&[blue, red]).unwrap();
        let image = scene.draw();
        assert_eq!(Scene::pixel(&image, 32, 32), [255, 0, 0, 255]);
    }

    #[test]
    fn test_z_sort_orders_sprites() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let mut scene = Scene::new(ctx);
        scene
            .sprites
            .create(
                &scene.atlas,
                &SpriteDescriptor::new("red", Vec3::new(32.0, 32.0, 5.0))
                    .with_size(Vec2::splat(16.0)),
            )
            .unwrap();
        scene
            .sprites
            .create(
                &scene.atlas,
                &SpriteDescriptor::new("blue", Vec3::new(32.0, 32.0, 1.0))
                    .with_size(Vec2::splat(16.0)),
            )
            .unwrap();

        // Highest z draws last.
        scene.sprites.sort_draw_order_by_z();
        let image = scene.draw();
        assert_eq!(Scene::pixel(&image, 32, 32), [255, 0, 0, 255]);
    }

    #[test]
    fn test_culling_keeps_visible_sprites() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let mut scene = Scene::new(ctx);
        scene.renderer.set_culling_enabled(true);
        scene
            .sprites
            .create(
                &scene.atlas,
                &SpriteDescriptor::new("red", Vec3::new(32.0, 32.0, 0.0))
                    .with_size(Vec2::splat(16.0)),
            )
            .unwrap();
        // Center far outside the viewport but the quad still reaches
        // into it; the bounding-circle test must keep it.
        scene
            .sprites
            .create(
                &scene.atlas,
                &SpriteDescriptor::new("blue", Vec3::new(-30.0, 10.0, 0.0))
                    .with_size(Vec2::splat(80.0)),
            )
            .unwrap();

        let image = scene.draw();
        assert_eq!(Scene::pixel(&image, 32, 32), [255, 0, 0, 255]);
        assert_eq!(Scene::pixel(&image, 2, 10), [0, 0, 255, 255]);
    }

    #[test]
    fn test_survives_atlas_growth() {
        let Some(ctx) = crate::context::test_context() else {
            return;
        };
        let mut scene = Scene::new(ctx);
        scene
            .sprites
            .create(
                &scene.atlas,
                &SpriteDescriptor::new("red", Vec3::new(32.0, 32.0, 0.0))
                    .with_size(Vec2::splat(16.0)),
            )
            .unwrap();
        let image = scene.draw();
        assert_eq!(Scene::pixel(&image, 32, 32), [255, 0, 0, 255]);

        // Force the atlas to migrate; the cached bind group must be
        // rebuilt against the new textures and UVs.
        let epoch = scene.atlas.epoch();
        scene.atlas.resize(128).unwrap();
        assert!(scene.atlas.epoch() > epoch);

        let image = scene.draw();
        assert_eq!(Scene::pixel(&image, 32, 32), [255, 0, 0, 255]);
    }
}
