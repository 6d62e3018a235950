//! Lighting and bloom over a sprite scene, rendered headless.
//!
//! This example shows how to:
//! - Render sprites into an offscreen diffuse target
//! - Accumulate point lights over an ambient base
//! - Multiply the diffuse by the light map and bloom the result
//!
//! Run with: cargo run -p kestrel-render --example lit_scene

use glam::{Vec2, Vec3};
use kestrel_core::logging;
use kestrel_render::{
    AtlasOptions, Bloom, Camera2D, Color, GpuReadback, GpuTexture, GraphicsContext, ImageData,
    Light, LightLayer, SpriteDescriptor, SpriteList, SpriteListOptions, SpriteRenderer,
    TextureAtlas,
};

const WIDTH: u32 = 256;
const HEIGHT: u32 = 256;
const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

fn main() {
    logging::init();

    let ctx = GraphicsContext::new_owned_sync().expect("Failed to create graphics context");

    // A floor of gray tiles with a bright emissive crystal in the middle.
    let mut atlas =
        TextureAtlas::new(&ctx, AtlasOptions::default()).expect("Failed to create atlas");
    atlas
        .add_image("floor", &ImageData::filled(16, 16, Color::from_rgba_u8(140, 140, 150, 255)))
        .expect("Failed to pack floor tile");
    atlas
        .add_image("crystal", &ImageData::filled(16, 16, Color::from_rgba_u8(160, 230, 255, 255)))
        .expect("Failed to pack crystal tile");

    let mut sprites = SpriteList::new(&ctx, SpriteListOptions::default());
    for row in 0..8 {
        for col in 0..8 {
            sprites
                .create(
                    &atlas,
                    &SpriteDescriptor::new(
                        "floor",
                        Vec3::new(16.0 + col as f32 * 32.0, 16.0 + row as f32 * 32.0, 0.0),
                    )
                    .with_size(Vec2::splat(32.0)),
                )
                .unwrap();
        }
    }
    sprites
        .create(
            &atlas,
            &SpriteDescriptor::new("crystal", Vec3::new(128.0, 128.0, 1.0))
                .with_size(Vec2::splat(24.0)),
        )
        .unwrap();
    sprites.sort_draw_order_by_z();

    let mut camera = Camera2D::new(WIDTH as f32, HEIGHT as f32);
    let mut renderer = SpriteRenderer::new(&ctx, FORMAT);
    let mut light_layer = LightLayer::new(&ctx, WIDTH, HEIGHT, FORMAT);
    let mut bloom = Bloom::new(&ctx, WIDTH, HEIGHT, FORMAT);
    bloom.settings.threshold = 0.6;
    bloom.settings.intensity = 1.2;

    // The crystal casts a cool light; a warm lamp sits near a corner.
    let lights = [
        Light::new(Vec2::new(128.0, 128.0), 90.0, Color::rgba(0.6, 0.9, 1.0, 1.0)),
        Light::new(Vec2::new(48.0, 208.0), 60.0, Color::rgba(1.0, 0.8, 0.5, 1.0))
            .with_attenuation(2.0),
    ];
    let ambient = Color::rgba(0.12, 0.12, 0.18, 1.0);

    // Offscreen chain: sprites -> diffuse, lights x diffuse -> lit,
    // lit + bloom -> final.
    let diffuse = color_target(&ctx, "lit_scene_diffuse", wgpu::TextureUsages::TEXTURE_BINDING);
    let lit = color_target(&ctx, "lit_scene_lit", wgpu::TextureUsages::TEXTURE_BINDING);
    let output = color_target(&ctx, "lit_scene_output", wgpu::TextureUsages::COPY_SRC);

    renderer.prepare(&mut camera, &mut atlas, &mut sprites);

    let mut encoder = ctx
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("lit_scene"),
        });
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("lit_scene_sprites"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: diffuse.view(),
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
        renderer.render(&mut pass, &sprites);
    }
    light_layer.render(&mut encoder, &mut camera, &lights, ambient);
    light_layer.combine(&mut encoder, diffuse.view(), lit.view());
    bloom.apply(&mut encoder, lit.view(), output.view());
    ctx.queue().submit(Some(encoder.finish()));

    let image = GpuReadback::from_texture(&ctx, output.texture())
        .expect("Failed to create readback")
        .read_image()
        .expect("Failed to read frame");
    let sample = |x: u32, y: u32| image.pixel(x, HEIGHT - 1 - y).unwrap();

    println!("crystal (lit + bloomed) @ (128, 128): {:?}", sample(128, 128));
    println!("floor near the lamp    @ ( 48, 208): {:?}", sample(48, 208));
    println!("floor in shadow        @ (224,  32): {:?}", sample(224, 32));
}

fn color_target(
    ctx: &GraphicsContext,
    label: &'static str,
    extra: wgpu::TextureUsages,
) -> GpuTexture {
    GpuTexture::new_2d(
        ctx.device(),
        Some(label),
        WIDTH,
        HEIGHT,
        FORMAT,
        wgpu::TextureUsages::RENDER_ATTACHMENT | extra,
    )
}
