//! Headless sprite rendering example.
//!
//! This example shows how to:
//! - Create a graphics context without a window
//! - Pack procedural images into the texture atlas
//! - Batch sprites and draw them with a single instanced call
//! - Read the frame back and inspect what was rendered
//!
//! Run with: cargo run -p kestrel-render --example headless_sprites

use glam::{Vec2, Vec3};
use kestrel_core::logging;
use kestrel_render::{
    AtlasOptions, Camera2D, Color, GpuReadback, GpuTexture, GraphicsContext, ImageData,
    SpriteDescriptor, SpriteList, SpriteListOptions, SpriteRenderer, TextureAtlas,
};

const WIDTH: u32 = 256;
const HEIGHT: u32 = 256;

/// A simple two-color checkerboard tile.
fn checkerboard(size: u32, cell: u32, a: Color, b: Color) -> ImageData {
    let mut image = ImageData::filled(size, size, a);
    for y in 0..size {
        for x in 0..size {
            if (x / cell + y / cell) % 2 == 0 {
                image.set_pixel(x, y, b);
            }
        }
    }
    image
}

fn main() {
    logging::init();

    let ctx = GraphicsContext::new_owned_sync().expect("Failed to create graphics context");

    // Pack a few procedural tiles.
    let mut atlas =
        TextureAtlas::new(&ctx, AtlasOptions::default()).expect("Failed to create atlas");
    atlas
        .add_image("checker", &checkerboard(16, 4, Color::WHITE, Color::BLACK))
        .expect("Failed to pack checker tile");
    atlas
        .add_image("red", &ImageData::filled(16, 16, Color::RED))
        .expect("Failed to pack red tile");
    atlas
        .add_image("sky", &ImageData::filled(16, 16, Color::from_rgba_u8(90, 160, 255, 255)))
        .expect("Failed to pack sky tile");

    // A small scene: a rotated checker tile flanked by solid tiles.
    let mut sprites = SpriteList::new(&ctx, SpriteListOptions::default());
    sprites
        .create(
            &atlas,
            &SpriteDescriptor::new("checker", Vec3::new(128.0, 128.0, 0.0))
                .with_size(Vec2::splat(64.0))
                .with_angle(30.0),
        )
        .unwrap();
    let left = sprites
        .create(
            &atlas,
            &SpriteDescriptor::new("red", Vec3::new(48.0, 128.0, 0.0))
                .with_size(Vec2::splat(32.0)),
        )
        .unwrap();
    sprites
        .create(
            &atlas,
            &SpriteDescriptor::new("sky", Vec3::new(208.0, 128.0, 0.0))
                .with_size(Vec2::splat(32.0)),
        )
        .unwrap();

    let mut camera = Camera2D::new(WIDTH as f32, HEIGHT as f32);
    let mut renderer = SpriteRenderer::new(&ctx, wgpu::TextureFormat::Rgba8Unorm);
    let target = GpuTexture::new_2d(
        ctx.device(),
        Some("headless_target"),
        WIDTH,
        HEIGHT,
        wgpu::TextureFormat::Rgba8Unorm,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
    );

    let stats = renderer.prepare(&mut camera, &mut atlas, &mut sprites);
    println!(
        "first sync: {} buffer(s) rewritten, {} bytes uploaded",
        stats.buffers_rewritten, stats.bytes_uploaded
    );
    render_frame(&ctx, &renderer, &sprites, &target);

    // Move one sprite. Dirty tracking means the next sync only
    // rewrites the position buffer.
    sprites
        .set_position(left, Vec3::new(48.0, 64.0, 0.0))
        .unwrap();
    let stats = renderer.prepare(&mut camera, &mut atlas, &mut sprites);
    println!(
        "after one move: {} buffer(s) rewritten, {} bytes uploaded",
        stats.buffers_rewritten, stats.bytes_uploaded
    );
    render_frame(&ctx, &renderer, &sprites, &target);

    // Read the frame back and sample a few pixels. World y points up,
    // readback rows point down.
    let image = GpuReadback::from_texture(&ctx, target.texture())
        .expect("Failed to create readback")
        .read_image()
        .expect("Failed to read frame");
    let sample = |x: u32, y: u32| image.pixel(x, HEIGHT - 1 - y).unwrap();

    println!("red tile    @ ( 48,  64): {:?}", sample(48, 64));
    println!("checker     @ (128, 128): {:?}", sample(128, 128));
    println!("sky tile    @ (208, 128): {:?}", sample(208, 128));
    println!("background  @ (  8,   8): {:?}", sample(8, 8));
}

fn render_frame(
    ctx: &GraphicsContext,
    renderer: &SpriteRenderer,
    sprites: &SpriteList,
    target: &GpuTexture,
) {
    let mut encoder = ctx
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("headless_sprites"),
        });
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("headless_sprites"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.view(),
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
        renderer.render(&mut pass, sprites);
    }
    ctx.queue().submit(Some(encoder.finish()));
}
