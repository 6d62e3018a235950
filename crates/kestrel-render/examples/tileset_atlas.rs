//! Tileset import example: slice a spritesheet along a Tiled `.tsx`
//! grid and pack every tile into the atlas.
//!
//! This example shows how to:
//! - Parse a `.tsx` tileset definition
//! - Cut tiles out of a spritesheet honoring margin and spacing
//! - Pack each tile as its own atlas entry and draw a small map
//!
//! Run with: cargo run -p kestrel-render --example tileset_atlas

use glam::{Vec2, Vec3};
use kestrel_core::logging;
use kestrel_render::{
    AtlasOptions, Camera2D, Color, GpuReadback, GpuTexture, GraphicsContext, ImageData,
    SpriteDescriptor, SpriteList, SpriteListOptions, SpriteRenderer, TextureAtlas,
};
use kestrel_tiles::Tileset;

const WIDTH: u32 = 128;
const HEIGHT: u32 = 128;

/// The kind of `.tsx` Tiled writes for a packed spritesheet.
const TERRAIN_TSX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tileset version="1.10" tiledversion="1.10.2" name="terrain"
         tilewidth="16" tileheight="16" spacing="1" margin="2"
         tilecount="8" columns="4">
 <image source="terrain.png" width="71" height="37"/>
</tileset>
"#;

/// Stand-in for the sheet `terrain.png` describes: one flat color per
/// tile cell, margin and spacing left black.
fn generate_sheet(tileset: &Tileset) -> ImageData {
    let image = tileset.image.as_ref().expect("tileset has no image");
    let mut sheet = ImageData::filled(image.width, image.height, Color::BLACK);
    let colors = [
        Color::from_rgba_u8(34, 139, 34, 255),   // grass
        Color::from_rgba_u8(194, 178, 128, 255), // sand
        Color::from_rgba_u8(70, 130, 180, 255),  // water
        Color::from_rgba_u8(112, 112, 112, 255), // stone
        Color::from_rgba_u8(139, 90, 43, 255),   // dirt
        Color::from_rgba_u8(240, 240, 250, 255), // snow
        Color::from_rgba_u8(160, 40, 40, 255),   // lava rock
        Color::from_rgba_u8(40, 90, 40, 255),    // forest
    ];
    for tile_id in 0..tileset.tile_count {
        let rect = tileset.tile_source_rect(tile_id).unwrap();
        let color = colors[tile_id as usize % colors.len()];
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                sheet.set_pixel(x, y, color);
            }
        }
    }
    sheet
}

fn main() {
    logging::init();

    let tileset = Tileset::from_str(TERRAIN_TSX).expect("Failed to parse tileset");
    println!(
        "tileset '{}': {} tiles of {}x{}, {} columns",
        tileset.name, tileset.tile_count, tileset.tile_width, tileset.tile_height,
        tileset.columns
    );

    let ctx = GraphicsContext::new_owned_sync().expect("Failed to create graphics context");
    let mut atlas =
        TextureAtlas::new(&ctx, AtlasOptions::default()).expect("Failed to create atlas");

    // Slice the sheet along the tileset grid; every tile becomes its own
    // atlas entry with an extruded border.
    let sheet = generate_sheet(&tileset);
    for tile_id in 0..tileset.tile_count {
        let rect = tileset.tile_source_rect(tile_id).unwrap();
        let tile = sheet.sub_image(rect).expect("tile rect outside sheet");
        atlas
            .add_image(format!("terrain/{tile_id}").as_str(), &tile)
            .expect("Failed to pack tile");
    }
    println!(
        "packed {} tiles into a {size}x{size} atlas ({pct:.0}% full)",
        atlas.len(),
        size = atlas.size(),
        pct = atlas.usage_ratio() * 100.0
    );

    // An 8x8 map drawn from tile ids.
    #[rustfmt::skip]
    let map: [[u32; 8]; 8] = [
        [7, 7, 0, 0, 0, 1, 2, 2],
        [7, 0, 0, 0, 1, 1, 2, 2],
        [0, 0, 0, 1, 1, 2, 2, 2],
        [0, 0, 4, 1, 2, 2, 2, 2],
        [0, 4, 4, 1, 1, 2, 2, 2],
        [3, 3, 4, 0, 1, 1, 2, 2],
        [3, 3, 5, 5, 0, 1, 1, 2],
        [3, 5, 5, 5, 0, 0, 1, 1],
    ];

    let mut sprites = SpriteList::new(&ctx, SpriteListOptions::default());
    for (row, line) in map.iter().enumerate() {
        for (col, tile_id) in line.iter().enumerate() {
            // Row 0 is the top of the map; world y points up.
            let x = 8.0 + col as f32 * 16.0;
            let y = HEIGHT as f32 - 8.0 - row as f32 * 16.0;
            sprites
                .create(
                    &atlas,
                    &SpriteDescriptor::new(
                        format!("terrain/{tile_id}").as_str(),
                        Vec3::new(x, y, 0.0),
                    )
                    .with_size(Vec2::splat(16.0)),
                )
                .unwrap();
        }
    }

    let mut camera = Camera2D::new(WIDTH as f32, HEIGHT as f32);
    let mut renderer = SpriteRenderer::new(&ctx, wgpu::TextureFormat::Rgba8Unorm);
    let target = GpuTexture::new_2d(
        ctx.device(),
        Some("tileset_atlas_target"),
        WIDTH,
        HEIGHT,
        wgpu::TextureFormat::Rgba8Unorm,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
    );

    renderer.prepare(&mut camera, &mut atlas, &mut sprites);
    let mut encoder = ctx
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("tileset_atlas"),
        });
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("tileset_atlas"),
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
        renderer.render(&mut pass, &sprites);
    }
    ctx.queue().submit(Some(encoder.finish()));

    let image = GpuReadback::from_texture(&ctx, target.texture())
        .expect("Failed to create readback")
        .read_image()
        .expect("Failed to read frame");

    // Top-left map cell is tile 7 (forest); bottom-right is tile 1 (sand).
    println!("top-left cell:     {:?}", image.pixel(8, 8).unwrap());
    println!("bottom-right cell: {:?}", image.pixel(120, 120).unwrap());
}
