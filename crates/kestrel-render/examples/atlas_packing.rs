//! Texture atlas packing and growth example.
//!
//! This example shows how to:
//! - Pack images of mixed sizes into one shared texture
//! - Watch the atlas double and migrate its contents on the GPU
//! - Inspect slots, usage, and the epoch counter that tells renderers
//!   to rebuild their bind groups
//!
//! Run with: cargo run -p kestrel-render --example atlas_packing

use kestrel_core::logging;
use kestrel_render::{AtlasOptions, Color, GraphicsContext, ImageData, TextureAtlas};

fn main() {
    logging::init();

    let ctx = GraphicsContext::new_owned_sync().expect("Failed to create graphics context");

    // Start deliberately small so growth kicks in quickly.
    let mut atlas = TextureAtlas::new(
        &ctx,
        AtlasOptions {
            size: 64,
            border: 2,
            ..AtlasOptions::default()
        },
    )
    .expect("Failed to create atlas");

    // Mixed tile sizes, the kind a spritesheet import produces.
    let sides: [u32; 12] = [16, 16, 24, 8, 32, 16, 48, 8, 24, 32, 16, 64];
    for (i, &side) in sides.iter().enumerate() {
        let name = format!("tile{i}");
        let shade = 60 + i as u8 * 16;
        let tile = ImageData::filled(side, side, Color::from_rgba_u8(shade, shade, 255, 255));

        let size_before = atlas.size();
        let slot = atlas
            .add_image(name.as_str(), &tile)
            .expect("Failed to pack tile");
        if atlas.size() != size_before {
            println!(
                "  atlas grew {size_before} -> {} packing {name} (epoch {})",
                atlas.size(),
                atlas.epoch()
            );
        }
        let rect = atlas.entry(name.as_str()).unwrap().rect;
        println!(
            "packed {name} ({side:2}x{side:2}) into slot {slot} at ({:3}, {:3})",
            rect.x, rect.y
        );
    }

    println!(
        "final: {0}x{0} atlas, {1} entries, {2:.0}% full, epoch {3}",
        atlas.size(),
        atlas.len(),
        atlas.usage_ratio() * 100.0,
        atlas.epoch()
    );

    // Slots are stable identities: an explicit resize moves the pixels
    // and rewrites the UV records, but every slot index survives.
    let slot_before = atlas.slot("tile0").unwrap();
    let rect_before = atlas.entry("tile0").unwrap().rect;
    atlas.resize(atlas.size() * 2).expect("Failed to resize");
    let entry = atlas.entry("tile0").unwrap();
    println!(
        "after resize: tile0 slot {slot_before} -> {}, rect ({}, {}) -> ({}, {})",
        atlas.slot("tile0").unwrap(),
        rect_before.x,
        rect_before.y,
        entry.rect.x,
        entry.rect.y
    );

    // Removing frees the slot for reuse; the pixels stay until the next
    // rebuild repacks the surviving entries.
    atlas.remove("tile1").expect("Failed to remove");
    atlas.rebuild().expect("Failed to rebuild");
    println!(
        "after remove + rebuild: {} entries, {:.0}% full",
        atlas.len(),
        atlas.usage_ratio() * 100.0
    );
}
