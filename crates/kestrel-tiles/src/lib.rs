//! Kestrel Tiles
//!
//! Loads [Tiled](https://www.mapeditor.org/) `.tsx` tileset files: sheet
//! geometry, the image reference, and per-tile custom properties. The
//! crate is CPU-only; pairing a tileset with `kestrel-render` is a loop
//! over [`Tileset::tile_source_rect`], cutting each rect out of the sheet
//! with `ImageData::sub_image` and feeding it to `TextureAtlas::add_image`.
//!
//! ```
//! use kestrel_tiles::Tileset;
//!
//! let tsx = r#"<?xml version="1.0" encoding="UTF-8"?>
//! <tileset name="terrain" tilewidth="16" tileheight="16" tilecount="4" columns="2">
//!  <image source="terrain.png" width="32" height="32"/>
//! </tileset>"#;
//!
//! let tileset = Tileset::from_str(tsx).unwrap();
//! assert_eq!(tileset.tile_source_rect(3).unwrap().x, 16);
//! ```

pub mod error;
pub mod tileset;
pub mod xml;

pub use error::{TsxError, TsxResult};
pub use tileset::{Property, PropertyValue, Tileset, TilesetImage};
