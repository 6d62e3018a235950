//! Tiled `.tsx` tileset files.
//!
//! Parses the sheet geometry (tile size, margin, spacing, column count),
//! the image reference, and per-tile custom properties. Elements the
//! engine has no use for (`<grid>`, `<wangsets>`, animations, per-tile
//! collision shapes) are skipped.

use std::path::Path;

use ahash::HashMap;
use kestrel_core::geometry::Rect;

use crate::error::{TsxError, TsxResult};
use crate::xml::{Attribute, XmlEvent, XmlReader};

/// The spritesheet a tileset cuts its tiles from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilesetImage {
    /// Image path as written in the file, relative to the `.tsx`.
    pub source: String,
    pub width: u32,
    pub height: u32,
}

/// A typed custom property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

/// A named custom property on a tile.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub value: PropertyValue,
}

/// A parsed `.tsx` tileset.
#[derive(Debug, Clone, PartialEq)]
pub struct Tileset {
    pub name: String,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tile_count: u32,
    pub columns: u32,
    /// Pixels between neighbouring tiles in the sheet.
    pub spacing: u32,
    /// Pixels between the sheet border and the outer tiles.
    pub margin: u32,
    /// Absent for image-collection tilesets.
    pub image: Option<TilesetImage>,
    tile_properties: HashMap<u32, Vec<Property>>,
}

impl Tileset {
    /// Parse a tileset from `.tsx` source text.
    pub fn from_str(src: &str) -> TsxResult<Self> {
        let mut reader = XmlReader::new(src);

        let (attributes, self_closing) = loop {
            match reader.next_event()? {
                None => return Err(reader.error("expected a <tileset> element")),
                Some(XmlEvent::StartElement {
                    name: "tileset",
                    attributes,
                    self_closing,
                }) => break (attributes, self_closing),
                Some(XmlEvent::StartElement { name, .. }) => {
                    return Err(reader.error(format!("expected <tileset>, found <{name}>")));
                }
                Some(XmlEvent::EndElement { name }) => {
                    return Err(reader.error(format!("unexpected </{name}>")));
                }
                Some(XmlEvent::Text(_)) => {}
            }
        };

        let mut tileset = Tileset {
            name: attr(&attributes, "name").unwrap_or_default().to_owned(),
            tile_width: required_u32(&reader, &attributes, "tilewidth")?,
            tile_height: required_u32(&reader, &attributes, "tileheight")?,
            tile_count: optional_u32(&reader, &attributes, "tilecount")?,
            columns: optional_u32(&reader, &attributes, "columns")?,
            spacing: optional_u32(&reader, &attributes, "spacing")?,
            margin: optional_u32(&reader, &attributes, "margin")?,
            image: None,
            tile_properties: HashMap::default(),
        };

        if !self_closing {
            tileset.parse_body(&mut reader)?;
        }
        Ok(tileset)
    }

    /// Read and parse a `.tsx` file.
    pub fn from_path(path: impl AsRef<Path>) -> TsxResult<Self> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).map_err(|e| {
            TsxError::unpositioned(format!("failed to read {}: {e}", path.display()))
        })?;
        let tileset = Self::from_str(&src)?;
        tracing::debug!(
            path = %path.display(),
            name = %tileset.name,
            tiles = tileset.tile_count,
            "loaded tileset"
        );
        Ok(tileset)
    }

    fn parse_body(&mut self, reader: &mut XmlReader<'_>) -> TsxResult<()> {
        loop {
            match reader.next_event()? {
                None => return Err(reader.error("unterminated <tileset>")),
                Some(XmlEvent::EndElement { name: "tileset" }) => return Ok(()),
                Some(XmlEvent::EndElement { name }) => {
                    return Err(reader.error(format!("unexpected </{name}>")));
                }
                Some(XmlEvent::StartElement {
                    name: "image",
                    attributes,
                    self_closing,
                }) => {
                    let source = attr(&attributes, "source")
                        .ok_or_else(|| reader.error("missing 'source' on <image>"))?
                        .to_owned();
                    self.image = Some(TilesetImage {
                        source,
                        width: optional_u32(reader, &attributes, "width")?,
                        height: optional_u32(reader, &attributes, "height")?,
                    });
                    if !self_closing {
                        reader.skip_element()?;
                    }
                }
                Some(XmlEvent::StartElement {
                    name: "tile",
                    attributes,
                    self_closing,
                }) => {
                    let id = required_u32(reader, &attributes, "id")?;
                    if !self_closing {
                        let properties = parse_tile_body(reader)?;
                        if !properties.is_empty() {
                            self.tile_properties.insert(id, properties);
                        }
                    }
                }
                Some(XmlEvent::StartElement { self_closing, .. }) => {
                    if !self_closing {
                        reader.skip_element()?;
                    }
                }
                Some(XmlEvent::Text(_)) => {}
            }
        }
    }

    /// Pixel rectangle of a tile in the sheet image, or `None` when the
    /// id is out of range or the tileset is not sheet-based.
    pub fn tile_source_rect(&self, tile_id: u32) -> Option<Rect<u32>> {
        if self.columns == 0 || tile_id >= self.tile_count {
            return None;
        }
        let column = tile_id % self.columns;
        let row = tile_id / self.columns;
        Some(Rect::new(
            self.margin + column * (self.tile_width + self.spacing),
            self.margin + row * (self.tile_height + self.spacing),
            self.tile_width,
            self.tile_height,
        ))
    }

    /// Custom properties of a tile; empty for tiles that declare none.
    pub fn tile_properties(&self, tile_id: u32) -> &[Property] {
        self.tile_properties
            .get(&tile_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Look up one property of a tile by name.
    pub fn tile_property(&self, tile_id: u32, name: &str) -> Option<&PropertyValue> {
        self.tile_properties(tile_id)
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

fn attr<'a>(attributes: &'a [Attribute<'_>], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|a| a.name == name)
        .map(|a| a.value.as_ref())
}

fn required_u32(reader: &XmlReader<'_>, attributes: &[Attribute<'_>], name: &str) -> TsxResult<u32> {
    let value = attr(attributes, name).ok_or_else(|| reader.error(format!("missing '{name}'")))?;
    value
        .parse()
        .map_err(|_| reader.error(format!("invalid {name} '{value}'")))
}

fn optional_u32(reader: &XmlReader<'_>, attributes: &[Attribute<'_>], name: &str) -> TsxResult<u32> {
    match attr(attributes, name) {
        None => Ok(0),
        Some(value) => value
            .parse()
            .map_err(|_| reader.error(format!("invalid {name} '{value}'"))),
    }
}

/// Consume a `<tile>` element's children, collecting `<properties>`.
fn parse_tile_body(reader: &mut XmlReader<'_>) -> TsxResult<Vec<Property>> {
    let mut properties = Vec::new();
    loop {
        match reader.next_event()? {
            None => return Err(reader.error("unterminated <tile>")),
            Some(XmlEvent::EndElement { name: "tile" }) => return Ok(properties),
            Some(XmlEvent::EndElement { name }) => {
                return Err(reader.error(format!("unexpected </{name}>")));
            }
            Some(XmlEvent::StartElement {
                name: "properties",
                self_closing,
                ..
            }) => {
                if !self_closing {
                    parse_properties(reader, &mut properties)?;
                }
            }
            Some(XmlEvent::StartElement { self_closing, .. }) => {
                if !self_closing {
                    reader.skip_element()?;
                }
            }
            Some(XmlEvent::Text(_)) => {}
        }
    }
}

fn parse_properties(reader: &mut XmlReader<'_>, out: &mut Vec<Property>) -> TsxResult<()> {
    loop {
        match reader.next_event()? {
            None => return Err(reader.error("unterminated <properties>")),
            Some(XmlEvent::EndElement { name: "properties" }) => return Ok(()),
            Some(XmlEvent::EndElement { name }) => {
                return Err(reader.error(format!("unexpected </{name}>")));
            }
            Some(XmlEvent::StartElement {
                name: "property",
                attributes,
                self_closing,
            }) => {
                let name = attr(&attributes, "name")
                    .ok_or_else(|| reader.error("missing 'name' on <property>"))?
                    .to_owned();
                let raw = attr(&attributes, "value")
                    .ok_or_else(|| reader.error(format!("missing 'value' on property '{name}'")))?;
                let value = match attr(&attributes, "type").unwrap_or("string") {
                    "int" => PropertyValue::Int(raw.parse().map_err(|_| {
                        reader.error(format!("invalid int value '{raw}' for '{name}'"))
                    })?),
                    "float" => PropertyValue::Float(raw.parse().map_err(|_| {
                        reader.error(format!("invalid float value '{raw}' for '{name}'"))
                    })?),
                    "bool" => match raw {
                        "true" => PropertyValue::Bool(true),
                        "false" => PropertyValue::Bool(false),
                        other => {
                            return Err(reader
                                .error(format!("invalid bool value '{other}' for '{name}'")));
                        }
                    },
                    // Tiled's file/color/object types carry no meaning
                    // here; keep their raw text.
                    _ => PropertyValue::String(raw.to_owned()),
                };
                out.push(Property { name, value });
                if !self_closing {
                    reader.skip_element()?;
                }
            }
            Some(XmlEvent::StartElement { self_closing, .. }) => {
                if !self_closing {
                    reader.skip_element()?;
                }
            }
            Some(XmlEvent::Text(_)) => {}
        }
    }
}
