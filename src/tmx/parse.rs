use std::io::Read;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::read::{GzDecoder, ZlibDecoder};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{
    Orientation, RenderOrder, TmxFrame, TmxImage, TmxImageLayer, TmxLayer, TmxLayerKind, TmxMap,
    TmxObject, TmxObjectGroup, TmxObjectShape, TmxTileLayer, TmxTileset, TmxTilesetTile,
};
use crate::error::{Result, TiledError};
use crate::geometry::{Color, Vector2};
use crate::properties::Properties;

type XmlReader<'a> = Reader<&'a [u8]>;

/// Parse a `.tmx` document into the XML map model.
///
/// External tilesets are left as references (`source` set, everything else
/// empty); run [`super::resolve_tilesets`] to splice them in.
///
/// # Example
///
/// ```rust
/// let map = tiled_pipeline::parse_tmx_map(r#"
///     <map orientation="orthogonal" width="1" height="1" tilewidth="8" tileheight="8">
///       <layer name="ground" width="1" height="1"><data encoding="csv">0</data></layer>
///     </map>"#).unwrap();
/// assert_eq!(map.layers.len(), 1);
/// ```
pub fn parse_tmx_map(text: &str) -> Result<TmxMap> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let (start, empty) = root_element(&mut reader, b"map")?;
    parse_map(&mut reader, &start, empty)
}

/// Parse a standalone `.tsx` tileset document.
pub fn parse_tsx_tileset(text: &str) -> Result<TmxTileset> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let (start, empty) = root_element(&mut reader, b"tileset")?;
    parse_tileset(&mut reader, &start, empty)
}

// ============================================================================
// Event Helpers
// ============================================================================

enum Child<'a> {
    Element { start: BytesStart<'a>, empty: bool },
    Text(String),
}

/// Feed every direct child of the current element to `visit`, stopping at its end tag.
///
/// `visit` must consume any non-empty element it receives, either by parsing it
/// or by calling [`skip`].
fn for_each_child<'a, F>(reader: &mut XmlReader<'a>, mut visit: F) -> Result<()>
where
    F: FnMut(&mut XmlReader<'a>, Child<'a>) -> Result<()>,
{
    loop {
        match reader.read_event()? {
            Event::Start(start) => visit(reader, Child::Element { start, empty: false })?,
            Event::Empty(start) => visit(reader, Child::Element { start, empty: true })?,
            Event::Text(text) => visit(reader, Child::Text(text.unescape()?.into_owned()))?,
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                visit(reader, Child::Text(text))?
            }
            Event::End(_) => return Ok(()),
            Event::Eof => return Err(TiledError::Xml("Unexpected end of document".to_string())),
            _ => {}
        }
    }
}

fn skip(reader: &mut XmlReader<'_>, start: &BytesStart<'_>, empty: bool) -> Result<()> {
    if !empty {
        reader.read_to_end(start.name())?;
    }
    Ok(())
}

fn skip_unknown(reader: &mut XmlReader<'_>, parent: &str, start: &BytesStart<'_>, empty: bool) -> Result<()> {
    log::debug!(
        "Skipping <{}> inside <{parent}>",
        String::from_utf8_lossy(start.name().as_ref())
    );
    skip(reader, start, empty)
}

fn root_element<'a>(reader: &mut XmlReader<'a>, expected: &[u8]) -> Result<(BytesStart<'a>, bool)> {
    loop {
        let (start, empty) = match reader.read_event()? {
            Event::Start(start) => (start, false),
            Event::Empty(start) => (start, true),
            Event::Eof => return Err(TiledError::Xml("Document has no root element".to_string())),
            _ => continue,
        };

        if start.name().as_ref() != expected {
            return Err(TiledError::Xml(format!(
                "Expected <{}> root element, found <{}>",
                String::from_utf8_lossy(expected),
                String::from_utf8_lossy(start.name().as_ref())
            )));
        }
        return Ok((start, empty));
    }
}

/// Attributes of one element, unescaped up front.
struct Attrs(Vec<(String, String)>);

impl Attrs {
    fn of(start: &BytesStart<'_>) -> Result<Self> {
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            attrs.push((key, value));
        }
        Ok(Attrs(attrs))
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn string(&self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_string()
    }

    fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value.trim().parse().map(Some).map_err(|_| {
                TiledError::Xml(format!("Invalid value '{value}' for attribute '{key}'"))
            }),
        }
    }

    fn parse_or<T: FromStr>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.parse(key)?.unwrap_or(default))
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key).map(str::trim) {
            None => Ok(default),
            Some("1") | Some("true") => Ok(true),
            Some("0") | Some("false") => Ok(false),
            Some(other) => Err(TiledError::Xml(format!(
                "Invalid value '{other}' for attribute '{key}'"
            ))),
        }
    }

    fn color(&self, key: &str) -> Result<Option<Color>> {
        self.get(key)
            .filter(|v| !v.trim().is_empty())
            .map(Color::from_hex)
            .transpose()
    }
}

// ============================================================================
// Map and Tilesets
// ============================================================================

fn parse_map<'a>(reader: &mut XmlReader<'a>, start: &BytesStart<'a>, empty: bool) -> Result<TmxMap> {
    let attrs = Attrs::of(start)?;

    if attrs.flag("infinite", false)? {
        return Err(TiledError::UnsupportedFeature("infinite maps".to_string()));
    }

    let mut map = TmxMap {
        version: attrs.string("version"),
        orientation: match attrs.get("orientation") {
            Some(value) => Orientation::from_tmx(value)?,
            None => Orientation::default(),
        },
        render_order: match attrs.get("renderorder") {
            Some(value) => RenderOrder::from_tmx(value)?,
            None => RenderOrder::default(),
        },
        width: attrs.parse_or("width", 0)?,
        height: attrs.parse_or("height", 0)?,
        tile_width: attrs.parse_or("tilewidth", 0)?,
        tile_height: attrs.parse_or("tileheight", 0)?,
        background_color: attrs.color("backgroundcolor")?,
        ..TmxMap::default()
    };

    if empty {
        return Ok(map);
    }

    for_each_child(reader, |reader, child| {
        let Child::Element { start, empty } = child else {
            return Ok(());
        };
        match start.name().as_ref() {
            b"properties" => map.properties = parse_properties(reader, &start, empty)?,
            b"tileset" => map.tilesets.push(parse_tileset(reader, &start, empty)?),
            b"layer" => map.layers.push(parse_tile_layer(reader, &start, empty)?),
            b"imagelayer" => map.layers.push(parse_image_layer(reader, &start, empty)?),
            b"objectgroup" => map.layers.push(parse_object_group(reader, &start, empty)?),
            b"group" => {
                return Err(TiledError::UnsupportedFeature("group layers".to_string()));
            }
            other => {
                log::warn!("Ignoring unknown map element <{}>", String::from_utf8_lossy(other));
                skip(reader, &start, empty)?;
            }
        }
        Ok(())
    })?;

    Ok(map)
}

fn parse_tileset<'a>(reader: &mut XmlReader<'a>, start: &BytesStart<'a>, empty: bool) -> Result<TmxTileset> {
    let attrs = Attrs::of(start)?;
    let mut tileset = TmxTileset {
        first_gid: attrs.parse_or("firstgid", 0)?,
        source: attrs.string("source"),
        name: attrs.string("name"),
        tile_width: attrs.parse_or("tilewidth", 0)?,
        tile_height: attrs.parse_or("tileheight", 0)?,
        spacing: attrs.parse_or("spacing", 0)?,
        margin: attrs.parse_or("margin", 0)?,
        tile_count: attrs.parse_or("tilecount", 0)?,
        columns: attrs.parse_or("columns", 0)?,
        ..TmxTileset::default()
    };

    if empty {
        return Ok(tileset);
    }

    for_each_child(reader, |reader, child| {
        let Child::Element { start, empty } = child else {
            return Ok(());
        };
        match start.name().as_ref() {
            b"image" => tileset.image = Some(parse_image(reader, &start, empty)?),
            b"tile" => tileset.tiles.push(parse_tileset_tile(reader, &start, empty)?),
            b"properties" => tileset.properties = parse_properties(reader, &start, empty)?,
            _ => skip_unknown(reader, "tileset", &start, empty)?,
        }
        Ok(())
    })?;

    Ok(tileset)
}

fn parse_tileset_tile<'a>(
    reader: &mut XmlReader<'a>,
    start: &BytesStart<'a>,
    empty: bool,
) -> Result<TmxTilesetTile> {
    let attrs = Attrs::of(start)?;
    let mut tile = TmxTilesetTile {
        id: attrs.parse_or("id", 0)?,
        ..TmxTilesetTile::default()
    };

    if let (Some(width), Some(height)) = (attrs.parse("width")?, attrs.parse("height")?) {
        tile.region = Some((attrs.parse_or("x", 0)?, attrs.parse_or("y", 0)?, width, height));
    }

    if empty {
        return Ok(tile);
    }

    for_each_child(reader, |reader, child| {
        let Child::Element { start, empty } = child else {
            return Ok(());
        };
        match start.name().as_ref() {
            b"image" => tile.image = Some(parse_image(reader, &start, empty)?),
            b"animation" => tile.animation = parse_animation(reader, empty)?,
            b"properties" => tile.properties = parse_properties(reader, &start, empty)?,
            _ => skip_unknown(reader, "tile", &start, empty)?,
        }
        Ok(())
    })?;

    Ok(tile)
}

fn parse_animation(reader: &mut XmlReader<'_>, empty: bool) -> Result<Vec<TmxFrame>> {
    let mut frames = Vec::new();
    if empty {
        return Ok(frames);
    }

    for_each_child(reader, |reader, child| {
        let Child::Element { start, empty } = child else {
            return Ok(());
        };
        if start.name().as_ref() == b"frame" {
            let attrs = Attrs::of(&start)?;
            frames.push(TmxFrame {
                tile_id: attrs.parse_or("tileid", 0)?,
                duration_ms: attrs.parse_or("duration", 0)?,
            });
        }
        skip(reader, &start, empty)
    })?;

    Ok(frames)
}

fn parse_image<'a>(reader: &mut XmlReader<'a>, start: &BytesStart<'a>, empty: bool) -> Result<TmxImage> {
    let attrs = Attrs::of(start)?;
    let image = TmxImage {
        source: attrs.string("source"),
        width: attrs.parse_or("width", 0)?,
        height: attrs.parse_or("height", 0)?,
    };
    if image.source.is_empty() {
        return Err(TiledError::UnsupportedFeature(
            "embedded image data (images without a source path)".to_string(),
        ));
    }
    skip(reader, start, empty)?;
    Ok(image)
}

fn parse_properties<'a>(
    reader: &mut XmlReader<'a>,
    _start: &BytesStart<'a>,
    empty: bool,
) -> Result<Properties> {
    let mut properties = Properties::new();
    if empty {
        return Ok(properties);
    }

    for_each_child(reader, |reader, child| {
        let Child::Element { start, empty } = child else {
            return Ok(());
        };
        if start.name().as_ref() != b"property" {
            return skip_unknown(reader, "properties", &start, empty);
        }

        let attrs = Attrs::of(&start)?;
        let mut value = attrs.get("value").map(str::to_string);

        // Multi-line string properties keep their value in the element body.
        if !empty {
            let mut body = String::new();
            for_each_child(reader, |reader, child| {
                match child {
                    Child::Text(text) => body.push_str(&text),
                    Child::Element { start, empty } => skip(reader, &start, empty)?,
                }
                Ok(())
            })?;
            value.get_or_insert(body);
        }

        properties.insert(attrs.string("name"), value.unwrap_or_default());
        Ok(())
    })?;

    Ok(properties)
}

// ============================================================================
// Layers
// ============================================================================

/// Attributes shared by every layer element.
struct LayerHeader {
    name: String,
    visible: bool,
    opacity: f32,
    offset_x: f32,
    offset_y: f32,
}

impl LayerHeader {
    fn from_attrs(attrs: &Attrs) -> Result<Self> {
        Ok(LayerHeader {
            name: attrs.string("name"),
            visible: attrs.flag("visible", true)?,
            opacity: attrs.parse_or("opacity", 1.0)?,
            offset_x: attrs.parse_or("offsetx", 0.0)?,
            offset_y: attrs.parse_or("offsety", 0.0)?,
        })
    }

    fn into_layer(self, properties: Properties, kind: TmxLayerKind) -> TmxLayer {
        TmxLayer {
            name: self.name,
            visible: self.visible,
            opacity: self.opacity,
            offset_x: self.offset_x,
            offset_y: self.offset_y,
            properties,
            kind,
        }
    }
}

fn parse_tile_layer<'a>(reader: &mut XmlReader<'a>, start: &BytesStart<'a>, empty: bool) -> Result<TmxLayer> {
    let attrs = Attrs::of(start)?;
    let header = LayerHeader::from_attrs(&attrs)?;
    let width: u32 = attrs.parse_or("width", 0)?;
    let height: u32 = attrs.parse_or("height", 0)?;

    let mut properties = Properties::new();
    let mut data = None;

    if !empty {
        for_each_child(reader, |reader, child| {
            let Child::Element { start, empty } = child else {
                return Ok(());
            };
            match start.name().as_ref() {
                b"properties" => properties = parse_properties(reader, &start, empty)?,
                b"data" => data = Some(parse_data(reader, &start, empty)?),
                _ => skip_unknown(reader, "layer", &start, empty)?,
            }
            Ok(())
        })?;
    }

    let data = data.ok_or_else(|| {
        TiledError::Xml(format!("Tile layer '{}' has no <data> element", header.name))
    })?;

    let expected = width as usize * height as usize;
    if data.len() != expected {
        return Err(TiledError::Xml(format!(
            "Tile layer '{}' has {} tiles, expected {width}x{height} = {expected}",
            header.name,
            data.len()
        )));
    }

    Ok(header.into_layer(
        properties,
        TmxLayerKind::Tiles(TmxTileLayer {
            width,
            height,
            data,
        }),
    ))
}

/// Decode the contents of a `<data>` element into raw gids.
fn parse_data<'a>(reader: &mut XmlReader<'a>, start: &BytesStart<'a>, empty: bool) -> Result<Vec<u32>> {
    let attrs = Attrs::of(start)?;
    let mut text = String::new();
    let mut xml_tiles = Vec::new();

    if !empty {
        for_each_child(reader, |reader, child| {
            match child {
                Child::Text(chunk) => text.push_str(&chunk),
                Child::Element { start, empty } => match start.name().as_ref() {
                    b"tile" => {
                        xml_tiles.push(Attrs::of(&start)?.parse_or("gid", 0u32)?);
                        skip(reader, &start, empty)?;
                    }
                    b"chunk" => {
                        return Err(TiledError::UnsupportedFeature(
                            "infinite maps (chunked layer data)".to_string(),
                        ));
                    }
                    _ => skip_unknown(reader, "data", &start, empty)?,
                },
            }
            Ok(())
        })?;
    }

    match attrs.get("encoding").unwrap_or_default() {
        "" => Ok(xml_tiles),
        "csv" => parse_csv(&text),
        "base64" => decode_base64(&text, attrs.get("compression").unwrap_or_default()),
        other => Err(TiledError::UnsupportedFeature(format!(
            "tile data encoding '{other}'"
        ))),
    }
}

fn parse_csv(text: &str) -> Result<Vec<u32>> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>()
                .map_err(|_| TiledError::Xml(format!("Invalid gid '{s}' in CSV tile data")))
        })
        .collect()
}

fn decode_base64(text: &str, compression: &str) -> Result<Vec<u32>> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| TiledError::Xml(format!("Invalid base64 tile data: {e}")))?;

    let bytes = match compression {
        "" => bytes,
        "zlib" => inflate(ZlibDecoder::new(bytes.as_slice()))?,
        "gzip" => inflate(GzDecoder::new(bytes.as_slice()))?,
        other => {
            return Err(TiledError::UnsupportedFeature(format!(
                "tile data compression '{other}'"
            )));
        }
    };

    if bytes.len() % 4 != 0 {
        return Err(TiledError::Xml(format!(
            "Tile data is {} bytes, not a multiple of 4",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn inflate(mut decoder: impl Read) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| TiledError::Xml(format!("Failed to decompress tile data: {e}")))?;
    Ok(out)
}

fn parse_image_layer<'a>(reader: &mut XmlReader<'a>, start: &BytesStart<'a>, empty: bool) -> Result<TmxLayer> {
    let attrs = Attrs::of(start)?;
    let header = LayerHeader::from_attrs(&attrs)?;
    let mut properties = Properties::new();
    let mut image = None;

    if !empty {
        for_each_child(reader, |reader, child| {
            let Child::Element { start, empty } = child else {
                return Ok(());
            };
            match start.name().as_ref() {
                b"image" => image = Some(parse_image(reader, &start, empty)?),
                b"properties" => properties = parse_properties(reader, &start, empty)?,
                _ => skip_unknown(reader, "imagelayer", &start, empty)?,
            }
            Ok(())
        })?;
    }

    Ok(header.into_layer(properties, TmxLayerKind::Image(TmxImageLayer { image })))
}

// ============================================================================
// Objects
// ============================================================================

fn parse_object_group<'a>(reader: &mut XmlReader<'a>, start: &BytesStart<'a>, empty: bool) -> Result<TmxLayer> {
    let attrs = Attrs::of(start)?;
    let header = LayerHeader::from_attrs(&attrs)?;
    let mut properties = Properties::new();
    let mut group = TmxObjectGroup {
        color: attrs.color("color")?,
        objects: Vec::new(),
    };

    if !empty {
        for_each_child(reader, |reader, child| {
            let Child::Element { start, empty } = child else {
                return Ok(());
            };
            match start.name().as_ref() {
                b"object" => group.objects.push(parse_object(reader, &start, empty)?),
                b"properties" => properties = parse_properties(reader, &start, empty)?,
                _ => skip_unknown(reader, "objectgroup", &start, empty)?,
            }
            Ok(())
        })?;
    }

    Ok(header.into_layer(properties, TmxLayerKind::Objects(group)))
}

fn parse_object<'a>(reader: &mut XmlReader<'a>, start: &BytesStart<'a>, empty: bool) -> Result<TmxObject> {
    let attrs = Attrs::of(start)?;

    if attrs.get("template").is_some() {
        return Err(TiledError::UnsupportedFeature("object templates".to_string()));
    }

    let mut object = TmxObject {
        id: attrs.parse_or("id", 0)?,
        name: attrs.string("name"),
        // Tiled 1.9 renamed `type` to `class`.
        object_type: attrs
            .get("type")
            .or_else(|| attrs.get("class"))
            .unwrap_or_default()
            .to_string(),
        x: attrs.parse_or("x", 0.0)?,
        y: attrs.parse_or("y", 0.0)?,
        width: attrs.parse_or("width", 0.0)?,
        height: attrs.parse_or("height", 0.0)?,
        rotation: attrs.parse_or("rotation", 0.0)?,
        visible: attrs.flag("visible", true)?,
        gid: attrs.parse("gid")?,
        ..TmxObject::default()
    };

    if empty {
        return Ok(object);
    }

    for_each_child(reader, |reader, child| {
        let Child::Element { start, empty } = child else {
            return Ok(());
        };
        match start.name().as_ref() {
            b"properties" => object.properties = parse_properties(reader, &start, empty)?,
            b"ellipse" => {
                object.shape = TmxObjectShape::Ellipse;
                skip(reader, &start, empty)?;
            }
            b"polygon" => {
                object.shape = TmxObjectShape::Polygon(parse_points(&Attrs::of(&start)?)?);
                skip(reader, &start, empty)?;
            }
            b"polyline" => {
                object.shape = TmxObjectShape::Polyline(parse_points(&Attrs::of(&start)?)?);
                skip(reader, &start, empty)?;
            }
            b"image" => object.shape = TmxObjectShape::Image(parse_image(reader, &start, empty)?),
            _ => skip_unknown(reader, "object", &start, empty)?,
        }
        Ok(())
    })?;

    Ok(object)
}

/// Parse a `points="x,y x,y ..."` attribute.
fn parse_points(attrs: &Attrs) -> Result<Vec<Vector2>> {
    let text = attrs.get("points").unwrap_or_default();
    let coord = |s: &str| {
        s.trim()
            .parse::<f32>()
            .map_err(|_| TiledError::Xml(format!("Invalid point list '{text}'")))
    };

    text.split_whitespace()
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .ok_or_else(|| TiledError::Xml(format!("Invalid point list '{text}'")))?;
            Ok(Vector2::new(coord(x)?, coord(y)?))
        })
        .collect()
}
