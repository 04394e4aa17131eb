use std::io::Write;

use super::wire::ContentWriter;
use crate::error::{Result, TiledError};
use crate::geometry::{Color, Rect};
use crate::options::ImportOptions;
use crate::runtime::LayerType;
use crate::tmx::{
    split_gid, TmxLayer, TmxLayerKind, TmxMap, TmxObject, TmxObjectShape, TmxTileset,
    TmxTilesetTile,
};

/// Tag strings identifying an object's payload in the stream.
pub(crate) const TAG_NONE: &str = "none";
pub(crate) const TAG_ELLIPSE: &str = "ellipse";
pub(crate) const TAG_IMAGE: &str = "image";
pub(crate) const TAG_POLYGON: &str = "polygon";
pub(crate) const TAG_POLYLINE: &str = "polyline";
pub(crate) const TAG_TILE: &str = "tile";

/// Compile a resolved map into the binary map format.
///
/// Every tileset must already be resolved (see [`crate::resolve_tilesets`]);
/// an external reference left in `map` is an [`TiledError::InvariantViolation`].
///
/// # Example
///
/// ```rust,no_run
/// use tiled_pipeline::{import_tmx_map, write_map, ImportOptions};
///
/// let map = import_tmx_map("maps/world.tmx")?;
/// let file = std::fs::File::create("world.tmb")?;
/// write_map(&map, &ImportOptions::default(), std::io::BufWriter::new(file))?;
/// # Ok::<(), tiled_pipeline::TiledError>(())
/// ```
pub fn write_map<W: Write>(map: &TmxMap, options: &ImportOptions, output: W) -> Result<()> {
    let mut writer = ContentWriter::new(output);
    MapWriter {
        writer: &mut writer,
        options,
    }
    .write(map)?;
    writer.into_inner().flush()?;
    Ok(())
}

/// [`write_map`] into a fresh byte vector.
pub fn encode_map(map: &TmxMap, options: &ImportOptions) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    write_map(map, options, &mut bytes)?;
    Ok(bytes)
}

struct MapWriter<'a, W> {
    writer: &'a mut ContentWriter<W>,
    options: &'a ImportOptions,
}

impl<W: Write> MapWriter<'_, W> {
    fn write(&mut self, map: &TmxMap) -> Result<()> {
        log::info!(
            "Encoding map ({}x{} tiles, {} tilesets, {} layers)",
            map.width,
            map.height,
            map.tilesets.len(),
            map.layers.len()
        );

        let (largest_width, largest_height) = largest_tile_size(map);
        let first_gid = map.tilesets.first().map_or(1, |t| t.first_gid);

        let w = &mut *self.writer;
        w.write_color(map.background_color.unwrap_or(Color::TRANSPARENT))?;
        w.write_string(map.render_order.name())?;
        w.write_u32(first_gid, "map firstgid")?;
        w.write_u32(map.width, "map width")?;
        w.write_u32(map.height, "map height")?;
        w.write_u32(map.tile_width, "map tile width")?;
        w.write_u32(map.tile_height, "map tile height")?;
        w.write_i32(map.orientation.ordinal())?;
        w.write_u32(largest_width, "largest tile width")?;
        w.write_u32(largest_height, "largest tile height")?;
        w.write_properties(&map.properties)?;

        w.write_count(map.tilesets.len(), "tileset count")?;
        for tileset in &map.tilesets {
            self.write_tileset(tileset)?;
        }

        self.writer.write_count(map.layers.len(), "layer count")?;
        for layer in &map.layers {
            self.write_layer(layer)?;
        }

        log::info!("Successfully encoded map");
        Ok(())
    }

    fn write_tileset(&mut self, tileset: &TmxTileset) -> Result<()> {
        if tileset.is_external() {
            return Err(TiledError::InvariantViolation(format!(
                "tileset '{}' still references external file {}",
                tileset.name, tileset.source
            )));
        }

        let texture_name = tileset
            .image
            .as_ref()
            .map(|image| self.options.texture_name(&image.source))
            .unwrap_or_default();
        let bounds = tileset
            .image
            .as_ref()
            .map(|image| rect(0, 0, image.width, image.height))
            .transpose()?
            .unwrap_or_default();

        let w = &mut *self.writer;
        w.write_bool(!tileset.is_image_collection())?;
        w.write_string(&texture_name)?;
        w.write_u32(tileset.first_gid, "tileset firstgid")?;
        w.write_u32(tileset.tile_width, "tileset tile width")?;
        w.write_u32(tileset.tile_height, "tileset tile height")?;
        w.write_u32(tileset.spacing, "tileset spacing")?;
        w.write_u32(tileset.margin, "tileset margin")?;
        w.write_rect(bounds)?;
        w.write_properties(&tileset.properties)?;

        w.write_count(tileset.tiles.len(), "tileset tile count")?;
        for tile in &tileset.tiles {
            self.write_tileset_tile(tileset, tile)?;
        }

        log::debug!(
            "Encoded tileset '{}' (firstgid {}, {} tiles)",
            tileset.name,
            tileset.first_gid,
            tileset.tiles.len()
        );
        Ok(())
    }

    fn write_tileset_tile(&mut self, tileset: &TmxTileset, tile: &TmxTilesetTile) -> Result<()> {
        let w = &mut *self.writer;
        w.write_u32(tile.id, "tile id")?;

        w.write_count(tile.animation.len(), "animation frame count")?;
        for frame in &tile.animation {
            w.write_u32(frame.tile_id, "animation frame tile id")?;
            w.write_f32(frame.duration_ms as f32 / 1000.0)?;
        }

        let region = match (&tile.image, tileset.is_image_collection()) {
            (Some(image), true) => Some(match tile.region {
                Some((x, y, width, height)) => rect(x, y, width, height)?,
                None => rect(0, 0, image.width, image.height)?,
            }),
            _ => None,
        };
        w.write_bool(region.is_some())?;
        if let Some(region) = region {
            w.write_rect(region)?;
        }

        w.write_properties(&tile.properties)
    }

    fn write_layer(&mut self, layer: &TmxLayer) -> Result<()> {
        let layer_type = match layer.kind {
            TmxLayerKind::Tiles(_) => LayerType::Tile,
            TmxLayerKind::Image(_) => LayerType::Image,
            TmxLayerKind::Objects(_) => LayerType::Object,
        };

        let w = &mut *self.writer;
        w.write_string(&layer.name)?;
        w.write_bool(layer.visible)?;
        w.write_f32(layer.opacity)?;
        w.write_f32(layer.offset_x)?;
        w.write_f32(layer.offset_y)?;
        w.write_i32(layer_type.ordinal())?;

        match &layer.kind {
            TmxLayerKind::Tiles(tiles) => {
                w.write_count(tiles.data.len(), "layer tile count")?;
                for &raw in &tiles.data {
                    let (gid, h, v, d) = split_gid(raw);
                    w.write_u32(gid, "gid")?;
                    w.write_bool(h)?;
                    w.write_bool(v)?;
                    w.write_bool(d)?;
                }
                w.write_u32(tiles.width, "layer width")?;
                w.write_u32(tiles.height, "layer height")?;
                w.write_properties(&layer.properties)?;
            }
            TmxLayerKind::Image(image_layer) => {
                let texture_name = image_layer
                    .image
                    .as_ref()
                    .map(|image| self.options.texture_name(&image.source))
                    .unwrap_or_default();
                w.write_string(&texture_name)?;
                w.write_properties(&layer.properties)?;
            }
            TmxLayerKind::Objects(group) => {
                // Object layers carry their properties ahead of the object list.
                w.write_color(group.color.unwrap_or(Color::WHITE))?;
                w.write_properties(&layer.properties)?;
                w.write_count(group.objects.len(), "object count")?;
                for object in &group.objects {
                    write_object(w, object)?;
                }
            }
        }

        log::debug!("Encoded {layer_type:?} layer '{}'", layer.name);
        Ok(())
    }
}

fn write_object<W: Write>(w: &mut ContentWriter<W>, object: &TmxObject) -> Result<()> {
    w.write_u32(object.id, "object id")?;
    w.write_string(&object.name)?;
    w.write_string(&object.object_type)?;
    w.write_i32(pixels(object.x))?;
    w.write_i32(pixels(object.y))?;
    w.write_i32(pixels(object.width))?;
    w.write_i32(pixels(object.height))?;
    w.write_i32(pixels(object.rotation))?;
    w.write_bool(object.visible)?;

    // A gid makes this a tile object whatever shape element came with it.
    // Gid 0 names no tile, so such an object keeps its plain shape.
    let tile = object
        .gid
        .map(split_gid)
        .filter(|&(gid, _, _, _)| gid != 0);
    if let Some((gid, h, v, d)) = tile {
        w.write_string(TAG_TILE)?;
        w.write_u32(gid, "object gid")?;
        w.write_bool(h)?;
        w.write_bool(v)?;
        w.write_bool(d)?;
    } else {
        match &object.shape {
            TmxObjectShape::Rectangle => w.write_string(TAG_NONE)?,
            TmxObjectShape::Ellipse => w.write_string(TAG_ELLIPSE)?,
            TmxObjectShape::Image(_) => w.write_string(TAG_IMAGE)?,
            TmxObjectShape::Polygon(points) | TmxObjectShape::Polyline(points) => {
                let tag = if matches!(object.shape, TmxObjectShape::Polygon(_)) {
                    TAG_POLYGON
                } else {
                    TAG_POLYLINE
                };
                w.write_string(tag)?;
                w.write_count(points.len(), "point count")?;
                for &point in points {
                    w.write_vector2(point)?;
                }
            }
        }
    }

    w.write_properties(&object.properties)
}

/// Largest tile size across the map grid, tilesets and image-collection tiles.
fn largest_tile_size(map: &TmxMap) -> (u32, u32) {
    let mut size = (map.tile_width, map.tile_height);
    for tileset in &map.tilesets {
        size.0 = size.0.max(tileset.tile_width);
        size.1 = size.1.max(tileset.tile_height);

        if tileset.is_image_collection() {
            for tile in &tileset.tiles {
                let tile_size = match (tile.region, &tile.image) {
                    (Some((_, _, w, h)), _) => (w, h),
                    (None, Some(image)) => (image.width, image.height),
                    (None, None) => continue,
                };
                size.0 = size.0.max(tile_size.0);
                size.1 = size.1.max(tile_size.1);
            }
        }
    }
    size
}

fn rect(x: u32, y: u32, width: u32, height: u32) -> Result<Rect> {
    let int = |v: u32| {
        i32::try_from(v).map_err(|_| {
            TiledError::InvariantViolation(format!("rectangle value {v} does not fit in an int32"))
        })
    };
    Ok(Rect::new(int(x)?, int(y)?, int(width)?, int(height)?))
}

/// Round a Tiled pixel value to the stream's integer representation.
fn pixels(value: f32) -> i32 {
    value.round() as i32
}
