use std::io::Read;

use super::wire::ContentReader;
use super::writer::{TAG_ELLIPSE, TAG_IMAGE, TAG_POLYGON, TAG_POLYLINE, TAG_TILE};
use crate::error::{Result, TiledError};
use crate::geometry::Vector2;
use crate::loader::{ContentLoader, Texture};
use crate::options::DecodeOptions;
use crate::runtime::{
    AnimationFrame, LayerType, Map, Object, ObjectShape, Tile, Tileset, TilesetKind, TilesetTile,
};
use crate::tmx::{Orientation, RenderOrder};

/// Decode a compiled map from `input`.
///
/// Textures are requested from `loader` by asset name as they are met. On any
/// error the partially built map is dropped and only the error is returned.
///
/// # Arguments
///
/// * `input` - The binary map stream
/// * `loader` - Resolves texture asset names to engine handles
/// * `options` - Where the map lives relative to the content root
///
/// # Example
///
/// ```rust,no_run
/// use tiled_pipeline::{read_map, AssetCache, DecodeOptions};
///
/// let file = std::fs::File::open("content/maps/world.tmb")?;
/// let mut textures = AssetCache::new();
/// let map = read_map(std::io::BufReader::new(file), &mut textures, &DecodeOptions::new("maps"))?;
/// println!("{} layers, {} textures", map.layers.len(), textures.len());
/// # Ok::<(), tiled_pipeline::TiledError>(())
/// ```
pub fn read_map<R: Read>(
    input: R,
    loader: &mut dyn ContentLoader,
    options: &DecodeOptions,
) -> Result<Map> {
    MapReader {
        reader: ContentReader::new(input),
        loader,
        options,
    }
    .read()
}

/// [`read_map`] over an in-memory buffer.
pub fn decode_map(bytes: &[u8], loader: &mut dyn ContentLoader, options: &DecodeOptions) -> Result<Map> {
    read_map(bytes, loader, options)
}

struct MapReader<'a, R> {
    reader: ContentReader<R>,
    loader: &'a mut dyn ContentLoader,
    options: &'a DecodeOptions,
}

impl<R: Read> MapReader<'_, R> {
    fn read(mut self) -> Result<Map> {
        log::info!("Decoding map from stream");
        let r = &mut self.reader;

        let background_color = r.read_color()?;
        let render_order_name = r.read_string()?;
        let render_order = RenderOrder::from_name(&render_order_name).ok_or_else(|| {
            TiledError::MalformedStream(format!("unknown render order '{render_order_name}'"))
        })?;

        let first_gid = r.read_u32("map firstgid")?;
        let width = r.read_u32("map width")?;
        let height = r.read_u32("map height")?;
        let tile_width = r.read_u32("map tile width")?;
        let tile_height = r.read_u32("map tile height")?;
        let orientation_ordinal = r.read_i32()?;
        let orientation = Orientation::from_ordinal(orientation_ordinal).ok_or_else(|| {
            TiledError::MalformedStream(format!("unknown orientation ordinal {orientation_ordinal}"))
        })?;

        let mut map = Map::new(first_gid, width, height, tile_width, tile_height, orientation);
        map.background_color = background_color;
        map.render_order = render_order;

        let largest_width = r.read_u32("largest tile width")?;
        let largest_height = r.read_u32("largest tile height")?;
        map.set_largest_tile_size(largest_width, largest_height);
        r.read_properties(&mut map.properties)?;

        let (tileset_count, _) = r.read_count("tileset count")?;
        for _ in 0..tileset_count {
            self.read_tileset(&mut map)?;
        }

        let (layer_count, _) = self.reader.read_count("layer count")?;
        for _ in 0..layer_count {
            self.read_layer(&mut map)?;
        }

        log::info!(
            "Successfully decoded map ({}x{} tiles, {} tilesets, {} layers, {} animated tiles)",
            map.width,
            map.height,
            map.tilesets.len(),
            map.layers.len(),
            map.animated_tiles().len()
        );
        Ok(map)
    }

    fn load_texture(&mut self, texture_name: &str) -> Result<Option<Texture>> {
        if texture_name.is_empty() {
            return Ok(None);
        }
        let asset_name = self.options.relative_asset_path(texture_name);
        let handle = self.loader.load_texture(&asset_name)?;
        Ok(Some(Texture { asset_name, handle }))
    }

    fn read_tileset(&mut self, map: &mut Map) -> Result<()> {
        let is_standard = self.reader.read_bool()?;
        // Image collections have no texture of their own.
        let texture_name = self.reader.read_string()?;
        let texture = self.load_texture(&texture_name)?;

        let r = &mut self.reader;
        let kind = if is_standard {
            TilesetKind::Standard
        } else {
            TilesetKind::ImageCollection
        };
        let first_gid = r.read_u32("tileset firstgid")?;
        let mut tileset = Tileset::new(
            first_gid,
            r.read_u32("tileset tile width")?,
            r.read_u32("tileset tile height")?,
            kind,
        );
        tileset.texture = texture;
        tileset.spacing = r.read_u32("tileset spacing")?;
        tileset.margin = r.read_u32("tileset margin")?;
        tileset.bounds = r.read_rect()?;
        r.read_properties(&mut tileset.properties)?;

        let (tile_count, _) = r.read_count("tileset tile count")?;
        for _ in 0..tile_count {
            let mut tile = TilesetTile::new(r.read_u32("tile id")?);

            let (frame_count, capacity) = r.read_count("animation frame count")?;
            tile.animation_frames.reserve(capacity);
            for _ in 0..frame_count {
                tile.animation_frames.push(AnimationFrame {
                    tile_id: r.read_u32("animation frame tile id")?,
                    duration: r.read_f32()?,
                });
            }

            let is_from_image_collection = r.read_bool()?;
            if is_from_image_collection {
                let region = r.read_rect()?;
                let gid = first_gid.checked_add(tile.id).ok_or_else(|| {
                    TiledError::MalformedStream(format!("tile id {} overflows the gid range", tile.id))
                })?;
                tileset.set_tile_texture_region(gid, region);
            }

            r.read_properties(&mut tile.properties)?;

            // The region is already captured; a bare image-collection tile carries nothing else.
            let region_only = is_from_image_collection
                && tile.properties.is_empty()
                && tile.animation_frames.is_empty();
            if !region_only {
                tileset.add_tile(tile);
            }
        }

        log::debug!(
            "Added {:?} tileset at firstgid {} ({} tiles with data)",
            tileset.kind,
            tileset.first_gid,
            tileset.tiles.len()
        );
        map.create_tileset(tileset)?;
        Ok(())
    }

    fn read_layer(&mut self, map: &mut Map) -> Result<()> {
        let r = &mut self.reader;
        let name = r.read_string()?;
        let visible = r.read_bool()?;
        let opacity = r.read_f32()?;
        let offset = r.read_vector2()?;
        let layer_type_ordinal = r.read_i32()?;
        let layer_type = LayerType::from_ordinal(layer_type_ordinal).ok_or_else(|| {
            TiledError::MalformedStream(format!(
                "layer type {layer_type_ordinal} of layer '{name}' is not supported"
            ))
        })?;

        let layer = match layer_type {
            LayerType::Tile => {
                let (tile_count, capacity) = r.read_count("layer tile count")?;
                let mut tiles = Vec::with_capacity(capacity);
                for _ in 0..tile_count {
                    let gid = r.read_u32("gid")?;
                    let flip_h = r.read_bool()?;
                    let flip_v = r.read_bool()?;
                    let flip_d = r.read_bool()?;
                    tiles.push(map.create_tile(gid, flip_h, flip_v, flip_d)?);
                }
                let width = r.read_u32("layer width")?;
                let height = r.read_u32("layer height")?;

                let layer = map.create_tile_layer(name, width, height, tiles)?;
                r.read_properties(&mut layer.properties)?;
                layer
            }
            LayerType::Image => {
                let texture_name = r.read_string()?;
                let texture = self.load_texture(&texture_name)?;
                let layer = map.create_image_layer(name, texture);
                self.reader.read_properties(&mut layer.properties)?;
                layer
            }
            LayerType::Object => {
                let color = r.read_color()?;
                let mut properties = Default::default();
                r.read_properties(&mut properties)?;

                let (object_count, capacity) = r.read_count("object count")?;
                let mut objects = Vec::with_capacity(capacity);
                for _ in 0..object_count {
                    objects.push(read_object(r, map)?);
                }

                let layer = map.create_object_layer(name, color, objects);
                layer.properties = properties;
                layer
            }
        };

        layer.visible = visible;
        layer.opacity = opacity;
        layer.offset = offset;

        log::debug!("Added {layer_type:?} layer '{}'", layer.name);
        Ok(())
    }
}

fn read_object<R: Read>(r: &mut ContentReader<R>, map: &Map) -> Result<Object> {
    let id = r.read_i32()?;
    let name = r.read_string()?;
    let object_type = r.read_string()?;
    let x = r.read_i32()?;
    let y = r.read_i32()?;
    let width = r.read_i32()?;
    let height = r.read_i32()?;
    let rotation = r.read_i32()?;
    let visible = r.read_bool()?;

    let tag = r.read_string()?;
    let shape = match tag.as_str() {
        TAG_ELLIPSE => ObjectShape::Ellipse,
        TAG_IMAGE => {
            return Err(TiledError::UnsupportedFeature(format!(
                "image object '{name}' (image objects are not implemented)"
            )));
        }
        TAG_POLYGON => ObjectShape::Polygon(read_points(r)?),
        TAG_POLYLINE => ObjectShape::Polyline(read_points(r)?),
        TAG_TILE => {
            let gid = r.read_u32("object gid")?;
            let flip_h = r.read_bool()?;
            let flip_v = r.read_bool()?;
            let flip_d = r.read_bool()?;
            let tile: Tile = map.create_tile(gid, flip_h, flip_v, flip_d)?.ok_or_else(|| {
                TiledError::MalformedStream(format!("tile object '{name}' has gid 0"))
            })?;
            ObjectShape::Tile(tile)
        }
        _ => ObjectShape::None,
    };

    let mut object = Object {
        id,
        name,
        object_type,
        x,
        y,
        width,
        height,
        rotation,
        visible,
        properties: Default::default(),
        shape,
    };
    r.read_properties(&mut object.properties)?;
    Ok(object)
}

fn read_points<R: Read>(r: &mut ContentReader<R>) -> Result<Vec<Vector2>> {
    let (count, capacity) = r.read_count("point count")?;
    let mut points = Vec::with_capacity(capacity);
    for _ in 0..count {
        points.push(r.read_vector2()?);
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{encode_map, ContentWriter};
    use crate::geometry::{Color, Rect};
    use crate::loader::AssetCache;
    use crate::options::ImportOptions;
    use crate::runtime::AnimatedTileRef;
    use crate::tmx::parse_tmx_map;

    const TWO_TILESETS: &str = r#"
        <tileset firstgid="1" name="ground" tilewidth="16" tileheight="16" tilecount="4" columns="2">
            <image source="ground.png" width="32" height="32"/>
        </tileset>
        <tileset firstgid="5" name="water" tilewidth="16" tileheight="16" tilecount="4" columns="2">
            <image source="water.png" width="32" height="32"/>
            <tile id="0">
                <animation>
                    <frame tileid="0" duration="100"/>
                    <frame tileid="1" duration="100"/>
                </animation>
            </tile>
        </tileset>"#;

    fn compile(body: &str) -> Vec<u8> {
        let text = format!(
            r#"<map orientation="orthogonal" width="2" height="2" tilewidth="16" tileheight="16">{body}</map>"#
        );
        let map = parse_tmx_map(&text).unwrap();
        encode_map(&map, &ImportOptions::default()).unwrap()
    }

    fn decode(bytes: &[u8]) -> Result<Map> {
        decode_map(bytes, &mut AssetCache::new(), &DecodeOptions::new("maps"))
    }

    #[test]
    fn cells_resolve_to_their_owning_tileset() {
        let bytes = compile(&format!(
            r#"{TWO_TILESETS}
            <layer name="ground" width="2" height="2"><data encoding="csv">5,0,0,7</data></layer>"#
        ));
        let mut textures = AssetCache::new();
        let map = decode_map(&bytes, &mut textures, &DecodeOptions::new("maps")).unwrap();

        let (_, layer) = map.tile_layers().next().unwrap();
        assert_eq!(layer.get_tile(0, 0).map(|t| (t.gid, t.tileset)), Some((5, 1)));
        assert!(layer.get_tile(1, 0).is_none());
        assert!(layer.get_tile(0, 1).is_none());
        assert_eq!(layer.get_tile(1, 1).map(|t| (t.gid, t.tileset)), Some((7, 1)));

        // gid 5 is the animated water tile
        assert_eq!(map.animated_tiles(), &[AnimatedTileRef::Cell { layer: 0, index: 0 }]);
        assert_eq!(textures.len(), 2);
        assert!(textures.handle("maps/water.png").is_some());
        assert_eq!(
            map.tilesets[0].texture.as_ref().map(|t| t.asset_name.as_str()),
            Some("maps/ground.png")
        );
    }

    #[test]
    fn tile_objects_share_the_cell_lookup() {
        let bytes = compile(&format!(
            r##"{TWO_TILESETS}
            <objectgroup name="things" color="#ff0000">
                <properties><property name="spawn" value="true"/></properties>
                <object id="3" name="boat" gid="6" x="10.4" y="20.6" width="16" height="16"/>
                <object id="4" name="zone" x="0" y="0" width="8" height="8"/>
            </objectgroup>"##
        ));
        let map = decode(&bytes).unwrap();

        let (layer, objects) = map.object_layers().next().unwrap();
        assert_eq!(layer.properties.get("spawn"), Some("true"));
        assert_eq!(objects.color, Color::rgba(255, 0, 0, 255));

        let boat = objects.object_with_name("boat").unwrap();
        assert_eq!((boat.id, boat.x, boat.y), (3, 10, 21));
        let tile = boat.tile().unwrap();
        assert_eq!(Some(tile.tileset), map.tileset_index_for_gid(6));
        assert_eq!(objects.object_with_name("zone").unwrap().shape, ObjectShape::None);
    }

    #[test]
    fn bare_image_collection_tiles_keep_only_their_region() {
        let bytes = compile(
            r#"<tileset firstgid="1" name="props" tilewidth="32" tileheight="48" tilecount="2">
                <tile id="0"><image source="tree.png" width="32" height="48"/></tile>
                <tile id="1">
                    <properties><property name="solid" value="yes"/></properties>
                    <image source="rock.png" width="24" height="16"/>
                </tile>
            </tileset>"#,
        );
        let map = decode(&bytes).unwrap();

        let tileset = &map.tilesets[0];
        assert!(!tileset.is_standard());
        assert!(tileset.texture.is_none());
        assert!(tileset.tile(0).is_none());
        assert_eq!(tileset.tile(1).unwrap().properties.get("solid"), Some("yes"));
        assert_eq!(tileset.tile_region(1), Some(Rect::new(0, 0, 32, 48)));
        assert_eq!(tileset.tile_region(2), Some(Rect::new(0, 0, 24, 16)));
    }

    #[test]
    fn image_objects_are_rejected() {
        let bytes = compile(
            r#"<objectgroup name="decals">
                <object id="1" name="poster"><image source="poster.png" width="8" height="8"/></object>
            </objectgroup>"#,
        );
        assert!(matches!(decode(&bytes), Err(TiledError::UnsupportedFeature(_))));
    }

    #[test]
    fn unknown_layer_type_is_malformed() {
        let mut w = ContentWriter::new(Vec::new());
        w.write_color(Color::TRANSPARENT).unwrap();
        w.write_string("RightDown").unwrap();
        for value in [1, 1, 1, 8, 8, 0, 8, 8, 0, 0, 1] {
            w.write_i32(value).unwrap();
        }
        w.write_string("mystery").unwrap();
        w.write_bool(true).unwrap();
        w.write_f32(1.0).unwrap();
        w.write_f32(0.0).unwrap();
        w.write_f32(0.0).unwrap();
        w.write_i32(99).unwrap();

        let bytes = w.into_inner();
        assert!(matches!(decode(&bytes), Err(TiledError::MalformedStream(_))));
    }

    #[test]
    fn hand_written_stream_decodes_like_the_encoder_output() {
        let xml = r##"<map orientation="orthogonal" renderorder="right-down" width="2" height="1" tilewidth="16" tileheight="16">
            <tileset firstgid="1" name="props" tilewidth="24" tileheight="32" tilecount="1">
                <properties><property name="kind" value="decor"/></properties>
                <tile id="0">
                    <properties><property name="solid" value="yes"/></properties>
                    <image source="crate.png" width="24" height="32"/>
                </tile>
            </tileset>
            <imagelayer name="sky"><image source="sky.png" width="64" height="64"/></imagelayer>
            <layer name="ground" width="2" height="1"><data encoding="csv">2147483649,0</data></layer>
            <objectgroup name="things" color="#ff0000">
                <properties><property name="spawn" value="true"/></properties>
                <object id="7" name="crate" gid="1073741825" x="16" y="32" width="24" height="32"/>
            </objectgroup>
        </map>"##;

        let mut w = ContentWriter::new(Vec::new());
        // header
        w.write_color(Color::TRANSPARENT).unwrap();
        w.write_string("RightDown").unwrap();
        for value in [1, 2, 1, 16, 16, 0, 24, 32, 0] {
            w.write_i32(value).unwrap();
        }
        w.write_i32(1).unwrap(); // tilesets

        // image-collection tileset
        w.write_bool(false).unwrap();
        w.write_string("").unwrap();
        for value in [1, 24, 32, 0, 0] {
            w.write_i32(value).unwrap();
        }
        w.write_rect(Rect::new(0, 0, 0, 0)).unwrap();
        w.write_i32(1).unwrap();
        w.write_string("kind").unwrap();
        w.write_string("decor").unwrap();
        w.write_i32(1).unwrap(); // tiles
        w.write_i32(0).unwrap();
        w.write_i32(0).unwrap(); // frames
        w.write_bool(true).unwrap();
        w.write_rect(Rect::new(0, 0, 24, 32)).unwrap();
        w.write_i32(1).unwrap();
        w.write_string("solid").unwrap();
        w.write_string("yes").unwrap();

        w.write_i32(3).unwrap(); // layers
        let layer_head = |w: &mut ContentWriter<Vec<u8>>, name: &str, layer_type: i32| {
            w.write_string(name).unwrap();
            w.write_bool(true).unwrap();
            w.write_f32(1.0).unwrap();
            w.write_f32(0.0).unwrap();
            w.write_f32(0.0).unwrap();
            w.write_i32(layer_type).unwrap();
        };

        layer_head(&mut w, "sky", 1);
        w.write_string("sky.png").unwrap();
        w.write_i32(0).unwrap();

        layer_head(&mut w, "ground", 0);
        w.write_i32(2).unwrap();
        w.write_i32(1).unwrap();
        for flag in [true, false, false] {
            w.write_bool(flag).unwrap();
        }
        w.write_i32(0).unwrap();
        for flag in [false, false, false] {
            w.write_bool(flag).unwrap();
        }
        w.write_i32(2).unwrap();
        w.write_i32(1).unwrap();
        w.write_i32(0).unwrap();

        layer_head(&mut w, "things", 2);
        w.write_color(Color::rgba(255, 0, 0, 255)).unwrap();
        w.write_i32(1).unwrap();
        w.write_string("spawn").unwrap();
        w.write_string("true").unwrap();
        w.write_i32(1).unwrap(); // objects
        w.write_i32(7).unwrap();
        w.write_string("crate").unwrap();
        w.write_string("").unwrap();
        for value in [16, 32, 24, 32, 0] {
            w.write_i32(value).unwrap();
        }
        w.write_bool(true).unwrap();
        w.write_string("tile").unwrap();
        w.write_i32(1).unwrap();
        for flag in [false, true, false] {
            w.write_bool(flag).unwrap();
        }
        w.write_i32(0).unwrap();
        let by_hand = w.into_inner();

        let encoded = encode_map(&parse_tmx_map(xml).unwrap(), &ImportOptions::default()).unwrap();
        let expected = decode(&encoded).unwrap();
        let actual = decode(&by_hand).unwrap();
        assert_eq!(actual, expected);

        let (_, things) = actual.object_layers().next().unwrap();
        let tile = things.objects[0].tile().unwrap();
        assert!(tile.flipped_vertically && !tile.flipped_horizontally);
        assert_eq!(actual.tilesets[0].tile_region(1), Some(Rect::new(0, 0, 24, 32)));
    }

    #[test]
    fn truncated_streams_are_malformed() {
        let bytes = compile(TWO_TILESETS);
        for len in [0, 3, bytes.len() / 2, bytes.len() - 1] {
            assert!(
                matches!(decode(&bytes[..len]), Err(TiledError::MalformedStream(_))),
                "prefix of {len} bytes decoded"
            );
        }
        assert!(decode(&bytes).is_ok());
    }
}
