use super::layer::{ImageLayer, Layer, LayerKind, ObjectLayer, TileLayer};
use super::object::Object;
use super::tile::{Tile, TileAnimation};
use super::tileset::{Tileset, TilesetTile};
use crate::error::{Result, TiledError};
use crate::geometry::Color;
use crate::loader::Texture;
use crate::properties::Properties;
use crate::tmx::{Orientation, RenderOrder};

/// Location of an animated tile inside the map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnimatedTileRef {
    /// Cell `index` of the tile layer at `layer`.
    Cell { layer: usize, index: usize },
    /// Object `index` of the object layer at `layer`.
    Object { layer: usize, index: usize },
}

/// A decoded map, ready for rendering and collision queries.
#[derive(Clone, Debug, PartialEq)]
pub struct Map {
    pub background_color: Color,
    pub render_order: RenderOrder,
    pub first_gid: u32,
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub orientation: Orientation,
    pub largest_tile_width: u32,
    pub largest_tile_height: u32,
    /// Set when some tile is larger than the map grid, so renderers must widen culling bounds.
    pub requires_large_tile_culling: bool,
    pub properties: Properties,
    pub tilesets: Vec<Tileset>,
    pub layers: Vec<Layer>,
    animated_tiles: Vec<AnimatedTileRef>,
}

impl Map {
    pub fn new(
        first_gid: u32,
        width: u32,
        height: u32,
        tile_width: u32,
        tile_height: u32,
        orientation: Orientation,
    ) -> Self {
        Map {
            background_color: Color::TRANSPARENT,
            render_order: RenderOrder::default(),
            first_gid,
            width,
            height,
            tile_width,
            tile_height,
            orientation,
            largest_tile_width: tile_width,
            largest_tile_height: tile_height,
            requires_large_tile_culling: false,
            properties: Properties::new(),
            tilesets: Vec::new(),
            layers: Vec::new(),
            animated_tiles: Vec::new(),
        }
    }

    /// Record the largest tile size and flag the map for large-tile culling if needed.
    pub fn set_largest_tile_size(&mut self, width: u32, height: u32) {
        self.largest_tile_width = width.max(self.tile_width);
        self.largest_tile_height = height.max(self.tile_height);
        self.requires_large_tile_culling =
            width > self.tile_width || height > self.tile_height;
    }

    // ========================================================================
    // Factories
    // ========================================================================

    /// Append a tileset, returning its index.
    ///
    /// Tilesets must arrive in strictly increasing `first_gid` order so gid
    /// lookup stays unambiguous.
    pub fn create_tileset(&mut self, tileset: Tileset) -> Result<usize> {
        if let Some(last) = self.tilesets.last() {
            if tileset.first_gid <= last.first_gid {
                return Err(TiledError::InvariantViolation(format!(
                    "tileset firstgid {} does not follow previous firstgid {}",
                    tileset.first_gid, last.first_gid
                )));
            }
        }
        self.tilesets.push(tileset);
        Ok(self.tilesets.len() - 1)
    }

    /// Append a tile layer and register its animated cells.
    pub fn create_tile_layer(
        &mut self,
        name: impl Into<String>,
        width: u32,
        height: u32,
        tiles: Vec<Option<Tile>>,
    ) -> Result<&mut Layer> {
        let name = name.into();
        let expected = width as usize * height as usize;
        if tiles.len() != expected {
            return Err(TiledError::MalformedStream(format!(
                "tile layer '{name}' has {} tiles, expected {width}x{height} = {expected}",
                tiles.len()
            )));
        }

        let layer = self.layers.len();
        self.animated_tiles.extend(
            tiles
                .iter()
                .enumerate()
                .filter(|(_, cell)| cell.as_ref().is_some_and(Tile::is_animated))
                .map(|(index, _)| AnimatedTileRef::Cell { layer, index }),
        );

        Ok(self.push_layer(Layer::new(
            name,
            LayerKind::Tile(TileLayer {
                width,
                height,
                tiles,
            }),
        )))
    }

    pub fn create_image_layer(&mut self, name: impl Into<String>, texture: Option<Texture>) -> &mut Layer {
        self.push_layer(Layer::new(name, LayerKind::Image(ImageLayer { texture })))
    }

    /// Append an object layer and register its animated tile objects.
    pub fn create_object_layer(
        &mut self,
        name: impl Into<String>,
        color: Color,
        objects: Vec<Object>,
    ) -> &mut Layer {
        let layer = self.layers.len();
        self.animated_tiles.extend(
            objects
                .iter()
                .enumerate()
                .filter(|(_, object)| object.tile().is_some_and(Tile::is_animated))
                .map(|(index, _)| AnimatedTileRef::Object { layer, index }),
        );

        self.push_layer(Layer::new(
            name,
            LayerKind::Object(ObjectLayer { color, objects }),
        ))
    }

    fn push_layer(&mut self, layer: Layer) -> &mut Layer {
        self.layers.push(layer);
        let last = self.layers.len() - 1;
        &mut self.layers[last]
    }

    /// Build the tile for a cell holding `gid`.
    ///
    /// Returns `Ok(None)` for gid 0 (empty cell). A gid no tileset owns is an
    /// [`TiledError::InvariantViolation`]. Tiles whose tileset entry has
    /// animation frames come back animated; the caller places them and the
    /// layer factory registers them.
    pub fn create_tile(
        &self,
        gid: u32,
        flipped_horizontally: bool,
        flipped_vertically: bool,
        flipped_diagonally: bool,
    ) -> Result<Option<Tile>> {
        if gid == 0 {
            return Ok(None);
        }

        let tileset_index = self.tileset_index_for_gid(gid).ok_or_else(|| {
            TiledError::InvariantViolation(format!("gid {gid} is not owned by any tileset"))
        })?;
        let tileset = &self.tilesets[tileset_index];
        let local_id = gid - tileset.first_gid;

        let mut tile = Tile::new(gid, tileset_index).with_flips(
            flipped_horizontally,
            flipped_vertically,
            flipped_diagonally,
        );
        if tileset.tile(local_id).is_some_and(TilesetTile::is_animated) {
            tile.animation = Some(TileAnimation::new(local_id));
        }
        Ok(Some(tile))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Index of the tileset owning `gid`: the last one whose `first_gid <= gid`.
    pub fn tileset_index_for_gid(&self, gid: u32) -> Option<usize> {
        if gid == 0 {
            return None;
        }
        self.tilesets.iter().rposition(|t| t.first_gid <= gid)
    }

    pub fn get_tileset_for_tile_id(&self, gid: u32) -> Option<&Tileset> {
        self.tileset_index_for_gid(gid).map(|i| &self.tilesets[i])
    }

    /// Tileset tile data (animation, properties) for `gid`, if the tileset has any.
    pub fn get_tileset_tile(&self, gid: u32) -> Option<&TilesetTile> {
        let tileset = self.get_tileset_for_tile_id(gid)?;
        tileset.tile(gid - tileset.first_gid)
    }

    /// Gid to draw for `tile` right now, following its animation if it has one.
    pub fn current_tile_id(&self, tile: &Tile) -> u32 {
        let Some(animation) = &tile.animation else {
            return tile.gid;
        };
        self.tilesets
            .get(tile.tileset)
            .and_then(|tileset| {
                let frames = &tileset.tile(animation.local_id)?.animation_frames;
                Some(tileset.first_gid + animation.current_tile_id(frames)?)
            })
            .unwrap_or(tile.gid)
    }

    pub fn layer_with_name(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn tile_layers(&self) -> impl Iterator<Item = (&Layer, &TileLayer)> {
        self.layers
            .iter()
            .filter_map(|l| l.as_tile_layer().map(|t| (l, t)))
    }

    pub fn object_layers(&self) -> impl Iterator<Item = (&Layer, &ObjectLayer)> {
        self.layers
            .iter()
            .filter_map(|l| l.as_object_layer().map(|o| (l, o)))
    }

    pub fn animated_tiles(&self) -> &[AnimatedTileRef] {
        &self.animated_tiles
    }

    // ========================================================================
    // Animation
    // ========================================================================

    /// Advance every registered animated tile by `elapsed` seconds.
    ///
    /// Call once per update step; only the registry is visited, not every layer.
    pub fn update_animated_tiles(&mut self, elapsed: f32) {
        let Map {
            tilesets,
            layers,
            animated_tiles,
            ..
        } = self;

        for location in animated_tiles.iter() {
            let tile = match *location {
                AnimatedTileRef::Cell { layer, index } => layers
                    .get_mut(layer)
                    .and_then(Layer::as_tile_layer_mut)
                    .and_then(|l| l.tiles.get_mut(index))
                    .and_then(Option::as_mut),
                AnimatedTileRef::Object { layer, index } => layers
                    .get_mut(layer)
                    .and_then(Layer::as_object_layer_mut)
                    .and_then(|l| l.objects.get_mut(index))
                    .and_then(Object::tile_mut),
            };
            let Some(tile) = tile else {
                continue;
            };

            let tileset = tile.tileset;
            let Some(animation) = tile.animation.as_mut() else {
                continue;
            };
            if let Some(frames) = tilesets
                .get(tileset)
                .and_then(|t| t.tile(animation.local_id))
                .map(|t| t.animation_frames.as_slice())
            {
                animation.advance(frames, elapsed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::tileset::{AnimationFrame, TilesetKind};

    fn map_with_tilesets() -> Map {
        let mut map = Map::new(1, 2, 2, 16, 16, Orientation::Orthogonal);
        map.create_tileset(Tileset::new(1, 16, 16, TilesetKind::Standard))
            .unwrap();

        let mut second = Tileset::new(11, 16, 16, TilesetKind::Standard);
        let mut water = TilesetTile::new(0);
        water.animation_frames = vec![
            AnimationFrame {
                tile_id: 0,
                duration: 0.5,
            },
            AnimationFrame {
                tile_id: 1,
                duration: 0.5,
            },
        ];
        second.add_tile(water);
        map.create_tileset(second).unwrap();
        map
    }

    #[test]
    fn gid_lookup_picks_the_owning_tileset() {
        let map = map_with_tilesets();
        assert_eq!(map.tileset_index_for_gid(0), None);
        assert_eq!(map.tileset_index_for_gid(1), Some(0));
        assert_eq!(map.tileset_index_for_gid(10), Some(0));
        assert_eq!(map.tileset_index_for_gid(11), Some(1));
        assert_eq!(map.tileset_index_for_gid(500), Some(1));
        assert!(map.get_tileset_tile(11).unwrap().is_animated());
        assert!(map.get_tileset_tile(12).is_none());
    }

    #[test]
    fn tilesets_must_increase() {
        let mut map = map_with_tilesets();
        let err = map
            .create_tileset(Tileset::new(5, 16, 16, TilesetKind::Standard))
            .unwrap_err();
        assert!(matches!(err, TiledError::InvariantViolation(_)));
    }

    #[test]
    fn create_tile_classifies_cells() {
        let map = map_with_tilesets();
        assert_eq!(map.create_tile(0, true, true, true).unwrap(), None);

        let plain = map.create_tile(3, true, false, false).unwrap().unwrap();
        assert_eq!(plain.tileset, 0);
        assert!(plain.flipped_horizontally);
        assert!(!plain.is_animated());

        let water = map.create_tile(11, false, false, true).unwrap().unwrap();
        assert_eq!(water.tileset, 1);
        assert!(water.is_animated());
        assert!(water.flipped_diagonally);
    }

    #[test]
    fn unowned_gid_is_an_invariant_violation() {
        let mut map = Map::new(5, 1, 1, 8, 8, Orientation::Orthogonal);
        map.create_tileset(Tileset::new(5, 8, 8, TilesetKind::Standard))
            .unwrap();
        assert!(matches!(
            map.create_tile(2, false, false, false),
            Err(TiledError::InvariantViolation(_))
        ));
    }

    #[test]
    fn animated_cells_are_registered_and_advanced() {
        let mut map = map_with_tilesets();
        let tiles = vec![
            map.create_tile(11, false, false, false).unwrap(),
            None,
            map.create_tile(2, false, false, false).unwrap(),
            map.create_tile(11, false, false, false).unwrap(),
        ];
        map.create_tile_layer("water", 2, 2, tiles).unwrap();

        assert_eq!(
            map.animated_tiles(),
            &[
                AnimatedTileRef::Cell { layer: 0, index: 0 },
                AnimatedTileRef::Cell { layer: 0, index: 3 },
            ]
        );

        map.update_animated_tiles(0.6);
        let layer = map.layers[0].as_tile_layer().unwrap();
        let first = layer.get_tile(0, 0).unwrap();
        assert_eq!(first.animation.as_ref().unwrap().current_frame, 1);
        assert_eq!(map.current_tile_id(first), 12);
        assert_eq!(map.current_tile_id(layer.get_tile(0, 1).unwrap()), 2);
    }

    #[test]
    fn tile_layer_size_is_checked() {
        let mut map = map_with_tilesets();
        let err = map.create_tile_layer("short", 2, 2, vec![None]).unwrap_err();
        assert!(matches!(err, TiledError::MalformedStream(_)));
    }

    #[test]
    fn large_tiles_require_culling() {
        let mut map = Map::new(1, 4, 4, 16, 16, Orientation::Orthogonal);
        map.set_largest_tile_size(16, 16);
        assert!(!map.requires_large_tile_culling);
        map.set_largest_tile_size(16, 48);
        assert!(map.requires_large_tile_culling);
        assert_eq!(map.largest_tile_height, 48);
    }
}
