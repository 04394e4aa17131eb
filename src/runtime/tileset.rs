use std::collections::{BTreeMap, HashMap};

use crate::geometry::Rect;
use crate::loader::Texture;
use crate::properties::Properties;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimationFrame {
    /// Local id of the tile shown during this frame.
    pub tile_id: u32,
    /// Frame length in seconds.
    pub duration: f32,
}

/// Per-tile data stored on a tileset: animation and custom properties.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TilesetTile {
    pub id: u32,
    pub animation_frames: Vec<AnimationFrame>,
    pub properties: Properties,
}

impl TilesetTile {
    pub fn new(id: u32) -> Self {
        TilesetTile {
            id,
            ..Self::default()
        }
    }

    pub fn is_animated(&self) -> bool {
        !self.animation_frames.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TilesetKind {
    /// Tiles laid out on a regular grid inside one atlas image.
    #[default]
    Standard,
    /// Every tile has its own independently sized image region.
    ImageCollection,
}

/// A decoded tileset owning the gid range `[first_gid, next tileset's first_gid)`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tileset {
    /// Atlas texture; `None` for image collections.
    pub texture: Option<Texture>,
    pub first_gid: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub spacing: u32,
    pub margin: u32,
    /// Area of the atlas used by this tileset.
    pub bounds: Rect,
    pub kind: TilesetKind,
    pub properties: Properties,
    /// Tileset tiles keyed by local id. Image-collection tiles that only
    /// carried a region are not kept here.
    pub tiles: BTreeMap<u32, TilesetTile>,
    regions: HashMap<u32, Rect>,
}

impl Tileset {
    pub fn new(first_gid: u32, tile_width: u32, tile_height: u32, kind: TilesetKind) -> Self {
        Tileset {
            first_gid,
            tile_width,
            tile_height,
            kind,
            ..Self::default()
        }
    }

    pub fn is_standard(&self) -> bool {
        self.kind == TilesetKind::Standard
    }

    pub fn tile(&self, local_id: u32) -> Option<&TilesetTile> {
        self.tiles.get(&local_id)
    }

    pub fn add_tile(&mut self, tile: TilesetTile) {
        self.tiles.insert(tile.id, tile);
    }

    /// Record the image region of an image-collection tile, keyed by gid.
    pub fn set_tile_texture_region(&mut self, gid: u32, region: Rect) {
        self.regions.insert(gid, region);
    }

    /// Number of tile columns in the atlas, 0 for image collections.
    pub fn columns(&self) -> u32 {
        if !self.is_standard() {
            return 0;
        }
        grid_cells(self.bounds.width, self.margin, self.tile_width, self.spacing)
    }

    /// Number of tile rows in the atlas, 0 for image collections.
    pub fn rows(&self) -> u32 {
        if !self.is_standard() {
            return 0;
        }
        grid_cells(self.bounds.height, self.margin, self.tile_height, self.spacing)
    }

    /// Source rectangle for `gid` inside this tileset's texture(s).
    ///
    /// Standard tilesets compute it from the grid layout; image collections
    /// look it up in the region table. Returns `None` for gids outside the
    /// tileset, including gids past the last row of the atlas.
    pub fn tile_region(&self, gid: u32) -> Option<Rect> {
        if !self.is_standard() {
            return self.regions.get(&gid).copied();
        }

        let local = gid.checked_sub(self.first_gid)?;
        let columns = self.columns();
        if columns == 0 {
            return None;
        }
        let column = local % columns;
        let row = local / columns;
        if row >= self.rows() {
            return None;
        }

        let offset = |cell: u32, size: u32| {
            let step = size.checked_add(self.spacing)?;
            let pixels = cell.checked_mul(step)?.checked_add(self.margin)?;
            i32::try_from(pixels).ok()
        };
        Some(Rect::new(
            self.bounds.x.checked_add(offset(column, self.tile_width)?)?,
            self.bounds.y.checked_add(offset(row, self.tile_height)?)?,
            i32::try_from(self.tile_width).ok()?,
            i32::try_from(self.tile_height).ok()?,
        ))
    }
}

/// Tiles that fit along one atlas axis of `extent` pixels.
fn grid_cells(extent: i32, margin: u32, tile_size: u32, spacing: u32) -> u32 {
    if tile_size == 0 {
        return 0;
    }
    let stride = tile_size.saturating_add(spacing);
    (extent.max(0) as u32)
        .saturating_sub(margin.saturating_mul(2))
        .saturating_add(spacing)
        / stride
}
