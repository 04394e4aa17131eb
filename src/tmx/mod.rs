//! In-memory model of a Tiled XML document (`.tmx` maps and `.tsx` tilesets).
//!
//! This is the import side of the pipeline: it mirrors the markup closely and
//! keeps raw gids (flip bits included) so the encoder can decide how to lay the
//! data out. See [`crate::runtime`] for the query-ready structure built from
//! the binary stream.

mod parse;
pub mod resolve;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TiledError};
use crate::geometry::{Color, Vector2};
use crate::properties::Properties;

pub use parse::{parse_tmx_map, parse_tsx_tileset};
pub use resolve::{import_tmx_map, resolve_tilesets};

/// Flip bits stored in the high bits of a raw Tiled gid.
pub const FLIPPED_HORIZONTALLY_FLAG: u32 = 0x8000_0000;
pub const FLIPPED_VERTICALLY_FLAG: u32 = 0x4000_0000;
pub const FLIPPED_DIAGONALLY_FLAG: u32 = 0x2000_0000;
const GID_MASK: u32 = 0x1FFF_FFFF;

/// Split a raw gid into the clean gid and its (horizontal, vertical, diagonal) flip flags.
pub fn split_gid(raw: u32) -> (u32, bool, bool, bool) {
    (
        raw & GID_MASK,
        raw & FLIPPED_HORIZONTALLY_FLAG != 0,
        raw & FLIPPED_VERTICALLY_FLAG != 0,
        raw & FLIPPED_DIAGONALLY_FLAG != 0,
    )
}

/// Map projection, stored in the binary stream as its ordinal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Orthogonal,
    Isometric,
    Staggered,
    Hexagonal,
}

impl Orientation {
    pub fn ordinal(self) -> i32 {
        match self {
            Orientation::Orthogonal => 0,
            Orientation::Isometric => 1,
            Orientation::Staggered => 2,
            Orientation::Hexagonal => 3,
        }
    }

    pub fn from_ordinal(ordinal: i32) -> Option<Self> {
        match ordinal {
            0 => Some(Orientation::Orthogonal),
            1 => Some(Orientation::Isometric),
            2 => Some(Orientation::Staggered),
            3 => Some(Orientation::Hexagonal),
            _ => None,
        }
    }

    /// Parse the `orientation` attribute of a `<map>` element.
    pub fn from_tmx(value: &str) -> Result<Self> {
        match value {
            "orthogonal" => Ok(Orientation::Orthogonal),
            "isometric" => Ok(Orientation::Isometric),
            "staggered" => Ok(Orientation::Staggered),
            "hexagonal" => Ok(Orientation::Hexagonal),
            other => Err(TiledError::Xml(format!("Unknown map orientation '{other}'"))),
        }
    }
}

/// Order in which tiles are drawn, stored in the binary stream by name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderOrder {
    #[default]
    RightDown,
    RightUp,
    LeftDown,
    LeftUp,
}

impl RenderOrder {
    const ALL: [RenderOrder; 4] = [
        RenderOrder::RightDown,
        RenderOrder::RightUp,
        RenderOrder::LeftDown,
        RenderOrder::LeftUp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RenderOrder::RightDown => "RightDown",
            RenderOrder::RightUp => "RightUp",
            RenderOrder::LeftDown => "LeftDown",
            RenderOrder::LeftUp => "LeftUp",
        }
    }

    /// Case-insensitive lookup by enum name, as written in the binary stream.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|order| order.name().eq_ignore_ascii_case(name))
    }

    /// Parse the hyphenated `renderorder` attribute (`right-down` etc).
    pub fn from_tmx(value: &str) -> Result<Self> {
        Self::from_name(&value.replace('-', ""))
            .ok_or_else(|| TiledError::Xml(format!("Unknown render order '{value}'")))
    }
}

/// A `<map>` document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TmxMap {
    pub version: String,
    pub orientation: Orientation,
    pub render_order: RenderOrder,
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub background_color: Option<Color>,
    pub properties: Properties,
    pub tilesets: Vec<TmxTileset>,
    pub layers: Vec<TmxLayer>,
}

/// A `<tileset>` element, either inline or a reference to an external `.tsx`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TmxTileset {
    pub first_gid: u32,
    /// Path of the external tileset document, empty for inline tilesets.
    pub source: String,
    pub name: String,
    pub tile_width: u32,
    pub tile_height: u32,
    pub spacing: u32,
    pub margin: u32,
    pub tile_count: u32,
    pub columns: u32,
    /// Atlas image; `None` for image-collection tilesets.
    pub image: Option<TmxImage>,
    pub tiles: Vec<TmxTilesetTile>,
    pub properties: Properties,
    /// Directory of the map that owns this tileset, set by the resolver.
    pub map_folder: PathBuf,
}

impl TmxTileset {
    pub fn is_external(&self) -> bool {
        !self.source.trim().is_empty()
    }

    pub fn is_image_collection(&self) -> bool {
        self.image.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmxImage {
    pub source: String,
    pub width: u32,
    pub height: u32,
}

/// A `<tile>` entry inside a tileset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TmxTilesetTile {
    pub id: u32,
    /// Own image, present only in image-collection tilesets.
    pub image: Option<TmxImage>,
    /// Sub-rectangle of `image` (`x`, `y`, `width`, `height` attributes).
    pub region: Option<(u32, u32, u32, u32)>,
    pub animation: Vec<TmxFrame>,
    pub properties: Properties,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmxFrame {
    pub tile_id: u32,
    pub duration_ms: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TmxLayer {
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub properties: Properties,
    pub kind: TmxLayerKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TmxLayerKind {
    Tiles(TmxTileLayer),
    Image(TmxImageLayer),
    Objects(TmxObjectGroup),
}

/// Tile grid with raw gids, row-major, `data.len() == width * height`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmxTileLayer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmxImageLayer {
    pub image: Option<TmxImage>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TmxObjectGroup {
    pub color: Option<Color>,
    pub objects: Vec<TmxObject>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TmxObject {
    pub id: u32,
    pub name: String,
    pub object_type: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub rotation: f32,
    pub visible: bool,
    /// Raw gid (flip bits included) for tile objects.
    pub gid: Option<u32>,
    pub shape: TmxObjectShape,
    pub properties: Properties,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum TmxObjectShape {
    #[default]
    Rectangle,
    Ellipse,
    Polygon(Vec<Vector2>),
    Polyline(Vec<Vector2>),
    Image(TmxImage),
}
