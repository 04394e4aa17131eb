//! Query-ready map structure produced by the binary decoder.
//!
//! The [`Map`] owns its tilesets and layers; tiles refer back to their tileset
//! by index into [`Map::tilesets`].

mod layer;
mod map;
mod object;
mod tile;
mod tileset;

pub use layer::{ImageLayer, Layer, LayerKind, LayerType, ObjectLayer, TileLayer};
pub use map::{AnimatedTileRef, Map};
pub use object::{Object, ObjectShape};
pub use tile::{Tile, TileAnimation};
pub use tileset::{AnimationFrame, Tileset, TilesetKind, TilesetTile};
