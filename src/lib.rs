//! Tiled map content pipeline.
//!
//! This library imports Tiled maps (`.tmx` plus external `.tsx` tilesets),
//! compiles them into a compact binary asset, and decodes that asset straight
//! into a query-ready runtime [`Map`] without touching XML again.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tiled_pipeline::{compile_tmx_map, decode_map, AssetCache, DecodeOptions, ImportOptions};
//!
//! // Build step: XML in, bytes out
//! let bytes = compile_tmx_map("assets/maps/level1.tmx", &ImportOptions::default())?;
//!
//! // Runtime: bytes in, map out
//! let mut textures = AssetCache::new();
//! let mut map = decode_map(&bytes, &mut textures, &DecodeOptions::new("maps"))?;
//!
//! // Once per frame
//! map.update_animated_tiles(1.0 / 60.0);
//! # Ok::<(), tiled_pipeline::TiledError>(())
//! ```
//!
//! # Pipeline
//!
//! 1. [`parse_tmx_map`] builds the XML model ([`TmxMap`]).
//! 2. [`resolve_tilesets`] splices external tilesets into it.
//! 3. [`write_map`] encodes the resolved model (see [`content`] for the layout).
//! 4. [`read_map`] decodes the stream into a [`Map`], asking a
//!    [`ContentLoader`] for every texture it references.

pub mod content;
mod error;
mod geometry;
mod loader;
mod options;
mod paths;
mod properties;
pub mod runtime;
pub mod tmx;

use std::path::Path;

pub use content::{decode_map, encode_map, read_map, write_map};
pub use error::{Result, TiledError};
pub use geometry::{Color, Rect, Vector2};
pub use loader::{AssetCache, ContentLoader, Texture, TextureHandle};
pub use options::{DecodeOptions, ImportOptions};
pub use properties::Properties;
pub use runtime::{
    AnimatedTileRef, Layer, LayerKind, Map, Object, ObjectLayer, ObjectShape, Tile, TileLayer,
    Tileset, TilesetTile,
};
pub use tmx::{
    import_tmx_map, parse_tmx_map, parse_tsx_tileset, resolve_tilesets, Orientation, RenderOrder,
    TmxMap,
};

/// Import a `.tmx` file, resolve its tilesets and encode it in one step.
///
/// # Arguments
///
/// * `tmx_path` - Path to the TMX file to compile
/// * `options` - Encoding settings
///
/// # Returns
///
/// The compiled map bytes, or the first error hit. Nothing is returned for a
/// map that fails anywhere along the way.
pub fn compile_tmx_map(tmx_path: impl AsRef<Path>, options: &ImportOptions) -> Result<Vec<u8>> {
    let map = import_tmx_map(tmx_path)?;
    encode_map(&map, options)
}
