//! The compiled binary map format.
//!
//! Layout, in stream order (all integers little-endian `int32`, floats `f32`,
//! booleans one byte, strings a 7-bit encoded byte length followed by UTF-8,
//! colors four bytes RGBA):
//!
//! ```text
//! header     color background, string renderOrder, firstGid, width, height,
//!            tileWidth, tileHeight, orientation, largestTileWidth,
//!            largestTileHeight, properties, tilesetCount
//! tileset    bool isStandard, string texture, firstGid, tileWidth, tileHeight,
//!            spacing, margin, rect bounds, properties, tileCount, tiles
//! tile       id, frameCount, (tileId, f32 seconds)*, bool fromImageCollection,
//!            [rect region], properties
//! layers     layerCount, then per layer: string name, bool visible,
//!            f32 opacity, vec2 offset, layerType, body
//! tile body  tileCount, (gid, bool flipH, bool flipV, bool flipD)*, width,
//!            height, properties
//! image body string texture, properties
//! object     color tint, properties, objectCount, objects
//! body
//! ```
//!
//! There is no version tag or checksum; the encoder and decoder in this
//! module are each other's exact dual.

mod reader;
mod wire;
mod writer;

pub use reader::{decode_map, read_map};
pub use wire::{ContentReader, ContentWriter};
pub use writer::{encode_map, write_map};
