//! Caller-supplied settings for the encode and decode steps.

use crate::paths::join_asset_path;

/// Settings for compiling a resolved [`crate::TmxMap`] into the binary format.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Drop file extensions from texture names (`tiles/grass.png` becomes
    /// `tiles/grass`), for content managers that address assets without them.
    pub strip_texture_extensions: bool,
}

impl ImportOptions {
    /// Texture name as written into the stream.
    pub fn texture_name(&self, source: &str) -> String {
        if !self.strip_texture_extensions {
            return source.to_string();
        }
        match source.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => stem.to_string(),
            _ => source.to_string(),
        }
    }
}

/// Settings for decoding a compiled map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Directory of the compiled map asset relative to the content root.
    /// Texture names in the stream are relative to the map and get joined onto it.
    pub asset_directory: String,
}

impl DecodeOptions {
    pub fn new(asset_directory: impl Into<String>) -> Self {
        DecodeOptions {
            asset_directory: asset_directory.into(),
        }
    }

    /// Turn a map-relative texture name into a content-root-relative asset name.
    pub fn relative_asset_path(&self, texture_name: &str) -> String {
        join_asset_path(&self.asset_directory, texture_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_extensions_only_when_asked() {
        let keep = ImportOptions::default();
        assert_eq!(keep.texture_name("art/tiles.png"), "art/tiles.png");

        let strip = ImportOptions {
            strip_texture_extensions: true,
        };
        assert_eq!(strip.texture_name("art/tiles.png"), "art/tiles");
        assert_eq!(strip.texture_name("art.v2/tiles"), "art.v2/tiles");
        assert_eq!(strip.texture_name(".hidden"), ".hidden");
    }

    #[test]
    fn asset_paths_are_joined_and_normalized() {
        let options = DecodeOptions::new("maps/forest");
        assert_eq!(options.relative_asset_path("../tiles/grass.png"), "maps/tiles/grass.png");
        assert_eq!(DecodeOptions::default().relative_asset_path("sky.png"), "sky.png");
    }
}
