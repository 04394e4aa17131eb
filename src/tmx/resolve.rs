//! External tileset resolution.
//!
//! A map may reference `.tsx` documents instead of embedding its tilesets.
//! Resolution replaces every reference with the parsed tileset, keeping the
//! map's `firstgid` and re-basing image paths so they stay valid relative to
//! the map.

use std::fs;
use std::path::{Path, PathBuf};

use super::{parse_tmx_map, parse_tsx_tileset, TmxMap, TmxTileset};
use crate::error::{Result, TiledError};
use crate::paths::{join_asset_path, parent_dir};

/// Read a `.tmx` file from disk and resolve all of its external tilesets.
///
/// # Arguments
///
/// * `tmx_path` - Path to the TMX file to load
///
/// # Returns
///
/// The fully resolved map, or the first error hit. A missing external tileset
/// aborts the whole import.
///
/// # Example
///
/// ```rust,no_run
/// use tiled_pipeline::import_tmx_map;
///
/// let map = import_tmx_map("maps/world.tmx")?;
/// assert!(map.tilesets.iter().all(|t| !t.is_external()));
/// # Ok::<(), tiled_pipeline::TiledError>(())
/// ```
pub fn import_tmx_map(tmx_path: impl AsRef<Path>) -> Result<TmxMap> {
    let tmx_path = tmx_path.as_ref();
    log::info!("Loading TMX map from {}", tmx_path.display());

    let text = fs::read_to_string(tmx_path)?;
    let map = parse_tmx_map(&text)?;

    for layer in &map.layers {
        log::debug!("Parsed layer '{}'", layer.name);
    }

    let map = resolve_tilesets(map, tmx_path)?;
    log::info!(
        "Successfully loaded map {} ({}x{} tiles, {} tilesets, {} layers)",
        tmx_path.display(),
        map.width,
        map.height,
        map.tilesets.len(),
        map.layers.len()
    );
    Ok(map)
}

/// Replace every external tileset reference in `map` with its parsed contents.
///
/// `map_path` is the path of the `.tmx` file the map came from; external
/// sources are resolved against its directory. The map's `firstgid` always
/// wins over one found in the external document.
pub fn resolve_tilesets(map: TmxMap, map_path: &Path) -> Result<TmxMap> {
    let map_folder = map_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let resolved = map
        .tilesets
        .iter()
        .map(|tileset| resolve_tileset(tileset, &map_folder))
        .collect::<Result<Vec<_>>>()?;

    Ok(TmxMap {
        tilesets: resolved,
        ..map
    })
}

fn resolve_tileset(entry: &TmxTileset, map_folder: &Path) -> Result<TmxTileset> {
    if !entry.is_external() {
        return Ok(TmxTileset {
            map_folder: map_folder.to_path_buf(),
            ..entry.clone()
        });
    }

    if entry.source.starts_with(['/', '\\']) || Path::new(&entry.source).is_absolute() {
        return Err(TiledError::UnsupportedFeature(format!(
            "absolute tileset source '{}' (external tilesets must be relative to the map)",
            entry.source
        )));
    }
    let tsx_path = map_folder.join(host_path(&entry.source));
    log::info!("Reading external tileset file {}", tsx_path.display());

    let text = fs::read_to_string(&tsx_path).map_err(|source| TiledError::MissingReference {
        path: tsx_path.clone(),
        source,
    })?;
    let mut tileset = parse_tsx_tileset(&text)?;

    // Images in the .tsx are relative to the .tsx itself, not to the map.
    let tsx_folder = parent_dir(&entry.source);
    if let Some(image) = tileset.image.as_mut() {
        image.source = join_asset_path(tsx_folder, &image.source);
    }
    for tile in &mut tileset.tiles {
        if let Some(image) = tile.image.as_mut() {
            image.source = join_asset_path(tsx_folder, &image.source);
        }
    }

    log::debug!(
        "Resolved external tileset '{}' (firstgid {})",
        tileset.name,
        entry.first_gid
    );

    Ok(TmxTileset {
        first_gid: entry.first_gid,
        source: String::new(),
        map_folder: map_folder.to_path_buf(),
        ..tileset
    })
}

/// Convert a Tiled path (always `/`-separated) into a host path.
fn host_path(tiled_path: &str) -> PathBuf {
    tiled_path
        .split(['/', '\\'])
        .filter(|part| !part.is_empty())
        .collect()
}
