// tests/pipeline.rs

use std::fs;
use std::path::{Path, PathBuf};

use tiled_pipeline::{
    compile_tmx_map, decode_map, import_tmx_map, AnimatedTileRef, AssetCache, Color,
    DecodeOptions, ImportOptions, LayerKind, Map, ObjectShape, Rect, TiledError, Vector2,
};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("maps")
        .join(name)
}

fn load_forest(textures: &mut AssetCache) -> Map {
    let bytes = compile_tmx_map(fixture("forest.tmx"), &ImportOptions::default())
        .expect("forest.tmx should compile");
    decode_map(&bytes, textures, &DecodeOptions::new("maps")).expect("compiled map should decode")
}

#[test]
fn external_tilesets_are_spliced_in_place() {
    let map = import_tmx_map(fixture("forest.tmx")).unwrap();

    assert_eq!(map.tilesets.len(), 2);
    let props = &map.tilesets[1];
    assert!(!props.is_external());
    assert_eq!(props.first_gid, 5);
    assert_eq!(props.name, "props");
    assert_eq!(props.properties.get("layer"), Some("decor"));
    assert!(props.map_folder.ends_with("maps"));

    // ../art/ relative to tilesets/ lands in the map's own art/ folder
    let sources: Vec<_> = props
        .tiles
        .iter()
        .filter_map(|t| t.image.as_ref().map(|i| i.source.as_str()))
        .collect();
    assert_eq!(sources, ["art/tree.png", "art/barrel.png"]);
}

#[test]
fn missing_external_tileset_aborts_import() {
    let mut path = std::env::temp_dir();
    path.push("tiled_pipeline_missing_tileset.tmx");
    fs::write(
        &path,
        r#"<map orientation="orthogonal" width="1" height="1" tilewidth="8" tileheight="8">
             <tileset firstgid="1" source="nowhere.tsx"/>
           </map>"#,
    )
    .unwrap();

    let err = compile_tmx_map(&path, &ImportOptions::default()).unwrap_err();
    fs::remove_file(&path).unwrap();
    match err {
        TiledError::MissingReference { path, .. } => assert!(path.ends_with("nowhere.tsx")),
        other => panic!("expected MissingReference, got {:?}", other),
    }
}

#[test]
fn compiled_map_carries_the_document() {
    let mut textures = AssetCache::new();
    let map = load_forest(&mut textures);

    assert_eq!((map.width, map.height), (4, 3));
    assert_eq!((map.tile_width, map.tile_height), (16, 16));
    assert_eq!(map.background_color, Color::rgba(0x20, 0x30, 0x40, 255));
    assert_eq!(map.properties.get("music"), Some("forest.ogg"));
    assert_eq!((map.largest_tile_width, map.largest_tile_height), (24, 32));
    assert!(map.requires_large_tile_culling);

    let names: Vec<_> = map.layers.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, ["sky", "ground", "entities"]);

    let sky = map.layer_with_name("sky").unwrap();
    assert_eq!(sky.opacity, 0.5);
    match &sky.kind {
        LayerKind::Image(image) => assert_eq!(
            image.texture.as_ref().map(|t| t.asset_name.as_str()),
            Some("maps/sky.png")
        ),
        other => panic!("expected an image layer, got {:?}", other),
    }

    // Only the atlas and the image layer need textures; collection tiles carry regions.
    assert_eq!(textures.len(), 2);
    assert!(textures.handle("maps/water.png").is_some());
}

#[test]
fn tiles_and_objects_share_tileset_lookup() {
    let map = load_forest(&mut AssetCache::new());

    let ground = map.layer_with_name("ground").unwrap();
    assert_eq!(ground.offset, Vector2::new(2.0, -3.0));
    assert_eq!(ground.properties.get("collides"), Some("true"));

    let tiles = ground.as_tile_layer().unwrap();
    let placed: Vec<_> = tiles.iter_tiles().map(|(x, y, t)| (x, y, t.gid, t.tileset)).collect();
    assert_eq!(placed, [(0, 0, 1, 0), (3, 0, 2, 0), (1, 1, 3, 0), (3, 2, 4, 0)]);

    let entities = map.layer_with_name("entities").unwrap().as_object_layer().unwrap();
    assert_eq!(entities.color, Color::rgba(0, 255, 0, 255));

    let chest = entities.object_with_name("chest").unwrap();
    assert_eq!(chest.object_type, "loot");
    assert_eq!((chest.x, chest.y, chest.width, chest.height), (32, 48, 24, 16));
    let tile = chest.tile().unwrap();
    assert_eq!(tile.gid, 6);
    assert!(tile.flipped_horizontally && !tile.flipped_vertically);
    assert_eq!(Some(tile.tileset), map.tileset_index_for_gid(6));
    assert_eq!(
        map.get_tileset_tile(6).and_then(|t| t.properties.get("container")),
        Some("true")
    );

    let path = entities.object_with_name("path").unwrap();
    assert!(matches!(path.shape, ObjectShape::Polyline(_)));
    assert_eq!(path.points().map(<[_]>::len), Some(3));
}

#[test]
fn image_collection_regions_survive_decoding() {
    let map = load_forest(&mut AssetCache::new());
    let props = map.get_tileset_for_tile_id(5).unwrap();

    assert!(!props.is_standard());
    // The bare tree tile is dropped, the barrel keeps its properties.
    assert!(props.tile(0).is_none());
    assert!(props.tile(1).is_some());
    assert_eq!(props.tile_region(5), Some(Rect::new(0, 0, 24, 32)));
    assert_eq!(props.tile_region(6), Some(Rect::new(0, 0, 24, 16)));

    let water = map.get_tileset_for_tile_id(3).unwrap();
    assert_eq!(water.tile_region(4), Some(Rect::new(16, 16, 16, 16)));
}

#[test]
fn animated_water_cycles_with_carry() {
    let mut map = load_forest(&mut AssetCache::new());
    assert_eq!(map.animated_tiles(), &[AnimatedTileRef::Cell { layer: 1, index: 0 }]);

    let shown = |map: &Map| {
        let tiles = map.layer_with_name("ground").unwrap().as_tile_layer().unwrap();
        map.current_tile_id(tiles.get_tile(0, 0).unwrap())
    };

    assert_eq!(shown(&map), 1);
    map.update_animated_tiles(0.25);
    assert_eq!(shown(&map), 2);
    // 0.05s carried over plus 0.3s runs past the second frame
    map.update_animated_tiles(0.3);
    assert_eq!(shown(&map), 1);
    map.update_animated_tiles(0.1);
    assert_eq!(shown(&map), 1);
}

#[test]
fn compilation_is_deterministic() {
    let first = compile_tmx_map(fixture("forest.tmx"), &ImportOptions::default()).unwrap();
    let second = compile_tmx_map(fixture("forest.tmx"), &ImportOptions::default()).unwrap();
    assert_eq!(first, second);

    let stripped = compile_tmx_map(
        fixture("forest.tmx"),
        &ImportOptions {
            strip_texture_extensions: true,
        },
    )
    .unwrap();
    let mut textures = AssetCache::new();
    decode_map(&stripped, &mut textures, &DecodeOptions::new("maps")).unwrap();
    assert!(textures.handle("maps/water").is_some());
    assert!(textures.handle("maps/sky").is_some());
}
