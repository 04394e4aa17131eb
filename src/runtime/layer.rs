use super::object::Object;
use super::tile::Tile;
use crate::geometry::{Color, Vector2};
use crate::loader::Texture;
use crate::properties::Properties;

/// Layer kind ordinal as stored in the binary stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerType {
    Tile,
    Image,
    Object,
}

impl LayerType {
    pub fn ordinal(self) -> i32 {
        match self {
            LayerType::Tile => 0,
            LayerType::Image => 1,
            LayerType::Object => 2,
        }
    }

    pub fn from_ordinal(ordinal: i32) -> Option<Self> {
        match ordinal {
            0 => Some(LayerType::Tile),
            1 => Some(LayerType::Image),
            2 => Some(LayerType::Object),
            _ => None,
        }
    }
}

/// One drawable plane of a map.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub offset: Vector2,
    pub properties: Properties,
    pub kind: LayerKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LayerKind {
    Tile(TileLayer),
    Image(ImageLayer),
    Object(ObjectLayer),
}

impl Layer {
    pub fn new(name: impl Into<String>, kind: LayerKind) -> Self {
        Layer {
            name: name.into(),
            visible: true,
            opacity: 1.0,
            offset: Vector2::ZERO,
            properties: Properties::new(),
            kind,
        }
    }

    pub fn layer_type(&self) -> LayerType {
        match self.kind {
            LayerKind::Tile(_) => LayerType::Tile,
            LayerKind::Image(_) => LayerType::Image,
            LayerKind::Object(_) => LayerType::Object,
        }
    }

    pub fn as_tile_layer(&self) -> Option<&TileLayer> {
        match &self.kind {
            LayerKind::Tile(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_tile_layer_mut(&mut self) -> Option<&mut TileLayer> {
        match &mut self.kind {
            LayerKind::Tile(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_image_layer(&self) -> Option<&ImageLayer> {
        match &self.kind {
            LayerKind::Image(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_object_layer(&self) -> Option<&ObjectLayer> {
        match &self.kind {
            LayerKind::Object(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_object_layer_mut(&mut self) -> Option<&mut ObjectLayer> {
        match &mut self.kind {
            LayerKind::Object(layer) => Some(layer),
            _ => None,
        }
    }
}

/// Row-major grid of optional tiles; `tiles[y * width + x]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TileLayer {
    pub width: u32,
    pub height: u32,
    pub tiles: Vec<Option<Tile>>,
}

impl TileLayer {
    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }

    /// Tile at column `x`, row `y`; `None` for empty cells and out-of-range coordinates.
    pub fn get_tile(&self, x: u32, y: u32) -> Option<&Tile> {
        self.index(x, y)
            .and_then(|i| self.tiles.get(i))
            .and_then(Option::as_ref)
    }

    pub fn get_tile_mut(&mut self, x: u32, y: u32) -> Option<&mut Tile> {
        let i = self.index(x, y)?;
        self.tiles.get_mut(i).and_then(Option::as_mut)
    }

    /// Non-empty cells as `(x, y, tile)`.
    pub fn iter_tiles(&self) -> impl Iterator<Item = (u32, u32, &Tile)> + '_ {
        let width = self.width.max(1) as usize;
        self.tiles.iter().enumerate().filter_map(move |(i, cell)| {
            cell.as_ref()
                .map(|tile| ((i % width) as u32, (i / width) as u32, tile))
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageLayer {
    pub texture: Option<Texture>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectLayer {
    /// Tint color.
    pub color: Color,
    pub objects: Vec<Object>,
}

impl ObjectLayer {
    /// First object named `name`.
    pub fn object_with_name(&self, name: &str) -> Option<&Object> {
        self.objects.iter().find(|o| o.name == name)
    }

    /// All objects named `name`, in layer order.
    pub fn objects_with_name(&self, name: &str) -> Vec<&Object> {
        self.objects.iter().filter(|o| o.name == name).collect()
    }
}
