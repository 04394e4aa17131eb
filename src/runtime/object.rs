use super::tile::Tile;
use crate::geometry::Vector2;
use crate::properties::Properties;

/// A free-form object placed on an object layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Object {
    pub id: i32,
    pub name: String,
    pub object_type: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Clockwise rotation in degrees.
    pub rotation: i32,
    pub visible: bool,
    pub properties: Properties,
    pub shape: ObjectShape,
}

/// Type-specific payload of an [`Object`].
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ObjectShape {
    /// Plain rectangle.
    #[default]
    None,
    Ellipse,
    /// Points relative to the object position.
    Polygon(Vec<Vector2>),
    Polyline(Vec<Vector2>),
    Tile(Tile),
}

impl Object {
    pub fn tile(&self) -> Option<&Tile> {
        match &self.shape {
            ObjectShape::Tile(tile) => Some(tile),
            _ => None,
        }
    }

    pub fn tile_mut(&mut self) -> Option<&mut Tile> {
        match &mut self.shape {
            ObjectShape::Tile(tile) => Some(tile),
            _ => None,
        }
    }

    pub fn points(&self) -> Option<&[Vector2]> {
        match &self.shape {
            ObjectShape::Polygon(points) | ObjectShape::Polyline(points) => Some(points),
            _ => None,
        }
    }
}
