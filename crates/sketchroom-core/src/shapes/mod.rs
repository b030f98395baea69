//! Shape definitions for the shared canvas.

mod circle;
mod pencil;
mod rectangle;

pub use circle::Circle;
pub use pencil::Pencil;
pub use rectangle::Rectangle;

use serde::{Deserialize, Serialize};

/// A drawable primitive.
///
/// Shapes are immutable once committed: the room only ever appends them.
/// The JSON form is self-describing, e.g.
/// `{"type":"rect","x":10,"y":10,"width":40,"height":30}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Shape {
    #[serde(rename = "rect")]
    Rectangle(Rectangle),
    #[serde(rename = "circle")]
    Circle(Circle),
    #[serde(rename = "pencil")]
    Pencil(Pencil),
}

impl Shape {
    /// The wire discriminant of this shape.
    pub fn type_name(&self) -> &'static str {
        match self {
            Shape::Rectangle(_) => "rect",
            Shape::Circle(_) => "circle",
            Shape::Pencil(_) => "pencil",
        }
    }

    /// Serialize to a JSON object.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from a JSON object.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl From<Rectangle> for Shape {
    fn from(rect: Rectangle) -> Self {
        Shape::Rectangle(rect)
    }
}

impl From<Circle> for Shape {
    fn from(circle: Circle) -> Self {
        Shape::Circle(circle)
    }
}

impl From<Pencil> for Shape {
    fn from(segment: Pencil) -> Self {
        Shape::Pencil(segment)
    }
}

/// The `{"shape": …}` record that carries one shape inside chat messages
/// and history entries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeEnvelope {
    pub shape: Shape,
}

impl ShapeEnvelope {
    pub fn new(shape: Shape) -> Self {
        Self { shape }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
