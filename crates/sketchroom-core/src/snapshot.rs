//! Ordered per-room shape list.

use crate::shapes::Shape;
use serde::{Deserialize, Serialize};

/// Everything drawn so far in one room, as known to this client.
///
/// Order is local append order. The list only grows, except through
/// [`RoomSnapshot::replace`] (a full catch-up transfer) or [`RoomSnapshot::clear`].
/// Serialized as a bare JSON array of shapes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomSnapshot {
    shapes: Vec<Shape>,
}

impl RoomSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a snapshot holding the given shapes in order.
    pub fn from_shapes(shapes: Vec<Shape>) -> Self {
        Self { shapes }
    }

    /// All shapes, oldest first.
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Append one shape.
    pub fn push(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }

    /// Replace the whole list.
    pub fn replace(&mut self, shapes: Vec<Shape>) {
        self.shapes = shapes;
    }

    /// Remove every shape.
    pub fn clear(&mut self) {
        self.shapes.clear();
    }

    /// Consume the snapshot, returning its shapes.
    pub fn into_shapes(self) -> Vec<Shape> {
        self.shapes
    }

    /// Serialize to a JSON array.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from a JSON array.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl From<Vec<Shape>> for RoomSnapshot {
    fn from(shapes: Vec<Shape>) -> Self {
        Self::from_shapes(shapes)
    }
}
