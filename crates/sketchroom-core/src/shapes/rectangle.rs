//! Rectangle shape.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle anchored at the point where the drag started.
///
/// Width and height are signed: a rectangle dragged up or to the left keeps
/// its anchor as origin and carries negative extents. [`Rectangle::as_rect`]
/// normalizes, so a backwards rectangle renders like its normalized form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    /// Anchor x.
    pub x: f64,
    /// Anchor y.
    pub y: f64,
    /// Signed horizontal extent.
    pub width: f64,
    /// Signed vertical extent.
    pub height: f64,
}

impl Rectangle {
    /// Create a new rectangle.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Build a rectangle from a drag: origin at the anchor, extents unnormalized.
    pub fn from_drag(anchor: Point, to: Point) -> Self {
        Self::new(anchor.x, anchor.y, to.x - anchor.x, to.y - anchor.y)
    }

    /// The anchor point.
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Get the rectangle as a normalized kurbo Rect.
    pub fn as_rect(&self) -> Rect {
        Rect::from_points(
            self.origin(),
            Point::new(self.x + self.width, self.y + self.height),
        )
    }
}
