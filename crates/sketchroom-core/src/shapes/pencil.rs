//! Freehand segment.

use kurbo::{Line, Point};
use serde::{Deserialize, Serialize};

/// One straight piece of a freehand stroke.
///
/// A stroke is not an entity of its own: it is the run of segments committed
/// while one press lasts, each starting where the previous one ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pencil {
    pub start_x: f64,
    pub start_y: f64,
    pub end_x: f64,
    pub end_y: f64,
}

impl Pencil {
    /// Create a segment between two points.
    pub fn new(start: Point, end: Point) -> Self {
        Self {
            start_x: start.x,
            start_y: start.y,
            end_x: end.x,
            end_y: end.y,
        }
    }

    pub fn start(&self) -> Point {
        Point::new(self.start_x, self.start_y)
    }

    pub fn end(&self) -> Point {
        Point::new(self.end_x, self.end_y)
    }

    /// Get the segment as a kurbo Line.
    pub fn as_line(&self) -> Line {
        Line::new(self.start(), self.end())
    }
}
