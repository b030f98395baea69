//! Circle shape.

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// A circle given by center and radius.
///
/// Deserialization rejects negative radii, so every `Circle` that reaches a
/// renderer is well formed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "CircleRecord")]
pub struct Circle {
    pub center_x: f64,
    pub center_y: f64,
    pub radius: f64,
}

/// Unchecked wire form of [`Circle`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CircleRecord {
    center_x: f64,
    center_y: f64,
    radius: f64,
}

impl TryFrom<CircleRecord> for Circle {
    type Error = String;

    fn try_from(record: CircleRecord) -> Result<Self, Self::Error> {
        if record.radius.is_nan() || record.radius < 0.0 {
            return Err(format!("circle radius must be non-negative, got {}", record.radius));
        }
        Ok(Self {
            center_x: record.center_x,
            center_y: record.center_y,
            radius: record.radius,
        })
    }
}

impl Circle {
    /// Create a new circle. Negative radii are clamped to zero.
    pub fn new(center: Point, radius: f64) -> Self {
        Self {
            center_x: center.x,
            center_y: center.y,
            radius: radius.max(0.0),
        }
    }

    /// Build a circle from a drag.
    ///
    /// The radius is half the larger axis delta, and the center sits one
    /// radius away from the anchor along each axis in the drag direction
    /// (a zero delta counts as positive).
    pub fn from_drag(anchor: Point, to: Point) -> Self {
        let dx = to.x - anchor.x;
        let dy = to.y - anchor.y;
        let radius = dx.abs().max(dy.abs()) / 2.0;
        let center = Point::new(
            anchor.x + radius * direction(dx),
            anchor.y + radius * direction(dy),
        );
        Self::new(center, radius)
    }

    /// Center point.
    pub fn center(&self) -> Point {
        Point::new(self.center_x, self.center_y)
    }

    /// Get the circle as a kurbo Circle.
    pub fn as_circle(&self) -> kurbo::Circle {
        kurbo::Circle::new(self.center(), self.radius)
    }
}

fn direction(delta: f64) -> f64 {
    if delta < 0.0 { -1.0 } else { 1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_drag_horizontal() {
        let circle = Circle::from_drag(Point::new(0.0, 0.0), Point::new(40.0, 0.0));
        assert_eq!(circle.radius, 20.0);
        assert_eq!(circle.center(), Point::new(20.0, 20.0));
    }

    #[test]
    fn test_from_drag_up_left() {
        let circle = Circle::from_drag(Point::new(100.0, 100.0), Point::new(90.0, 60.0));
        assert_eq!(circle.radius, 20.0);
        assert_eq!(circle.center(), Point::new(80.0, 80.0));
    }

    #[test]
    fn test_zero_drag_is_zero_radius() {
        let circle = Circle::from_drag(Point::new(5.0, 5.0), Point::new(5.0, 5.0));
        assert_eq!(circle.radius, 0.0);
        assert_eq!(circle.center(), Point::new(5.0, 5.0));
    }

    #[test]
    fn test_negative_radius_rejected() {
        let json = r#"{"centerX":1.0,"centerY":2.0,"radius":-3.0}"#;
        assert!(serde_json::from_str::<Circle>(json).is_err());
    }
}
