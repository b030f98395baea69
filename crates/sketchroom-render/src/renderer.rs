//! Renderer trait abstraction.

use kurbo::{BezPath, Shape as KurboShape, Size};
use peniko::Color;
use sketchroom_core::room::RoomSession;
use sketchroom_core::shapes::Shape;
use sketchroom_core::storage::SnapshotStore;
use thiserror::Error;

/// Tolerance used when flattening curves into paths.
const PATH_TOLERANCE: f64 = 0.1;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Export failed: {0}")]
    Export(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Context for a single render frame.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    /// Committed shapes, in draw order.
    pub shapes: &'a [Shape],
    /// In-progress gesture preview, drawn last.
    pub preview: Option<&'a Shape>,
    /// Viewport size in pixels.
    pub viewport_size: Size,
    /// Background color.
    pub background_color: Color,
    /// Outline color for every shape.
    pub stroke_color: Color,
    /// Outline width in pixels.
    pub stroke_width: f64,
}

impl<'a> RenderContext<'a> {
    /// Create a new render context with the default look: white outlines on black.
    pub fn new(shapes: &'a [Shape], viewport_size: Size) -> Self {
        Self {
            shapes,
            preview: None,
            viewport_size,
            background_color: Color::from_rgba8(0, 0, 0, 255),
            stroke_color: Color::from_rgba8(255, 255, 255, 255),
            stroke_width: 2.0,
        }
    }

    /// Context for the current state of a room view.
    pub fn from_session<S: SnapshotStore + ?Sized>(
        session: &'a RoomSession<S>,
        viewport_size: Size,
    ) -> Self {
        Self::new(session.shapes(), viewport_size).with_preview(session.preview())
    }

    /// Set the preview shape.
    pub fn with_preview(mut self, preview: Option<&'a Shape>) -> Self {
        self.preview = preview;
        self
    }

    /// Set the background color.
    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    /// Set the outline color.
    pub fn with_stroke_color(mut self, color: Color) -> Self {
        self.stroke_color = color;
        self
    }

    /// Set the outline width.
    pub fn with_stroke_width(mut self, width: f64) -> Self {
        self.stroke_width = width;
        self
    }

    /// Shapes in paint order: the snapshot, then the preview.
    pub fn paint_order(&self) -> impl Iterator<Item = &'a Shape> + use<'a> {
        self.shapes.iter().chain(self.preview)
    }
}

/// Trait for rendering backends.
pub trait Renderer {
    /// Build the draw commands for a frame.
    ///
    /// Always a full redraw: clear, background, every shape in order, then
    /// the preview.
    fn build_scene(&mut self, ctx: &RenderContext);

    /// Get the background color (for clearing).
    fn background_color(&self, ctx: &RenderContext) -> Color {
        ctx.background_color
    }
}

/// Outline path of a shape.
///
/// Rectangles are normalized first, so a rectangle dragged backwards draws
/// the same path as its forward equivalent.
pub fn shape_path(shape: &Shape) -> BezPath {
    match shape {
        Shape::Rectangle(rect) => rect.as_rect().to_path(PATH_TOLERANCE),
        Shape::Circle(circle) => circle.as_circle().to_path(PATH_TOLERANCE),
        Shape::Pencil(pencil) => pencil.as_line().to_path(PATH_TOLERANCE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{PathEl, Point};
    use sketchroom_core::shapes::{Circle, Pencil, Rectangle};

    #[test]
    fn test_backwards_rectangle_draws_same_path() {
        let forward: Shape = Rectangle::new(10.0, 10.0, 40.0, 30.0).into();
        let backward: Shape = Rectangle::new(50.0, 40.0, -40.0, -30.0).into();
        assert_eq!(shape_path(&forward), shape_path(&backward));
    }

    #[test]
    fn test_pencil_path_is_single_segment() {
        let shape: Shape = Pencil::new(Point::new(1.0, 2.0), Point::new(3.0, 4.0)).into();
        let els: Vec<PathEl> = shape_path(&shape).elements().to_vec();
        assert_eq!(
            els,
            vec![PathEl::MoveTo(Point::new(1.0, 2.0)), PathEl::LineTo(Point::new(3.0, 4.0))]
        );
    }

    #[test]
    fn test_circle_path_bounds() {
        let shape: Shape = Circle::new(Point::new(20.0, 20.0), 20.0).into();
        let bounds = shape_path(&shape).bounding_box();
        assert!((bounds.x0 - 0.0).abs() < 1e-6);
        assert!((bounds.x1 - 40.0).abs() < 1e-6);
    }

    #[test]
    fn test_context_paint_order_puts_preview_last() {
        let shapes: Vec<Shape> = vec![Rectangle::new(0.0, 0.0, 1.0, 1.0).into()];
        let preview: Shape = Circle::new(Point::new(5.0, 5.0), 2.0).into();
        let ctx = RenderContext::new(&shapes, Size::new(100.0, 100.0)).with_preview(Some(&preview));

        let order: Vec<&Shape> = ctx.paint_order().collect();
        assert_eq!(order, vec![&shapes[0], &preview]);
        assert_eq!(ctx.stroke_width, 2.0);
    }
}
