//! Vello-based renderer implementation.

use crate::renderer::{RenderContext, Renderer, shape_path};
use kurbo::{Affine, Point, Rect, Stroke};
use peniko::Fill;
use vello::Scene;

/// Vello-based renderer for GPU-accelerated 2D graphics.
///
/// Only builds the [`Scene`]; the host owns the device and surface and
/// submits the scene itself.
pub struct VelloRenderer {
    scene: Scene,
}

impl Default for VelloRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl VelloRenderer {
    pub fn new() -> Self {
        Self { scene: Scene::new() }
    }

    /// Get the built scene.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Take the built scene, leaving an empty one.
    pub fn take_scene(&mut self) -> Scene {
        std::mem::take(&mut self.scene)
    }
}

impl Renderer for VelloRenderer {
    fn build_scene(&mut self, ctx: &RenderContext) {
        self.scene.reset();

        let background = Rect::from_origin_size(Point::ZERO, ctx.viewport_size);
        self.scene.fill(
            Fill::NonZero,
            Affine::IDENTITY,
            self.background_color(ctx),
            None,
            &background,
        );

        let stroke = Stroke::new(ctx.stroke_width);
        for shape in ctx.paint_order() {
            let path = shape_path(shape);
            self.scene
                .stroke(&stroke, Affine::IDENTITY, ctx.stroke_color, None, &path);
        }
    }
}
