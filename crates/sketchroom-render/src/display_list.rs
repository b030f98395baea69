//! Headless renderer that records draw commands.

use crate::renderer::{RenderContext, RenderResult, Renderer, RendererError, shape_path};
use kurbo::{BezPath, Point, Rect, Size};
use peniko::Color;
use std::fmt::Write;

/// One recorded drawing operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Clear the whole surface.
    Clear { size: Size },
    /// Fill a rectangle.
    Fill { rect: Rect, color: Color },
    /// Stroke an outline.
    Stroke { path: BezPath, width: f64, color: Color },
}

/// Renderer producing a flat list of [`DrawCommand`]s.
///
/// The list is rebuilt from scratch by every [`Renderer::build_scene`] call.
#[derive(Debug, Default)]
pub struct DisplayList {
    commands: Vec<DrawCommand>,
    size: Size,
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands of the last frame.
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Number of strokes in the last frame.
    pub fn stroke_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|cmd| matches!(cmd, DrawCommand::Stroke { .. }))
            .count()
    }

    /// Render the last frame as a standalone SVG document.
    pub fn to_svg(&self) -> RenderResult<String> {
        let mut svg = String::new();
        self.write_svg(&mut svg)
            .map_err(|e| RendererError::Export(e.to_string()))?;
        Ok(svg)
    }

    fn write_svg(&self, out: &mut String) -> std::fmt::Result {
        writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">"#,
            self.size.width, self.size.height, self.size.width, self.size.height
        )?;
        for cmd in &self.commands {
            match cmd {
                DrawCommand::Clear { .. } => {}
                DrawCommand::Fill { rect, color } => writeln!(
                    out,
                    r#"  <rect x="{}" y="{}" width="{}" height="{}" fill="{}"/>"#,
                    rect.x0,
                    rect.y0,
                    rect.width(),
                    rect.height(),
                    svg_color(*color)
                )?,
                DrawCommand::Stroke { path, width, color } => writeln!(
                    out,
                    r#"  <path d="{}" fill="none" stroke="{}" stroke-width="{}"/>"#,
                    path.to_svg(),
                    svg_color(*color),
                    width
                )?,
            }
        }
        writeln!(out, "</svg>")
    }
}

fn svg_color(color: Color) -> String {
    let rgba = color.to_rgba8();
    if rgba.a == 255 {
        format!("#{:02x}{:02x}{:02x}", rgba.r, rgba.g, rgba.b)
    } else {
        format!("rgba({},{},{},{:.3})", rgba.r, rgba.g, rgba.b, rgba.a as f64 / 255.0)
    }
}

impl Renderer for DisplayList {
    fn build_scene(&mut self, ctx: &RenderContext) {
        self.commands.clear();
        self.size = ctx.viewport_size;

        self.commands.push(DrawCommand::Clear { size: ctx.viewport_size });
        self.commands.push(DrawCommand::Fill {
            rect: Rect::from_origin_size(Point::ZERO, ctx.viewport_size),
            color: self.background_color(ctx),
        });

        for shape in ctx.paint_order() {
            self.commands.push(DrawCommand::Stroke {
                path: shape_path(shape),
                width: ctx.stroke_width,
                color: ctx.stroke_color,
            });
        }
    }
}
