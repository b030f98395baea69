//! Gesture capture: pointer input to shapes.

use crate::input::{MouseButton, PointerEvent};
use crate::shapes::{Circle, Pencil, Rectangle, Shape};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Available drawing tools, one per shape kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ToolKind {
    #[serde(rename = "rect")]
    Rectangle,
    #[default]
    #[serde(rename = "circle")]
    Circle,
    #[serde(rename = "pencil")]
    Pencil,
}

impl ToolKind {
    /// Name used on the wire and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            ToolKind::Rectangle => "rect",
            ToolKind::Circle => "circle",
            ToolKind::Pencil => "pencil",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rect" | "rectangle" => Ok(ToolKind::Rectangle),
            "circle" => Ok(ToolKind::Circle),
            "pencil" | "freehand" => Ok(ToolKind::Pencil),
            other => Err(format!("unknown tool: {other}")),
        }
    }
}

/// State of a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GestureState {
    /// No press in progress.
    #[default]
    Idle,
    /// A press is in progress.
    Pressed {
        /// Where the press started; for the pencil, the last committed sample.
        anchor: Point,
    },
}

/// What a pointer step produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureOutput {
    /// Nothing to draw or commit.
    None,
    /// A transient shape to draw on top; not part of the room.
    Preview(Shape),
    /// A finished shape to append and broadcast.
    Commit(Shape),
}

impl GestureOutput {
    /// The committed shape, if any.
    pub fn committed(self) -> Option<Shape> {
        match self {
            GestureOutput::Commit(shape) => Some(shape),
            _ => None,
        }
    }
}

/// Turns press/move/release sequences into shapes for the active tool.
#[derive(Debug, Clone, Default)]
pub struct GestureCapture {
    tool: ToolKind,
    state: GestureState,
}

impl GestureCapture {
    /// Create an idle gesture capture with the given tool.
    pub fn new(tool: ToolKind) -> Self {
        Self {
            tool,
            state: GestureState::Idle,
        }
    }

    /// Currently selected tool.
    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    /// Set the current tool. Any gesture in progress is dropped.
    pub fn set_tool(&mut self, tool: ToolKind) {
        self.tool = tool;
        self.state = GestureState::Idle;
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    /// Check if a press is in progress.
    pub fn is_pressed(&self) -> bool {
        matches!(self.state, GestureState::Pressed { .. })
    }

    /// Begin a gesture at `point`.
    pub fn press(&mut self, point: Point) {
        self.state = GestureState::Pressed { anchor: point };
    }

    /// Pointer moved to `point`.
    ///
    /// Rectangle and circle tools return a preview. The pencil commits a
    /// segment from the previous sample and advances the sample.
    pub fn move_to(&mut self, point: Point) -> GestureOutput {
        let GestureState::Pressed { anchor } = self.state else {
            return GestureOutput::None;
        };

        match self.tool {
            ToolKind::Pencil => {
                self.state = GestureState::Pressed { anchor: point };
                GestureOutput::Commit(Pencil::new(anchor, point).into())
            }
            tool => GestureOutput::Preview(shape_from_drag(tool, anchor, point)),
        }
    }

    /// End the gesture at `point`.
    ///
    /// Rectangle and circle tools commit the final shape, zero-sized or not.
    /// The pencil has already committed everything.
    pub fn release(&mut self, point: Point) -> GestureOutput {
        let GestureState::Pressed { anchor } = self.state else {
            return GestureOutput::None;
        };
        self.state = GestureState::Idle;

        match self.tool {
            ToolKind::Pencil => GestureOutput::None,
            tool => GestureOutput::Commit(shape_from_drag(tool, anchor, point)),
        }
    }

    /// Cancel the current gesture without committing.
    pub fn cancel(&mut self) {
        self.state = GestureState::Idle;
    }

    /// Process a pointer event. Only the left button draws.
    pub fn handle_pointer_event(&mut self, event: PointerEvent) -> GestureOutput {
        match event {
            PointerEvent::Down { position, button: MouseButton::Left } => {
                self.press(position);
                GestureOutput::None
            }
            PointerEvent::Up { position, button: MouseButton::Left } => self.release(position),
            PointerEvent::Move { position } => self.move_to(position),
            PointerEvent::Down { .. } | PointerEvent::Up { .. } => GestureOutput::None,
        }
    }
}

/// Shape spanned by a drag from `anchor` to `to`.
fn shape_from_drag(tool: ToolKind, anchor: Point, to: Point) -> Shape {
    match tool {
        ToolKind::Rectangle => Rectangle::from_drag(anchor, to).into(),
        ToolKind::Circle => Circle::from_drag(anchor, to).into(),
        ToolKind::Pencil => Pencil::new(anchor, to).into(),
    }
}
