//! SketchRoom Render Library
//!
//! Renderer abstraction for SketchRoom rooms. Every frame is a full redraw
//! of the snapshot plus the in-progress preview. The headless
//! [`DisplayList`] records draw commands; the optional Vello backend builds
//! a GPU scene.

mod display_list;
mod renderer;

#[cfg(feature = "vello-renderer")]
mod vello_impl;

pub use display_list::{DisplayList, DrawCommand};
pub use renderer::{RenderContext, RenderResult, Renderer, RendererError, shape_path};

#[cfg(feature = "vello-renderer")]
pub use vello_impl::VelloRenderer;
