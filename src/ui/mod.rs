//! UI modules for the OpenMap application.
//!
//! The UI is split into distinct panels:
//! - Top bar: title, map profile and style switcher, current link
//! - Right panel: details of the selected place
//! - Central canvas: the map itself
//!
//! Panels never change app state directly; they report what the user did
//! as [`UiAction`]s and the app applies them.

mod canvas;
mod colors;
mod detail_panel;
mod top_bar;

pub use canvas::{render_canvas, CanvasView};
pub use detail_panel::render_detail_panel;
pub use top_bar::render_top_bar;

use openmap::geo::MapFeature;

/// Something the user asked for this frame.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    SelectProfile(String),
    SelectStyle(usize),
    SelectFeature(MapFeature),
    Deselect,
}
