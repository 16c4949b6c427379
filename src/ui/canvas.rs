//! Central canvas UI: the map area.

use super::colors;
use super::UiAction;
use eframe::egui::{self, PointerButton, Rect, RichText, Sense, Shape, Stroke, Vec2};
use geo_types::Coord;
use openmap::config::MapConfig;
use openmap::geo::{render_feature_layers, MapFeature, MapSurface, RenderedMap, POINT_RADIUS};
use openmap::state::Camera;

/// Zoom levels per scrolled pixel.
const ZOOM_PER_SCROLL: f64 = 1.0 / 200.0;
/// Degrees of bearing per pixel of secondary drag.
const BEARING_PER_PX: f64 = 0.3;
const PITCH_PER_PX: f64 = 0.2;
const MAX_PITCH: f64 = 60.0;
/// Click tolerance around a point feature.
const HIT_RADIUS: f32 = POINT_RADIUS + 6.0;

/// What the canvas needs besides the map itself.
pub struct CanvasView<'a> {
    pub config: &'a MapConfig,
    pub interactive_layers: &'a [String],
    pub selected: Option<&'a MapFeature>,
    pub has_selection: bool,
    pub orto: bool,
}

/// Draws the map and applies pan/zoom/rotate gestures to it.
///
/// Returns true if the camera was moved by the user this frame.
pub fn render_canvas(
    ctx: &egui::Context,
    map: &mut RenderedMap,
    view: &CanvasView<'_>,
    actions: &mut Vec<UiAction>,
) -> bool {
    let mut moved = false;

    egui::CentralPanel::default()
        .frame(egui::Frame::NONE)
        .show(ctx, |ui| {
            let available_size = ui.available_size();
            let (response, painter) =
                ui.allocate_painter(available_size, Sense::click_and_drag());
            let rect = response.rect;
            map.set_viewport(rect);

            let background = if view.orto {
                colors::map::BACKGROUND_ORTO
            } else {
                colors::map::BACKGROUND
            };
            painter.rect_filled(rect, 0.0, background);

            let projection = map.projection();
            let b = view.config.bounds;
            let outline = [
                Coord { x: b.min_lon, y: b.min_lat },
                Coord { x: b.max_lon, y: b.min_lat },
                Coord { x: b.max_lon, y: b.max_lat },
                Coord { x: b.min_lon, y: b.max_lat },
            ]
            .iter()
            .map(|c| projection.geo_to_screen(*c))
            .collect();
            painter.add(Shape::closed_line(
                outline,
                Stroke::new(1.5, colors::map::BOUNDS),
            ));

            render_feature_layers(&painter, map.layers(), &projection, view.selected);

            draw_overlay_info(ui, &rect, &map.camera(), view.orto);

            moved = handle_canvas_interaction(&response, &rect, map, view, actions);
        });

    moved
}

fn draw_overlay_info(ui: &mut egui::Ui, rect: &Rect, camera: &Camera, orto: bool) {
    let color = if orto {
        colors::map::OVERLAY_TEXT_ORTO
    } else {
        colors::map::OVERLAY_TEXT
    };

    let overlay_rect = Rect::from_min_size(rect.left_top() + Vec2::new(10.0, 10.0), Vec2::new(180.0, 60.0));
    ui.scope_builder(egui::UiBuilder::new().max_rect(overlay_rect), |ui| {
        ui.vertical(|ui| {
            for line in [
                format!("Zoom: {:.2}", camera.zoom),
                format!("{:.5}, {:.5}", camera.latitude, camera.longitude),
                format!("Bearing: {:.0}°", camera.bearing),
            ] {
                ui.label(RichText::new(line).monospace().size(12.0).color(color));
            }
        });
    });

    ui.painter().text(
        rect.right_bottom() - Vec2::new(6.0, 4.0),
        egui::Align2::RIGHT_BOTTOM,
        "© OpenStreetMap contributors",
        egui::FontId::proportional(10.0),
        color,
    );
}

fn normalize_bearing(bearing: f64) -> f64 {
    (bearing + 180.0).rem_euclid(360.0) - 180.0
}

fn handle_canvas_interaction(
    response: &egui::Response,
    rect: &Rect,
    map: &mut RenderedMap,
    view: &CanvasView<'_>,
    actions: &mut Vec<UiAction>,
) -> bool {
    let config = view.config;
    let mut camera = map.camera();
    let projection = map.projection();

    // Pan with the primary button
    if response.dragged_by(PointerButton::Primary) {
        let center = projection.panned_center(response.drag_delta());
        (camera.latitude, camera.longitude) = config.bounds.clamp(center.y, center.x);
    }

    // Rotate and tilt with the secondary button
    if response.dragged_by(PointerButton::Secondary) {
        let delta = response.drag_delta();
        camera.bearing = normalize_bearing(camera.bearing + delta.x as f64 * BEARING_PER_PX);
        camera.pitch = (camera.pitch - delta.y as f64 * PITCH_PER_PX).clamp(0.0, MAX_PITCH);
    }

    // Zoom around the cursor
    if response.hovered() {
        let (scroll, pinch) = response
            .ctx
            .input(|i| (i.raw_scroll_delta.y as f64, i.zoom_delta() as f64));
        let mut target_zoom = camera.zoom + scroll * ZOOM_PER_SCROLL;
        if pinch != 1.0 {
            target_zoom += pinch.log2();
        }
        if response.double_clicked() {
            target_zoom += 1.0;
        }
        let target_zoom = config.clamp_zoom(target_zoom);

        if target_zoom != camera.zoom {
            let anchor = response.hover_pos().unwrap_or_else(|| rect.center());
            let center = projection.zoomed_center(anchor, target_zoom);
            (camera.latitude, camera.longitude) = config.bounds.clamp(center.y, center.x);
            camera.zoom = target_zoom;
        }
    }

    let moved = camera != map.camera();
    if moved {
        map.set_camera(camera);
    }

    // Select what was clicked, or clear the selection on an empty click
    if response.clicked() {
        if let Some(pos) = response.interact_pointer_pos() {
            match map.query_at(pos, view.interactive_layers, HIT_RADIUS) {
                Some(feature) => actions.push(UiAction::SelectFeature(feature)),
                None if view.has_selection => actions.push(UiAction::Deselect),
                None => {}
            }
        }
    }

    moved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_bearing() {
        assert_eq!(normalize_bearing(0.0), 0.0);
        assert_eq!(normalize_bearing(190.0), -170.0);
        assert_eq!(normalize_bearing(-190.0), 170.0);
        assert_eq!(normalize_bearing(360.0), 0.0);
    }
}
