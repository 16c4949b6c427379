//! Feature layer rendering.
//!
//! Renders point features to the egui canvas, with the selected feature
//! highlighted on top.

use super::{FeatureLayer, MapFeature, MapProjection};
use eframe::egui::{Align2, Color32, FontId, Painter, Pos2, Stroke};

/// Fill colors cycled across the layers of a style.
const LAYER_COLORS: [Color32; 4] = [
    Color32::from_rgb(230, 120, 60),
    Color32::from_rgb(70, 140, 220),
    Color32::from_rgb(90, 170, 90),
    Color32::from_rgb(170, 100, 200),
];

const OUTLINE: Color32 = Color32::from_rgb(40, 40, 40);
const HIGHLIGHT: Color32 = Color32::from_rgb(255, 220, 60);
const LABEL: Color32 = Color32::from_rgb(30, 30, 30);

/// Labels are drawn from this zoom level up.
const LABEL_MIN_ZOOM: f64 = 14.0;

pub const POINT_RADIUS: f32 = 4.0;

/// Renders every layer (back to front), then the selection.
pub fn render_feature_layers(
    painter: &Painter,
    layers: &[FeatureLayer],
    projection: &MapProjection,
    selected: Option<&MapFeature>,
) {
    for (index, layer) in layers.iter().enumerate() {
        let color = LAYER_COLORS[index % LAYER_COLORS.len()];
        render_layer(painter, layer, projection, color);
    }

    if let Some(feature) = selected {
        render_selection(painter, feature, projection);
    }
}

fn render_layer(painter: &Painter, layer: &FeatureLayer, projection: &MapProjection, color: Color32) {
    let show_labels = projection.zoom >= LABEL_MIN_ZOOM;

    for feature in &layer.features {
        if !projection.is_visible(feature.position, POINT_RADIUS) {
            continue;
        }
        let pos = projection.geo_to_screen(feature.position);
        painter.circle(pos, POINT_RADIUS, color, Stroke::new(1.0, OUTLINE));

        if show_labels {
            if let Some(name) = feature.name() {
                draw_label(painter, pos, name);
            }
        }
    }
}

fn render_selection(painter: &Painter, feature: &MapFeature, projection: &MapProjection) {
    let pos = projection.geo_to_screen(feature.position);
    painter.circle_stroke(pos, POINT_RADIUS + 5.0, Stroke::new(3.0, HIGHLIGHT));
    painter.circle_filled(pos, POINT_RADIUS + 1.0, HIGHLIGHT);
    if let Some(name) = feature.name() {
        draw_label(painter, pos, name);
    }
}

fn draw_label(painter: &Painter, pos: Pos2, text: &str) {
    painter.text(
        Pos2::new(pos.x + POINT_RADIUS + 3.0, pos.y - POINT_RADIUS),
        Align2::LEFT_BOTTOM,
        text,
        FontId::proportional(11.0),
        LABEL,
    );
}
