//! Map projection and coordinate transformation.
//!
//! Handles converting between geographic coordinates (lat/lon) and
//! screen coordinates for rendering on the canvas, using web-map zoom
//! levels (512 px per world width at zoom 0) and a bearing rotation.

use crate::config::Bounds;
use crate::state::Camera;
use eframe::egui::{Pos2, Rect, Vec2};
use geo_types::Coord;

/// Width of the world in pixels at zoom 0.
const WORLD_SIZE: f64 = 512.0;

/// Map projection for converting geographic to screen coordinates.
#[derive(Debug, Clone)]
pub struct MapProjection {
    /// Geographic center of the view (lon = x, lat = y)
    pub center: Coord<f64>,
    /// Web-map zoom level
    pub zoom: f64,
    /// Rotation in degrees (clockwise, north = 0)
    pub bearing: f64,
    /// Screen rectangle for the canvas
    pub screen_rect: Rect,
}

impl MapProjection {
    pub fn new(camera: &Camera, screen_rect: Rect) -> Self {
        Self {
            center: Coord {
                x: camera.longitude,
                y: camera.latitude,
            },
            zoom: camera.zoom,
            bearing: camera.bearing,
            screen_rect,
        }
    }

    fn pixels_per_degree(&self) -> f64 {
        WORLD_SIZE * 2f64.powf(self.zoom) / 360.0
    }

    fn lat_correction(&self) -> f64 {
        self.center.y.to_radians().cos().max(0.01)
    }

    /// Converts geographic coordinates (lon, lat) to screen position.
    ///
    /// Equirectangular with a latitude correction, which is adequate at the
    /// city-to-country scales this map is limited to.
    pub fn geo_to_screen(&self, coord: Coord<f64>) -> Pos2 {
        let ppd = self.pixels_per_degree();
        let dx = (coord.x - self.center.x) * self.lat_correction() * ppd;
        let dy = -(coord.y - self.center.y) * ppd; // screen Y grows downward

        let (sin, cos) = (-self.bearing).to_radians().sin_cos();
        let rx = dx * cos - dy * sin;
        let ry = dx * sin + dy * cos;

        let center = self.screen_rect.center();
        Pos2::new(center.x + rx as f32, center.y + ry as f32)
    }

    /// Converts screen position to geographic coordinates (lon, lat).
    pub fn screen_to_geo(&self, pos: Pos2) -> Coord<f64> {
        let center = self.screen_rect.center();
        let rx = (pos.x - center.x) as f64;
        let ry = (pos.y - center.y) as f64;

        let (sin, cos) = self.bearing.to_radians().sin_cos();
        let dx = rx * cos - ry * sin;
        let dy = rx * sin + ry * cos;

        let ppd = self.pixels_per_degree();
        Coord {
            x: self.center.x + dx / (self.lat_correction() * ppd),
            y: self.center.y - dy / ppd,
        }
    }

    /// New center after dragging the map by `delta` screen pixels.
    pub fn panned_center(&self, delta: Vec2) -> Coord<f64> {
        self.screen_to_geo(self.screen_rect.center() - delta)
    }

    /// New center that keeps the point under `anchor` fixed while the zoom
    /// changes to `new_zoom`.
    pub fn zoomed_center(&self, anchor: Pos2, new_zoom: f64) -> Coord<f64> {
        let before = self.screen_to_geo(anchor);
        let zoomed = Self {
            zoom: new_zoom,
            ..self.clone()
        };
        let after = zoomed.screen_to_geo(anchor);
        Coord {
            x: self.center.x + (before.x - after.x),
            y: self.center.y + (before.y - after.y),
        }
    }

    /// Returns the visible geographic bounds.
    pub fn visible_bounds(&self) -> Bounds {
        let r = self.screen_rect;
        let corners = [
            r.left_top(),
            r.right_top(),
            r.left_bottom(),
            r.right_bottom(),
        ]
        .map(|p| self.screen_to_geo(p));

        let xs = corners.map(|c| c.x);
        let ys = corners.map(|c| c.y);
        let min = |v: [f64; 4]| v.iter().copied().fold(f64::INFINITY, f64::min);
        let max = |v: [f64; 4]| v.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Bounds::new(min(xs), min(ys), max(xs), max(ys))
    }

    /// Checks if a coordinate is on screen, with a pixel margin.
    pub fn is_visible(&self, coord: Coord<f64>, margin_px: f32) -> bool {
        self.screen_rect
            .expand(margin_px)
            .contains(self.geo_to_screen(coord))
    }
}
