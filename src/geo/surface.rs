//! The rendered map surface: camera, viewport, style layers and their data.
//!
//! [`MapSurface`] is the narrow interface the selection logic and the shell
//! use; [`RenderedMap`] is the in-process implementation the canvas draws.

use super::layer::{FeatureLayer, MapFeature, SourceState};
use super::projection::MapProjection;
use crate::config::Bounds;
use crate::state::Camera;
use eframe::egui::{Pos2, Rect, Vec2};
use std::time::Duration;
use web_time::Instant;

/// Default duration of an animated camera move.
pub const FLY_DURATION: Duration = Duration::from_millis(800);

/// Operations the rest of the app needs from a rendered map.
pub trait MapSurface {
    /// Geographic extent currently on screen.
    fn rendered_bounds(&self) -> Bounds;

    /// True once the style (and therefore its layer list) is known.
    fn is_style_loaded(&self) -> bool;

    fn has_layer(&self, layer: &str) -> bool;

    /// True once the layer's source has delivered its data.
    fn is_source_loaded(&self, layer: &str) -> bool;

    /// Looks a feature up by id in a named layer.
    fn query_feature(&self, layer: &str, feature_id: u64) -> Option<MapFeature>;

    /// Nearest feature of `layers` within `radius_px` of a screen position.
    fn query_at(&self, pos: Pos2, layers: &[String], radius_px: f32) -> Option<MapFeature>;

    /// Animated move.
    fn fly_to(&mut self, camera: Camera);

    /// Immediate move.
    fn jump_to(&mut self, camera: Camera);
}

/// An in-flight animated camera move.
#[derive(Debug, Clone)]
pub struct CameraTransition {
    from: Camera,
    to: Camera,
    started: Instant,
    duration: Duration,
}

impl CameraTransition {
    pub fn new(from: Camera, to: Camera, started: Instant, duration: Duration) -> Self {
        Self {
            from,
            to,
            started,
            duration,
        }
    }

    pub fn target(&self) -> Camera {
        self.to
    }

    fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }

    pub fn sample(&self, now: Instant) -> Camera {
        self.sample_at(self.progress(now))
    }

    /// Camera at `progress` in `0.0..=1.0`, eased in and out.
    pub fn sample_at(&self, progress: f64) -> Camera {
        if progress >= 1.0 {
            return self.to;
        }
        let t = ease_in_out(progress.max(0.0));
        let lerp = |a: f64, b: f64| a + (b - a) * t;
        Camera {
            latitude: lerp(self.from.latitude, self.to.latitude),
            longitude: lerp(self.from.longitude, self.to.longitude),
            zoom: lerp(self.from.zoom, self.to.zoom),
            bearing: self.from.bearing + shortest_turn(self.from.bearing, self.to.bearing) * t,
            pitch: lerp(self.from.pitch, self.to.pitch),
        }
    }
}

fn ease_in_out(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// Signed angle from `from` to `to` in `-180..180` degrees.
fn shortest_turn(from: f64, to: f64) -> f64 {
    (to - from + 180.0).rem_euclid(360.0) - 180.0
}

/// The map as drawn by the canvas.
pub struct RenderedMap {
    camera: Camera,
    transition: Option<CameraTransition>,
    viewport: Rect,
    style_loaded: bool,
    layers: Vec<FeatureLayer>,
}

impl RenderedMap {
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            transition: None,
            viewport: Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0)),
            style_loaded: false,
            layers: Vec::new(),
        }
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    pub fn projection(&self) -> MapProjection {
        MapProjection::new(&self.camera, self.viewport)
    }

    pub fn set_viewport(&mut self, rect: Rect) {
        self.viewport = rect;
    }

    pub fn layers(&self) -> &[FeatureLayer] {
        &self.layers
    }

    /// Switches to a new style: the given layers are registered with their
    /// sources still loading; previous layers and features are dropped.
    pub fn load_style(&mut self, layers: &[String]) {
        self.layers = layers.iter().map(FeatureLayer::new).collect();
        self.style_loaded = true;
    }

    /// Marks every source as reloading. Features already delivered stay
    /// drawn until the new data arrives.
    pub fn refresh_sources(&mut self) {
        for layer in &mut self.layers {
            layer.state = SourceState::Loading;
        }
    }

    /// Delivers a source's data. Returns false if the layer is not part of
    /// the current style (a response that arrived after a style switch).
    pub fn set_source_data(&mut self, layer: &str, data: Result<Vec<MapFeature>, String>) -> bool {
        let Some(target) = self.layers.iter_mut().find(|l| l.name == layer) else {
            return false;
        };
        match data {
            Ok(features) => {
                log::info!("Loaded {} feature(s) into {}", features.len(), layer);
                target.features = features;
                target.state = SourceState::Loaded;
            }
            Err(e) => {
                log::error!("Failed to load source for {}: {}", layer, e);
                target.features.clear();
                target.state = SourceState::Failed;
            }
        }
        true
    }

    /// Moves the camera directly (user interaction); cancels any animation.
    pub fn set_camera(&mut self, camera: Camera) {
        self.transition = None;
        self.camera = camera;
    }

    pub fn is_animating(&self) -> bool {
        self.transition.is_some()
    }

    /// Advances an animated move. Returns true on the tick it completes.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(transition) = &self.transition else {
            return false;
        };
        self.camera = transition.sample(now);
        if transition.is_finished(now) {
            self.transition = None;
            return true;
        }
        false
    }
}

impl MapSurface for RenderedMap {
    fn rendered_bounds(&self) -> Bounds {
        self.projection().visible_bounds()
    }

    fn is_style_loaded(&self) -> bool {
        self.style_loaded
    }

    fn has_layer(&self, layer: &str) -> bool {
        self.layers.iter().any(|l| l.name == layer)
    }

    fn is_source_loaded(&self, layer: &str) -> bool {
        self.layers
            .iter()
            .any(|l| l.name == layer && l.state != SourceState::Loading)
    }

    fn query_feature(&self, layer: &str, feature_id: u64) -> Option<MapFeature> {
        self.layers
            .iter()
            .find(|l| l.name == layer)
            .and_then(|l| l.find(feature_id))
            .cloned()
    }

    fn query_at(&self, pos: Pos2, layers: &[String], radius_px: f32) -> Option<MapFeature> {
        let projection = self.projection();
        self.layers
            .iter()
            .filter(|l| l.is_loaded() && layers.contains(&l.name))
            .flat_map(|l| l.features.iter())
            .map(|f| (f, projection.geo_to_screen(f.position).distance(pos)))
            .filter(|(_, distance)| *distance <= radius_px)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(f, _)| f.clone())
    }

    fn fly_to(&mut self, camera: Camera) {
        if self.camera.same_at_precision(&camera) {
            self.jump_to(camera);
            return;
        }
        self.transition = Some(CameraTransition::new(
            self.camera,
            camera,
            Instant::now(),
            FLY_DURATION,
        ));
    }

    fn jump_to(&mut self, camera: Camera) {
        self.set_camera(camera);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::Coord;

    fn camera(lat: f64, lon: f64, zoom: f64, bearing: f64) -> Camera {
        Camera {
            latitude: lat,
            longitude: lon,
            zoom,
            bearing,
            pitch: 0.0,
        }
    }

    fn feature(id: u64, layer: &str, lon: f64, lat: f64) -> MapFeature {
        MapFeature {
            id,
            layer: layer.to_string(),
            position: Coord { x: lon, y: lat },
            properties: Default::default(),
        }
    }

    #[test]
    fn test_transition_endpoints() {
        let from = camera(54.0, 25.0, 10.0, 350.0);
        let to = camera(55.0, 24.0, 14.0, 10.0);
        let t = CameraTransition::new(from, to, Instant::now(), FLY_DURATION);

        assert_eq!(t.sample_at(0.0), from);
        assert_eq!(t.sample_at(1.0), to);

        let mid = t.sample_at(0.5);
        assert!((mid.zoom - 12.0).abs() < 1e-9);
        // Bearing turns the short way through north.
        assert!((mid.bearing - 360.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_duration_transition_is_finished() {
        let from = camera(54.0, 25.0, 10.0, 0.0);
        let t = CameraTransition::new(from, from, Instant::now(), Duration::ZERO);
        assert!(t.is_finished(Instant::now()));
    }

    #[test]
    fn test_shortest_turn() {
        assert_eq!(shortest_turn(350.0, 10.0), 20.0);
        assert_eq!(shortest_turn(10.0, 350.0), -20.0);
        assert_eq!(shortest_turn(0.0, 90.0), 90.0);
    }

    #[test]
    fn test_source_loading_states() {
        let mut map = RenderedMap::new(camera(54.68, 25.28, 12.0, 0.0));
        assert!(!map.is_style_loaded());
        assert!(!map.has_layer("label-amenity"));

        map.load_style(&["label-amenity".to_string()]);
        assert!(map.is_style_loaded());
        assert!(map.has_layer("label-amenity"));
        assert!(!map.is_source_loaded("label-amenity"));

        assert!(map.set_source_data("label-amenity", Ok(vec![feature(42, "label-amenity", 25.28, 54.68)])));
        assert!(map.is_source_loaded("label-amenity"));
        assert_eq!(map.query_feature("label-amenity", 42).map(|f| f.id), Some(42));
        assert_eq!(map.query_feature("label-amenity", 43), None);

        assert!(!map.set_source_data("label-address", Ok(Vec::new())));
    }

    #[test]
    fn test_refresh_keeps_features_until_reload() {
        let mut map = RenderedMap::new(camera(54.68, 25.28, 12.0, 0.0));
        map.load_style(&["label-amenity".to_string()]);
        map.set_source_data("label-amenity", Ok(vec![feature(42, "label-amenity", 25.28, 54.68)]));

        map.refresh_sources();
        assert!(!map.is_source_loaded("label-amenity"));
        assert_eq!(map.layers()[0].features.len(), 1);
    }

    #[test]
    fn test_failed_source_counts_as_loaded() {
        let mut map = RenderedMap::new(camera(54.68, 25.28, 12.0, 0.0));
        map.load_style(&["label-amenity".to_string()]);
        map.set_source_data("label-amenity", Err("HTTP 500".to_string()));
        assert!(map.is_source_loaded("label-amenity"));
        assert_eq!(map.query_feature("label-amenity", 42), None);
    }

    #[test]
    fn test_query_at_picks_nearest_within_radius() {
        let mut map = RenderedMap::new(camera(54.68, 25.28, 12.0, 0.0));
        let layers = vec!["label-amenity".to_string()];
        map.load_style(&layers);
        map.set_source_data(
            "label-amenity",
            Ok(vec![
                feature(1, "label-amenity", 25.28, 54.68),
                feature(2, "label-amenity", 25.2801, 54.68),
                feature(3, "label-amenity", 25.40, 54.70),
            ]),
        );

        let center = map.projection().screen_rect.center();
        assert_eq!(map.query_at(center, &layers, 10.0).map(|f| f.id), Some(1));

        let far = center + Vec2::new(300.0, 0.0);
        assert_eq!(map.query_at(far, &layers, 10.0), None);
        assert_eq!(map.query_at(center, &[], 10.0), None);
    }

    #[test]
    fn test_fly_and_tick() {
        let mut map = RenderedMap::new(camera(54.68, 25.28, 12.0, 0.0));
        let target = camera(55.0, 24.0, 14.0, 0.0);

        map.fly_to(target);
        assert!(map.is_animating());
        assert!(map.tick(Instant::now() + FLY_DURATION * 2));
        assert_eq!(map.camera(), target);
        assert!(!map.is_animating());
        assert!(!map.tick(Instant::now()));

        // Flying to where we already are is a jump.
        map.fly_to(target);
        assert!(!map.is_animating());
    }

    #[test]
    fn test_user_move_cancels_animation() {
        let mut map = RenderedMap::new(camera(54.68, 25.28, 12.0, 0.0));
        map.fly_to(camera(55.0, 24.0, 14.0, 0.0));
        let manual = camera(54.0, 25.0, 9.0, 0.0);
        map.set_camera(manual);
        assert!(!map.is_animating());
        assert_eq!(map.camera(), manual);
    }
}
