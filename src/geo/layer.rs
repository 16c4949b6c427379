//! Vector feature layers fed by the POI endpoints.

use geo_types::Coord;
use geojson::{feature::Id, Feature, GeoJson, Geometry, Value};
use serde_json::{Map, Value as JsonValue};

/// A renderable point of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct MapFeature {
    /// Numeric id, unique within its layer.
    pub id: u64,
    /// Rendered layer this feature belongs to.
    pub layer: String,
    /// Representative position (lon = x, lat = y).
    pub position: Coord<f64>,
    pub properties: Map<String, JsonValue>,
}

impl MapFeature {
    pub fn name(&self) -> Option<&str> {
        self.properties.get("name").and_then(|v| v.as_str())
    }
}

/// Load state of a layer's data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Loading,
    Loaded,
    Failed,
}

/// A named layer and the features its source delivered.
#[derive(Debug, Clone)]
pub struct FeatureLayer {
    pub name: String,
    pub state: SourceState,
    pub features: Vec<MapFeature>,
}

impl FeatureLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: SourceState::Loading,
            features: Vec::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.state == SourceState::Loaded
    }

    pub fn find(&self, feature_id: u64) -> Option<&MapFeature> {
        self.features.iter().find(|f| f.id == feature_id)
    }
}

/// Parses a GeoJSON document into features of `layer`.
///
/// Features without a numeric id or without a usable geometry are skipped.
/// The id is read from `properties.id` first, then from the feature id.
pub fn parse_features(layer: &str, geojson_str: &str) -> Result<Vec<MapFeature>, String> {
    let geojson: GeoJson = geojson_str
        .parse()
        .map_err(|e| format!("Failed to parse GeoJSON: {}", e))?;

    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => {
            return Err("Expected a feature or feature collection".to_string());
        }
    };

    Ok(features
        .iter()
        .filter_map(|f| convert_feature(layer, f))
        .collect())
}

fn convert_feature(layer: &str, feature: &Feature) -> Option<MapFeature> {
    let properties = feature.properties.clone().unwrap_or_default();
    let id = properties
        .get("id")
        .and_then(json_id)
        .or_else(|| match &feature.id {
            Some(Id::Number(n)) => n.as_u64(),
            Some(Id::String(s)) => s.parse().ok(),
            None => None,
        })?;

    let position = feature.geometry.as_ref().and_then(representative_point)?;

    Some(MapFeature {
        id,
        layer: layer.to_string(),
        position,
        properties,
    })
}

fn json_id(value: &JsonValue) -> Option<u64> {
    match value {
        JsonValue::Number(n) => n.as_u64(),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn coord(position: &[f64]) -> Option<Coord<f64>> {
    match position {
        [x, y, ..] => Some(Coord { x: *x, y: *y }),
        _ => None,
    }
}

/// A single point standing in for the geometry: the point itself, the
/// first of several points, or the vertex average of a line/outer ring.
fn representative_point(geometry: &Geometry) -> Option<Coord<f64>> {
    let average = |positions: &[Vec<f64>]| -> Option<Coord<f64>> {
        let coords: Vec<Coord<f64>> = positions.iter().filter_map(|p| coord(p)).collect();
        if coords.is_empty() {
            return None;
        }
        let n = coords.len() as f64;
        Some(Coord {
            x: coords.iter().map(|c| c.x).sum::<f64>() / n,
            y: coords.iter().map(|c| c.y).sum::<f64>() / n,
        })
    };

    match &geometry.value {
        Value::Point(p) => coord(p),
        Value::MultiPoint(points) => points.first().and_then(|p| coord(p)),
        Value::LineString(line) => average(line),
        Value::MultiLineString(lines) => lines.first().and_then(|l| average(l)),
        Value::Polygon(rings) => rings.first().and_then(|r| average(r)),
        Value::MultiPolygon(polygons) => polygons
            .first()
            .and_then(|rings| rings.first())
            .and_then(|r| average(r)),
        Value::GeometryCollection(geometries) => {
            geometries.iter().find_map(representative_point)
        }
    }
}
