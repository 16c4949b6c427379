//! Map configuration: default view, map profiles, and the layer-code table.
//!
//! Everything here is plain data injected into the codecs and the resolver.
//! The defaults mirror the production map (Lithuania, zoom 7..18).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building configuration tables.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The same code maps to two layers.
    #[error("layer code '{0}' is used more than once")]
    DuplicateCode(char),
    /// The same layer is reachable from two codes.
    #[error("layer '{0}' is mapped by more than one code")]
    DuplicateLayer(String),
    /// Zoom range is empty or not finite.
    #[error("invalid zoom range {min}..{max}")]
    InvalidZoomRange { min: f64, max: f64 },
}

/// A single entry of the layer-code table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerCode {
    pub code: char,
    pub layer: String,
}

/// Closed, invertible mapping between one-character layer codes and
/// rendered layer names.
///
/// Every code maps to exactly one layer and every layer to exactly one code;
/// [`LayerTable::new`] refuses anything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LayerCode>", into = "Vec<LayerCode>")]
pub struct LayerTable {
    entries: Vec<LayerCode>,
}

impl LayerTable {
    pub fn new<I, S>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (char, S)>,
        S: Into<String>,
    {
        let mut table: Vec<LayerCode> = Vec::new();
        for (code, layer) in entries {
            let layer = layer.into();
            if table.iter().any(|e| e.code == code) {
                return Err(ConfigError::DuplicateCode(code));
            }
            if table.iter().any(|e| e.layer == layer) {
                return Err(ConfigError::DuplicateLayer(layer));
            }
            table.push(LayerCode { code, layer });
        }
        Ok(Self { entries: table })
    }

    /// Rendered layer name for a code.
    pub fn layer_for(&self, code: char) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.code == code)
            .map(|e| e.layer.as_str())
    }

    /// Code for a rendered layer name.
    pub fn code_for(&self, layer: &str) -> Option<char> {
        self.entries.iter().find(|e| e.layer == layer).map(|e| e.code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayerCode> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for LayerTable {
    fn default() -> Self {
        Self {
            entries: vec![
                LayerCode {
                    code: 'a',
                    layer: "label-address".to_string(),
                },
                LayerCode {
                    code: 'p',
                    layer: "label-amenity".to_string(),
                },
            ],
        }
    }
}

impl TryFrom<Vec<LayerCode>> for LayerTable {
    type Error = ConfigError;

    fn try_from(entries: Vec<LayerCode>) -> Result<Self, Self::Error> {
        Self::new(entries.into_iter().map(|e| (e.code, e.layer)))
    }
}

impl From<LayerTable> for Vec<LayerCode> {
    fn from(table: LayerTable) -> Self {
        table.entries
    }
}

/// A named visual style of a profile (base map or orthophoto).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapStyle {
    pub name: String,
    /// Style document URL.
    pub style: String,
}

impl MapStyle {
    fn new(name: &str, style: &str) -> Self {
        Self {
            name: name.to_string(),
            style: style.to_string(),
        }
    }
}

/// A named map configuration selectable from the URL by its code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapProfile {
    pub id: String,
    /// Short discriminator carried in URLs (`m`, `p`, ...).
    pub code: String,
    pub styles: Vec<MapStyle>,
    /// Layers whose features can be clicked and selected.
    #[serde(default)]
    pub interactive_layers: Vec<String>,
}

impl MapProfile {
    fn new(id: &str, code: &str, styles: Vec<MapStyle>, interactive: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            code: code.to_string(),
            styles,
            interactive_layers: interactive.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Human-readable label (name of the primary style).
    pub fn label(&self) -> &str {
        self.styles
            .first()
            .map(|s| s.name.as_str())
            .unwrap_or(self.id.as_str())
    }
}

/// Geographic bounds in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl Bounds {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    /// Clamps a position into the bounds, returning `(lat, lon)`.
    pub fn clamp(&self, lat: f64, lon: f64) -> (f64, f64) {
        (
            lat.clamp(self.min_lat, self.max_lat),
            lon.clamp(self.min_lon, self.max_lon),
        )
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }
}

/// Top-level map configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub default_profile: String,
    pub default_latitude: f64,
    pub default_longitude: f64,
    pub default_zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Camera center is kept inside these bounds.
    pub bounds: Bounds,
    /// Persisted-storage key for the last published view.
    pub storage_key: String,
    /// Base URL of the POI HTTP API.
    pub api_base: String,
    pub profiles: Vec<MapProfile>,
    pub layers: LayerTable,
}

impl Default for MapConfig {
    fn default() -> Self {
        let both = &["label-amenity", "label-address"];
        let orto = |style: &str| MapStyle::new("Orto", style);

        Self {
            default_profile: "m".to_string(),
            default_latitude: 55.19114,
            default_longitude: 23.871,
            default_zoom: 7.0,
            min_zoom: 7.0,
            max_zoom: 18.0,
            bounds: Bounds::new(20.7, 53.7, 27.05, 56.65),
            storage_key: "openmap_state".to_string(),
            api_base: String::new(),
            profiles: vec![
                MapProfile::new(
                    "general",
                    "m",
                    vec![
                        MapStyle::new("Bendras", "/styles/map.json"),
                        orto("/styles/hybrid.json"),
                    ],
                    both,
                ),
                MapProfile::new(
                    "speed",
                    "e",
                    vec![
                        MapStyle::new("Greičiai", "/styles/speed.json"),
                        orto("/styles/speed_hybrid.json"),
                    ],
                    &[],
                ),
                MapProfile::new(
                    "bicycle",
                    "b",
                    vec![
                        MapStyle::new("Dviračiai", "/styles/bicycle.json"),
                        orto("/styles/bicycle_hybrid.json"),
                    ],
                    &[],
                ),
                MapProfile::new(
                    "river",
                    "r",
                    vec![
                        MapStyle::new("Upės", "/styles/upes.json"),
                        orto("/styles/hybrid_upes.json"),
                    ],
                    &[],
                ),
                MapProfile::new(
                    "topo",
                    "t",
                    vec![
                        MapStyle::new("Topografinis", "/styles/topo.json"),
                        orto("/styles/hybrid.json"),
                    ],
                    both,
                ),
                MapProfile::new(
                    "craftbeer",
                    "c",
                    vec![MapStyle::new("Alus", "/styles/beer_dark.json")],
                    &["label-amenity"],
                ),
                MapProfile::new(
                    "places",
                    "p",
                    vec![
                        MapStyle::new("Lankytinos", "/styles/places.json"),
                        orto("/styles/hybrid.json"),
                    ],
                    &["label-amenity"],
                ),
                MapProfile::new(
                    "saugomos",
                    "s",
                    vec![
                        MapStyle::new("Saugomos", "/styles/saugomos.json"),
                        orto("/styles/hybrid.json"),
                    ],
                    &[],
                ),
            ],
            layers: LayerTable::default(),
        }
    }
}

impl MapConfig {
    /// Checks cross-field invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.min_zoom.is_finite() || !self.max_zoom.is_finite() || self.min_zoom > self.max_zoom
        {
            return Err(ConfigError::InvalidZoomRange {
                min: self.min_zoom,
                max: self.max_zoom,
            });
        }
        Ok(())
    }

    /// Looks up a profile by its URL code.
    pub fn profile(&self, code: &str) -> Option<&MapProfile> {
        self.profiles.iter().find(|p| p.code == code)
    }

    pub fn is_known_profile(&self, code: &str) -> bool {
        self.profile(code).is_some()
    }

    /// The default profile, or the first configured one if the default is
    /// missing from the table.
    pub fn fallback_profile(&self) -> Option<&MapProfile> {
        self.profile(&self.default_profile)
            .or_else(|| self.profiles.first())
    }

    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min_zoom, self.max_zoom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layer_table_is_invertible() {
        let table = LayerTable::default();
        for entry in table.iter() {
            assert_eq!(table.layer_for(entry.code), Some(entry.layer.as_str()));
            assert_eq!(table.code_for(&entry.layer), Some(entry.code));
        }
        assert_eq!(table.layer_for('p'), Some("label-amenity"));
        assert_eq!(table.code_for("label-address"), Some('a'));
        assert_eq!(table.layer_for('z'), None);
    }

    #[test]
    fn test_layer_table_rejects_duplicates() {
        assert_eq!(
            LayerTable::new([('a', "one"), ('a', "two")]),
            Err(ConfigError::DuplicateCode('a'))
        );
        assert_eq!(
            LayerTable::new([('a', "one"), ('b', "one")]),
            Err(ConfigError::DuplicateLayer("one".to_string()))
        );
    }

    #[test]
    fn test_layer_table_deserialize_validates() {
        let ok: LayerTable =
            serde_json::from_str(r#"[{"code":"x","layer":"label-x"}]"#).unwrap();
        assert_eq!(ok.layer_for('x'), Some("label-x"));

        let bad = serde_json::from_str::<LayerTable>(
            r#"[{"code":"x","layer":"l"},{"code":"x","layer":"m"}]"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_default_config() {
        let config = MapConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fallback_profile().map(|p| p.id.as_str()), Some("general"));
        assert!(config.is_known_profile("p"));
        assert!(!config.is_known_profile("x"));
        assert_eq!(config.clamp_zoom(3.0), 7.0);
        assert_eq!(config.clamp_zoom(22.0), 18.0);
        assert_eq!(config.clamp_zoom(12.5), 12.5);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: MapConfig = serde_json::from_str(r#"{"default_profile":"p"}"#).unwrap();
        assert_eq!(config.default_profile, "p");
        assert_eq!(config.max_zoom, 18.0);
        assert_eq!(config.layers, LayerTable::default());
    }

    #[test]
    fn test_invalid_zoom_range() {
        let config = MapConfig {
            min_zoom: 10.0,
            max_zoom: 5.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidZoomRange { .. })
        ));
    }

    #[test]
    fn test_bounds_clamp() {
        let bounds = MapConfig::default().bounds;
        assert!(bounds.contains(54.68, 25.28));
        assert_eq!(bounds.clamp(60.0, 10.0), (56.65, 20.7));
    }
}
