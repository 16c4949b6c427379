//! Map surface, feature layers and projection.
//!
//! This module holds everything that knows about what is drawn on the
//! map: the layers of the active style, the features their sources
//! delivered, the camera and how geographic positions land on screen.

mod layer;
mod projection;
mod renderer;
mod surface;

pub use layer::{parse_features, FeatureLayer, MapFeature, SourceState};
pub use projection::MapProjection;
pub use renderer::{render_feature_layers, POINT_RADIUS};
pub use surface::{CameraTransition, MapSurface, RenderedMap, FLY_DURATION};
