//! The map view-state record and the changes applied to it.

use super::url_state::to_fixed;
use serde::{Deserialize, Serialize};

/// Decimal places each camera field is serialized with.
pub const ZOOM_PRECISION: usize = 2;
pub const COORD_PRECISION: usize = 5;
pub const ANGLE_PRECISION: usize = 0;

/// Camera position and orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: f64,
    /// Rotation in degrees.
    pub bearing: f64,
    /// Tilt in degrees.
    pub pitch: f64,
}

impl Camera {
    /// True when both cameras serialize to the same text, i.e. they are
    /// equal at the precision URLs carry.
    pub fn same_at_precision(&self, other: &Camera) -> bool {
        let eq = |a: f64, b: f64, digits: usize| to_fixed(a, digits) == to_fixed(b, digits);
        eq(self.zoom, other.zoom, ZOOM_PRECISION)
            && eq(self.latitude, other.latitude, COORD_PRECISION)
            && eq(self.longitude, other.longitude, COORD_PRECISION)
            && eq(self.bearing, other.bearing, ANGLE_PRECISION)
            && eq(self.pitch, other.pitch, ANGLE_PRECISION)
    }
}

/// Serializable record of the camera plus the current selection.
///
/// Values are never edited in place by the resolver; every transition
/// builds a new record. Field names on the wire match the stored JSON the
/// web client has always written (`mapType`, `objectId`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapViewState {
    #[serde(rename = "mapType")]
    pub map_profile: String,
    pub zoom: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub bearing: f64,
    pub pitch: f64,
    #[serde(
        rename = "objectId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub selected_object_id: Option<String>,
}

impl MapViewState {
    pub fn camera(&self) -> Camera {
        Camera {
            latitude: self.latitude,
            longitude: self.longitude,
            zoom: self.zoom,
            bearing: self.bearing,
            pitch: self.pitch,
        }
    }

    pub fn with_camera(&self, camera: Camera) -> Self {
        Self {
            latitude: camera.latitude,
            longitude: camera.longitude,
            zoom: camera.zoom,
            bearing: camera.bearing,
            pitch: camera.pitch,
            ..self.clone()
        }
    }

    /// All five numeric fields are finite.
    pub fn is_finite(&self) -> bool {
        [
            self.zoom,
            self.latitude,
            self.longitude,
            self.bearing,
            self.pitch,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// A set of independently-changed fields to merge into the latest state.
///
/// Only the fields that actually changed are carried, so merging onto a
/// fresh base never clobbers a field another event updated meanwhile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewChange {
    pub camera: Option<Camera>,
    pub profile: Option<String>,
    /// `Some(None)` clears the selection.
    pub selection: Option<Option<String>>,
}

impl ViewChange {
    pub fn camera(camera: Camera) -> Self {
        Self {
            camera: Some(camera),
            ..Default::default()
        }
    }

    /// Switches profile. Unless a selection is also given, the selection is
    /// cleared since features of one profile do not exist in another.
    pub fn profile(code: impl Into<String>) -> Self {
        Self {
            profile: Some(code.into()),
            ..Default::default()
        }
    }

    pub fn select(token: Option<String>) -> Self {
        Self {
            selection: Some(token),
            ..Default::default()
        }
    }

    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = Some(camera);
        self
    }

    pub fn with_selection(mut self, token: Option<String>) -> Self {
        self.selection = Some(token);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.camera.is_none() && self.profile.is_none() && self.selection.is_none()
    }

    /// Builds a new state from `base` with this change applied.
    pub fn apply_to(&self, base: &MapViewState) -> MapViewState {
        let mut next = match self.camera {
            Some(camera) => base.with_camera(camera),
            None => base.clone(),
        };

        if let Some(profile) = &self.profile {
            if *profile != base.map_profile {
                next.selected_object_id = None;
            }
            next.map_profile = profile.clone();
        }

        if let Some(selection) = &self.selection {
            next.selected_object_id = selection.clone();
        }

        next
    }
}
