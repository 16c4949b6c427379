//! Centralized color constants for the UI.

use eframe::egui::Color32;

/// General UI colors for labels and values.
pub mod ui {
    use super::Color32;

    /// Muted gray for field labels.
    pub const LABEL: Color32 = Color32::from_rgb(100, 100, 100);
    /// Slightly brighter for values.
    pub const VALUE: Color32 = Color32::from_rgb(160, 160, 160);
    /// Emphasized color for active states.
    pub const ACTIVE: Color32 = Color32::from_rgb(100, 180, 255);
}

/// Map canvas colors.
pub mod map {
    use super::Color32;

    pub const BACKGROUND: Color32 = Color32::from_rgb(236, 232, 222);
    /// Background for orthophoto styles.
    pub const BACKGROUND_ORTO: Color32 = Color32::from_rgb(58, 66, 52);
    /// Outline of the navigable area.
    pub const BOUNDS: Color32 = Color32::from_rgb(150, 140, 120);
    pub const OVERLAY_TEXT: Color32 = Color32::from_rgb(60, 60, 70);
    pub const OVERLAY_TEXT_ORTO: Color32 = Color32::from_rgb(220, 220, 220);
}
