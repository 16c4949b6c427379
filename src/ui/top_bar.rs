//! Top bar UI: app title, map profile and style selection, current link.

use super::colors;
use super::UiAction;
use eframe::egui::{self, Color32, RichText};
use egui_phosphor::regular as icons;
use openmap::config::MapConfig;
use openmap::state::MapViewState;

pub fn render_top_bar(
    ctx: &egui::Context,
    config: &MapConfig,
    current: &MapViewState,
    style_index: usize,
    link: &str,
    actions: &mut Vec<UiAction>,
) {
    egui::TopBottomPanel::top("top_bar")
        .exact_height(36.0)
        .show(ctx, |ui| {
            ui.horizontal_centered(|ui| {
                ui.label(
                    RichText::new(format!("{} OpenMap", icons::MAP_TRIFOLD))
                        .strong()
                        .size(16.0)
                        .color(Color32::WHITE),
                );

                ui.separator();

                let profile = config.profile(&current.map_profile);
                let selected = profile.map(|p| p.label()).unwrap_or("?");

                ui.label(RichText::new("Map:").size(12.0).color(Color32::GRAY));
                egui::ComboBox::from_id_salt("profile_selector")
                    .selected_text(selected)
                    .width(140.0)
                    .show_ui(ui, |ui| {
                        for p in &config.profiles {
                            let is_current = p.code == current.map_profile;
                            if ui.selectable_label(is_current, p.label()).clicked() && !is_current {
                                actions.push(UiAction::SelectProfile(p.code.clone()));
                            }
                        }
                    });

                // Base style vs orthophoto
                if let Some(profile) = profile.filter(|p| p.styles.len() > 1) {
                    for (index, style) in profile.styles.iter().enumerate() {
                        let is_current = index == style_index;
                        let text = RichText::new(&style.name).size(12.0);
                        let text = if is_current {
                            text.color(colors::ui::ACTIVE)
                        } else {
                            text
                        };
                        if ui.selectable_label(is_current, text).clicked() && !is_current {
                            actions.push(UiAction::SelectStyle(index));
                        }
                    }
                }

                ui.separator();

                ui.label(RichText::new(icons::LINK).color(colors::ui::LABEL));
                ui.label(
                    RichText::new(link)
                        .monospace()
                        .size(12.0)
                        .color(colors::ui::VALUE),
                );
                if ui
                    .small_button(icons::COPY)
                    .on_hover_text("Copy link")
                    .clicked()
                {
                    ctx.copy_text(link.to_string());
                }
            });
        });
}
