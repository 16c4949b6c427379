//! Right panel UI: details of the selected place.

use super::colors;
use super::UiAction;
use eframe::egui::{self, RichText, ScrollArea};
use egui_phosphor::regular as icons;
use openmap::poi::PoiDetails;
use openmap::state::SelectionState;

pub fn render_detail_panel(
    ctx: &egui::Context,
    selection: &SelectionState,
    actions: &mut Vec<UiAction>,
) {
    if *selection == SelectionState::Empty {
        return;
    }

    egui::SidePanel::right("detail_panel")
        .resizable(true)
        .default_width(260.0)
        .min_width(200.0)
        .max_width(400.0)
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Place");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button(icons::X).on_hover_text("Close").clicked() {
                        actions.push(UiAction::Deselect);
                    }
                });
            });
            ui.separator();

            match selection {
                SelectionState::Empty => {}
                SelectionState::Resolving { token, .. } => {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label(
                            RichText::new(format!("Looking up {}", token))
                                .size(12.0)
                                .color(colors::ui::LABEL),
                        );
                    });
                }
                SelectionState::Shown { feature, .. } => {
                    let details = PoiDetails::from_properties(&feature.properties);
                    ScrollArea::vertical().show(ui, |ui| render_details(ui, &details));
                }
            }
        });
}

fn row(ui: &mut egui::Ui, icon: &str, value: &str) {
    ui.horizontal_wrapped(|ui| {
        ui.label(RichText::new(icon).color(colors::ui::LABEL));
        ui.label(value);
    });
}

fn link_row(ui: &mut egui::Ui, icon: &str, label: &str, url: &str) {
    ui.horizontal_wrapped(|ui| {
        ui.label(RichText::new(icon).color(colors::ui::LABEL));
        ui.hyperlink_to(label, url);
    });
}

fn render_details(ui: &mut egui::Ui, details: &PoiDetails) {
    if let Some(title) = details.title() {
        ui.label(RichText::new(title).strong().size(16.0));
        ui.add_space(4.0);
    }

    if let Some(name) = &details.official_name {
        ui.label(RichText::new(format!("Oficialus pavadinimas: {}", name)).size(12.0));
    }
    if let Some(name) = &details.alt_name {
        ui.label(RichText::new(format!("Kiti pavadinimai: {}", name)).size(12.0));
    }
    if let Some(address) = &details.address {
        row(ui, icons::MAP_PIN, address);
    }

    if let Some((first, rest)) = details.opening_hours.split_first() {
        row(ui, icons::CLOCK, first);
        for rule in rest {
            ui.label(RichText::new(rule).size(12.0)).on_hover_text("Darbo laikas");
        }
    }

    if let Some(email) = &details.email {
        link_row(ui, icons::ENVELOPE, email, &format!("mailto:{}", email));
    }
    if let Some(phone) = &details.phone {
        link_row(ui, icons::PHONE, phone, &format!("tel:{}", phone));
    }
    if let Some(website) = &details.website {
        link_row(ui, icons::GLOBE, website, website);
    }
    if let Some(link) = &details.heritage {
        link_row(ui, icons::BANK, &link.label, &link.url);
    }
    if let Some(link) = &details.wikipedia {
        link_row(ui, icons::BOOK_OPEN, &link.label, &link.url);
    }
    if let Some(height) = &details.height {
        row(ui, icons::RULER, height);
    }
    if let Some(fee) = details.fee {
        row(ui, icons::COINS, if fee { "Mokestis: Yra" } else { "Mokestis: Nėra" });
    }
    if let Some(image) = &details.image {
        link_row(ui, icons::IMAGE, "Nuotrauka", image);
    }

    if let Some(osm) = &details.osm {
        ui.add_space(6.0);
        ui.horizontal(|ui| {
            ui.label(RichText::new(icons::DATABASE).color(colors::ui::LABEL));
            ui.hyperlink_to("OSM", &osm.view);
            ui.label(RichText::new(icons::PENCIL_SIMPLE).color(colors::ui::LABEL));
            ui.hyperlink_to("Edit", &osm.edit);
        });
    }
}
