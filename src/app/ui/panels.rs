use eframe::egui::{self, Align, Color32, Context, Layout, RichText, Sense, Stroke, Ui, vec2};

use crate::session::SessionState;
use crate::topology::{ConnectionKind, DeviceClass, HeatLevel, LinkStatus, edge_style, node_style};

use super::super::{EditorAction, EditorModel};

const HEAT_LEVELS: [(HeatLevel, &str); 4] = [
    (HeatLevel::Nominal, "below 40%"),
    (HeatLevel::Caution, "40% to 70%"),
    (HeatLevel::Warning, "70% to 90%"),
    (HeatLevel::Critical, "90% and above"),
];

impl EditorModel {
    pub(in crate::app) fn show(&mut self, ctx: &Context) -> Option<EditorAction> {
        self.handle_shortcuts(ctx);
        let mut action = None;

        egui::TopBottomPanel::top("editor_top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading(self.coordinator.system_name());
                    ui.label(format!(
                        "v{} of {}",
                        self.coordinator.version(),
                        self.coordinator.latest()
                    ));
                    if self.session.is_dirty() {
                        ui.label(RichText::new("● unsaved").color(Color32::from_rgb(245, 206, 93)));
                    }
                    if self.pending_version.is_some() || self.saving || self.deleting {
                        ui.spinner();
                    }

                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        let snapshot = self.session.snapshot();
                        ui.label(format!(
                            "{} devices | {} connections",
                            snapshot.nodes.len(),
                            snapshot.edges.len()
                        ));
                        if let Some(status) = &self.status {
                            ui.separator();
                            let color = if status.is_error {
                                Color32::from_rgb(239, 68, 68)
                            } else {
                                ui.visuals().weak_text_color()
                            };
                            ui.colored_label(color, status.text.as_str());
                        }
                    });
                });
            });

        egui::SidePanel::left("editor_controls")
            .resizable(true)
            .default_width(260.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .id_salt("editor_controls_scroll")
                    .show(ui, |ui| {
                        if let Some(requested) = self.draw_controls(ui) {
                            action = Some(requested);
                        }
                    });
            });

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.draw_canvas(ui));

        if let Some(requested) = self.draw_selection_windows(ctx) {
            action = Some(requested);
        }
        action
    }

    fn draw_controls(&mut self, ui: &mut Ui) -> Option<EditorAction> {
        let mut action = None;

        ui.horizontal(|ui| {
            if ui.button("← Systems").clicked() {
                action = Some(EditorAction::BackToCatalogue);
            }

            let can_save = self.coordinator.can_save() && !self.saving;
            let save = ui
                .add_enabled(can_save, egui::Button::new("Save"))
                .on_disabled_hover_text("Only the latest version can be saved");
            if save.clicked() {
                action = Some(EditorAction::Save {
                    request: self.coordinator.save_request(&self.session),
                    revision: self.session.revision(),
                });
            }
        });
        ui.separator();

        ui.heading("Topology");
        ui.horizontal(|ui| {
            if ui.button("Add device").clicked() {
                let id = self.session.add_device(self.coordinator.version());
                if let Err(error) = self.session.select_node(&id) {
                    self.edit_error = Some(error.to_string());
                }
            }
            if ui.button("Auto layout").clicked() {
                self.session.auto_layout();
            }
        });

        let mut heat_mode = self.session.heat_mode();
        if ui
            .checkbox(&mut heat_mode, "Heat map")
            .on_hover_text("Color links by utilization")
            .changed()
        {
            self.session.toggle_heat_mode();
        }

        egui::ComboBox::from_label("New connections")
            .selected_text(self.connect_kind.to_string())
            .show_ui(ui, |ui| {
                for kind in ConnectionKind::PRESETS.iter() {
                    ui.selectable_value(&mut self.connect_kind, kind.clone(), kind.as_str());
                }
            });
        ui.label(
            RichText::new("Shift-drag from one device to another to connect them.")
                .small()
                .weak(),
        );

        ui.add_space(6.0);
        ui.add(
            egui::TextEdit::singleline(&mut self.search)
                .hint_text("Find device")
                .desired_width(f32::INFINITY),
        );
        ui.separator();

        ui.heading("Versions");
        let shown = self.pending_version.unwrap_or(self.coordinator.version());
        let mut chosen = shown;
        for version in self.coordinator.versions().rev() {
            let text = if version == self.coordinator.latest() {
                format!("v{version} (latest)")
            } else {
                format!("v{version}")
            };
            ui.selectable_value(&mut chosen, version, text);
        }
        if chosen != shown {
            action = Some(EditorAction::LoadVersion(chosen));
        }
        if !self.coordinator.can_save() {
            ui.label(RichText::new("Older versions are read-only.").small().weak());
        }
        ui.separator();

        ui.collapsing("Legend", |ui| self.draw_legend(ui));
        ui.separator();

        let delete = ui.add_enabled(
            !self.deleting && self.session.state() != SessionState::ConfirmingDelete,
            egui::Button::new(RichText::new("Delete system").color(Color32::from_rgb(239, 68, 68))),
        );
        if delete.clicked() {
            self.session.request_delete();
        }

        action
    }

    fn draw_legend(&self, ui: &mut Ui) {
        ui.label(RichText::new("Devices").strong());
        for (class, online) in [
            (DeviceClass::Switch, true),
            (DeviceClass::Host, true),
            (DeviceClass::Other("other".to_owned()), true),
            (DeviceClass::Host, false),
        ] {
            let style = node_style(&class, online);
            let text = if online {
                class.as_str().to_owned()
            } else {
                "offline".to_owned()
            };
            legend_swatch(ui, style.fill.gamma_multiply(style.opacity), &text);
        }

        ui.add_space(4.0);
        ui.label(RichText::new("Connections").strong());
        if self.session.heat_mode() {
            for (level, text) in HEAT_LEVELS {
                legend_swatch(ui, level.color(), text);
            }
            return;
        }

        for kind in ConnectionKind::PRESETS.iter() {
            let style = edge_style(kind, LinkStatus::Up, HeatLevel::Nominal, false);
            let mut text = kind.as_str().to_owned();
            if style.dashed {
                text.push_str(" (dashed)");
            }
            if style.pulse {
                text.push_str(" (pulse)");
            }
            legend_swatch(ui, style.color, &text);
        }
    }
}

fn legend_swatch(ui: &mut Ui, color: Color32, text: &str) {
    ui.horizontal(|ui| {
        let (rect, _) = ui.allocate_exact_size(vec2(14.0, 10.0), Sense::hover());
        ui.painter().rect_filled(rect, 2.0, color);
        ui.painter().rect_stroke(
            rect,
            2.0,
            Stroke::new(1.0, Color32::from_gray(60)),
            egui::StrokeKind::Inside,
        );
        ui.label(text);
    });
}
