use eframe::egui::{self, Align2, Color32, Context, RichText, TextEdit, Ui, vec2};

use crate::session::{EditError, SessionState};
use crate::topology::{
    AttrValue, BANDWIDTH_KEY, ConnectionKind, DEFAULT_LINK_CAPACITY_MBPS, IS_ONLINE_KEY,
    LinkStatus, is_locked_key, is_required_key,
};
use crate::util::{format_mbps, format_percent};

use super::super::{EditorAction, EditorModel, StatusLine};

const ERROR_COLOR: Color32 = Color32::from_rgb(239, 68, 68);

enum FieldEdit {
    Update(String, AttrValue),
    Remove(String),
}

impl EditorModel {
    pub(in crate::app) fn draw_selection_windows(&mut self, ctx: &Context) -> Option<EditorAction> {
        match self.session.state() {
            SessionState::NodeSelected => self.draw_node_window(ctx),
            SessionState::EdgeSelected => self.draw_edge_window(ctx),
            SessionState::ConfirmingDelete => return self.draw_delete_confirmation(ctx),
            SessionState::Idle => self.field_buffers.owner = None,
        }
        None
    }

    fn sync_field_buffers(&mut self, owner: &str) {
        if !self.field_buffers.switch_to(owner) {
            return;
        }

        self.new_property_value.clear();
        self.edit_error = None;
    }

    fn draw_node_window(&mut self, ctx: &Context) {
        let Some(draft) = self.session.selected_node().cloned() else {
            return;
        };
        self.sync_field_buffers(&draft.id);

        let online = self
            .session
            .derived()
            .node(&draft.id)
            .is_none_or(|view| view.online);
        let neighbours = {
            let snapshot = self.session.snapshot();
            let mut neighbours = snapshot
                .incident_edges(&draft.id)
                .map(|edge| {
                    if edge.source == draft.id {
                        edge.target.clone()
                    } else {
                        edge.source.clone()
                    }
                })
                .collect::<Vec<_>>();
            neighbours.sort();
            neighbours.dedup();
            neighbours
                .into_iter()
                .map(|id| {
                    let label = snapshot.node(&id).map(|node| node.label().to_owned());
                    (id.clone(), label.unwrap_or(id))
                })
                .collect::<Vec<_>>()
        };

        let mut open = true;
        egui::Window::new(format!("Device · {}", draft.label()))
            .id(egui::Id::new("selection_window"))
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::RIGHT_TOP, vec2(-16.0, 16.0))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(format!("id {}", draft.id));
                    ui.separator();
                    let (text, color) = if online {
                        ("online", Color32::from_rgb(34, 197, 94))
                    } else {
                        ("offline", Color32::from_gray(150))
                    };
                    ui.colored_label(color, text);
                    if ui.button("Toggle online").clicked() {
                        self.toggle_selected_online(&draft.id);
                    }
                });
                ui.separator();

                let fields = draft
                    .attributes
                    .iter()
                    .map(|(name, value)| (name.to_owned(), value.clone()))
                    .collect::<Vec<_>>();
                self.draw_attribute_editor(ui, &fields);

                if !neighbours.is_empty() {
                    ui.separator();
                    ui.label(RichText::new("Connected to").strong());
                    for (id, label) in &neighbours {
                        ui.horizontal(|ui| {
                            ui.label(label.as_str());
                            if ui.small_button("Disconnect").clicked() {
                                let removed = self.session.disconnect(&draft.id, id);
                                self.status = Some(StatusLine::info(format!(
                                    "Removed {removed} connection(s) to {label}"
                                )));
                            }
                        });
                    }
                }

                ui.separator();
                ui.horizontal(|ui| {
                    if ui.button("Apply").clicked() {
                        let result = self.session.commit_node();
                        self.report(result);
                    }
                    if ui.button("Delete device").clicked() {
                        let result = self.session.delete_node(&draft.id);
                        self.report(result);
                    }
                    if ui.button("Cancel").clicked() {
                        self.session.dismiss();
                    }
                });
            });

        if !open {
            self.session.dismiss();
        }
    }

    fn draw_edge_window(&mut self, ctx: &Context) {
        let Some(draft) = self.session.selected_edge().cloned() else {
            return;
        };
        self.sync_field_buffers(&draft.id);

        let (status, utilization) = self
            .session
            .derived()
            .edge(&draft.id)
            .map_or((LinkStatus::Down, 0.0), |view| (view.status, view.utilization));
        let endpoint_label = |id: &str| {
            self.session
                .snapshot()
                .node(id)
                .map_or_else(|| id.to_owned(), |node| node.label().to_owned())
        };
        let route = format!(
            "{} → {}",
            endpoint_label(&draft.source),
            endpoint_label(&draft.target)
        );
        let capacity = draft
            .attributes
            .get(BANDWIDTH_KEY)
            .and_then(AttrValue::as_f64)
            .map_or_else(
                || format!("{} (default)", format_mbps(DEFAULT_LINK_CAPACITY_MBPS)),
                format_mbps,
            );

        let mut open = true;
        egui::Window::new(format!("Connection · {}", draft.label()))
            .id(egui::Id::new("selection_window"))
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::RIGHT_TOP, vec2(-16.0, 16.0))
            .show(ctx, |ui| {
                ui.label(route.as_str());
                ui.horizontal(|ui| {
                    ui.label(match status {
                        LinkStatus::Up => "link up",
                        LinkStatus::Down => "link down",
                    });
                    ui.separator();
                    ui.label(format!("utilization {}", format_percent(utilization)));
                    ui.separator();
                    ui.label(format!("capacity {capacity}"));
                });

                let mut kind = draft.kind.clone();
                egui::ComboBox::from_label("Connection type")
                    .selected_text(kind.to_string())
                    .show_ui(ui, |ui| {
                        for preset in ConnectionKind::PRESETS.iter() {
                            ui.selectable_value(&mut kind, preset.clone(), preset.as_str());
                        }
                        if let ConnectionKind::Other(_) = &draft.kind {
                            ui.selectable_value(
                                &mut kind,
                                draft.kind.clone(),
                                draft.kind.to_string(),
                            );
                        }
                    });
                if kind != draft.kind {
                    let result = self.session.set_connection_kind(kind);
                    self.report(result);
                }
                ui.separator();

                let fields = draft
                    .attributes
                    .iter()
                    .map(|(name, value)| (name.to_owned(), value.clone()))
                    .collect::<Vec<_>>();
                self.draw_attribute_editor(ui, &fields);

                ui.separator();
                ui.horizontal(|ui| {
                    if ui.button("Apply").clicked() {
                        let result = self.session.commit_edge();
                        self.report(result);
                    }
                    if ui.button("Delete connection").clicked() {
                        let result = self.session.delete_edge(&draft.id);
                        self.report(result);
                    }
                    if ui.button("Cancel").clicked() {
                        self.session.dismiss();
                    }
                });
            });

        if !open {
            self.session.dismiss();
        }
    }

    fn draw_attribute_editor(&mut self, ui: &mut Ui, fields: &[(String, AttrValue)]) {
        let mut edit = None;

        egui::Grid::new("attribute_grid")
            .num_columns(3)
            .striped(true)
            .show(ui, |ui| {
                for (name, value) in fields {
                    let locked = is_locked_key(name);
                    let removable = !locked && !is_required_key(name);

                    ui.label(name.as_str());
                    let buffer = self.field_buffers.buffer(name, value);
                    let response = ui
                        .add_enabled(!locked, TextEdit::singleline(buffer).desired_width(180.0))
                        .on_disabled_hover_text("read-only");
                    if response.changed() {
                        edit = Some(FieldEdit::Update(
                            name.clone(),
                            self.field_buffers.parsed(name),
                        ));
                    }
                    if ui
                        .add_enabled(removable, egui::Button::new("✕").small())
                        .on_hover_text("Remove property")
                        .clicked()
                    {
                        edit = Some(FieldEdit::Remove(name.clone()));
                    }
                    ui.end_row();
                }
            });

        match edit {
            Some(FieldEdit::Update(name, value)) => {
                let result = self.session.update_attribute(&name, value);
                self.report(result);
            }
            Some(FieldEdit::Remove(name)) => {
                self.field_buffers.forget(&name);
                let result = self.session.remove_attribute(&name);
                self.report(result);
            }
            None => {}
        }

        let mut add = false;
        ui.horizontal(|ui| {
            ui.add(
                TextEdit::singleline(&mut self.session.pending_property_name)
                    .hint_text("property")
                    .desired_width(110.0),
            );
            ui.add(
                TextEdit::singleline(&mut self.new_property_value)
                    .hint_text("value")
                    .desired_width(110.0),
            );
            add = ui.button("Add property").clicked();
        });
        if add {
            let name = self.session.pending_property_name.clone();
            let value = AttrValue::from(self.new_property_value.as_str());
            match self.session.add_attribute(&name, value) {
                Ok(()) => {
                    self.new_property_value.clear();
                    self.edit_error = None;
                }
                Err(error) => self.edit_error = Some(error.to_string()),
            }
        }

        if let Some(error) = &self.edit_error {
            ui.colored_label(ERROR_COLOR, error.as_str());
        }
    }

    fn toggle_selected_online(&mut self, id: &str) {
        match self.session.toggle_online(id) {
            Ok(online) => {
                self.field_buffers.forget(IS_ONLINE_KEY);
                tracing::debug!(node = id, online, "toggled device state");
            }
            Err(error) => self.edit_error = Some(error.to_string()),
        }
    }

    fn draw_delete_confirmation(&mut self, ctx: &Context) -> Option<EditorAction> {
        let mut action = None;

        egui::Window::new("Delete system")
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label(format!(
                    "Delete \"{}\" and all {} of its versions? This cannot be undone.",
                    self.coordinator.system_name(),
                    self.coordinator.latest()
                ));
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    let delete = ui.add_enabled(
                        !self.deleting,
                        egui::Button::new(RichText::new("Delete").color(ERROR_COLOR)),
                    );
                    if delete.clicked() {
                        action = Some(EditorAction::DeleteSystem);
                    }
                    if ui.button("Cancel").clicked() {
                        self.session.dismiss();
                    }
                    if self.deleting {
                        ui.spinner();
                    }
                });
            });

        action
    }

    /// Surfaces an edit failure inline; success clears the previous error.
    fn report<T>(&mut self, result: Result<T, EditError>) {
        match result {
            Ok(_) => self.edit_error = None,
            Err(error) => {
                tracing::debug!(%error, "edit rejected");
                self.edit_error = Some(error.to_string());
            }
        }
    }
}
