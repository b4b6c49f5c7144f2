use eframe::egui::{self, Align, Color32, Context, Layout, RichText};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::store::{PersistenceError, SystemSummary};

use super::super::StatusLine;

pub(in crate::app) enum CatalogueAction {
    Refresh,
    Open(String),
    Rename { system: String, name: String },
    Delete(String),
}

#[derive(Default)]
pub(in crate::app) struct CatalogueModel {
    systems: Vec<SystemSummary>,
    search: String,
    renaming: Option<(String, String)>,
    confirm_delete: Option<String>,
    pub(in crate::app) loading: bool,
    pub(in crate::app) status: Option<StatusLine>,
}

/// Systems whose name or id fuzzy-matches `query`, best match first.
/// An empty query keeps the catalogue order.
pub(in crate::app) fn filter_systems<'a>(
    systems: &'a [SystemSummary],
    query: &str,
) -> Vec<&'a SystemSummary> {
    let query = query.trim();
    if query.is_empty() {
        return systems.iter().collect();
    }

    let matcher = SkimMatcherV2::default().ignore_case();
    let mut scored = systems
        .iter()
        .filter_map(|system| {
            let by_name = matcher.fuzzy_match(&system.name, query);
            let by_id = matcher.fuzzy_match(&system.id, query);
            by_name.max(by_id).map(|score| (score, system))
        })
        .collect::<Vec<_>>();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.name.cmp(&b.1.name)));
    scored.into_iter().map(|(_, system)| system).collect()
}

impl CatalogueModel {
    pub(in crate::app) fn with_status(status: StatusLine) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub(in crate::app) fn apply_systems(&mut self, result: Result<Vec<SystemSummary>, PersistenceError>) {
        self.loading = false;
        match result {
            Ok(systems) => {
                tracing::debug!(count = systems.len(), "listed systems");
                self.systems = systems;
            }
            Err(error) => {
                tracing::warn!(%error, "failed to list systems");
                self.status = Some(StatusLine::error(error.to_string()));
            }
        }
    }

    pub(in crate::app) fn show(&mut self, ctx: &Context) -> Option<CatalogueAction> {
        let mut action = None;

        egui::TopBottomPanel::top("catalogue_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("Systems");
                    ui.separator();
                    ui.label("Search");
                    ui.text_edit_singleline(&mut self.search)
                        .on_hover_text("Fuzzy match on system name or id.");
                    if ui
                        .add_enabled(!self.loading, egui::Button::new("Refresh"))
                        .clicked()
                    {
                        action = Some(CatalogueAction::Refresh);
                    }
                    if self.loading {
                        ui.spinner();
                    }
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        if let Some(status) = &self.status {
                            let color = if status.is_error {
                                Color32::from_rgb(239, 68, 68)
                            } else {
                                Color32::from_gray(200)
                            };
                            ui.colored_label(color, status.text.as_str());
                        }
                    });
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            let visible = filter_systems(&self.systems, &self.search)
                .into_iter()
                .cloned()
                .collect::<Vec<_>>();

            if visible.is_empty() {
                ui.add_space(40.0);
                ui.vertical_centered(|ui| {
                    if self.systems.is_empty() {
                        ui.label("No systems in the store yet. Start with --seed-demo to create one.");
                    } else {
                        ui.label("No system matches the search.");
                    }
                });
                return;
            }

            egui::ScrollArea::vertical()
                .id_salt("systems_scroll")
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    egui::Grid::new("systems_grid")
                        .num_columns(4)
                        .striped(true)
                        .spacing([16.0, 8.0])
                        .show(ui, |ui| {
                            ui.label(RichText::new("Name").strong());
                            ui.label(RichText::new("Version").strong());
                            ui.label(RichText::new("Size").strong());
                            ui.label("");
                            ui.end_row();

                            for system in &visible {
                                if let Some(row_action) = self.system_row(ui, system) {
                                    action = Some(row_action);
                                }
                                ui.end_row();
                            }
                        });
                });
        });

        action
    }

    fn system_row(&mut self, ui: &mut egui::Ui, system: &SystemSummary) -> Option<CatalogueAction> {
        let mut action = None;

        let renaming_this = self
            .renaming
            .as_ref()
            .is_some_and(|(id, _)| *id == system.id);
        if renaming_this {
            if let Some((_, buffer)) = &mut self.renaming {
                ui.text_edit_singleline(buffer);
            }
        } else {
            ui.label(RichText::new(&system.name).strong())
                .on_hover_text(format!("id {}", system.id));
        }

        ui.label(format!("v{}", system.version));
        ui.label(format!(
            "{} devices, {} connections",
            system.node_count, system.edge_count
        ));

        ui.horizontal(|ui| {
            if renaming_this {
                if ui.button("Save name").clicked()
                    && let Some((id, name)) = self.renaming.take()
                {
                    action = Some(CatalogueAction::Rename { system: id, name });
                }
                if ui.button("Cancel").clicked() {
                    self.renaming = None;
                }
                return;
            }

            if self.confirm_delete.as_deref() == Some(system.id.as_str()) {
                ui.label("Delete every version?");
                if ui.button("Delete").clicked() {
                    self.confirm_delete = None;
                    action = Some(CatalogueAction::Delete(system.id.clone()));
                }
                if ui.button("Keep").clicked() {
                    self.confirm_delete = None;
                }
                return;
            }

            if ui.button("Open").clicked() {
                action = Some(CatalogueAction::Open(system.id.clone()));
            }
            if ui.button("Rename").clicked() {
                self.renaming = Some((system.id.clone(), system.name.clone()));
            }
            if ui.button("Delete").clicked() {
                self.confirm_delete = Some(system.id.clone());
            }
        });

        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system(id: &str, name: &str) -> SystemSummary {
        SystemSummary {
            id: id.to_owned(),
            name: name.to_owned(),
            version: 1,
            node_count: 0,
            edge_count: 0,
        }
    }

    #[test]
    fn empty_query_keeps_order() {
        let systems = vec![system("1", "Plant"), system("2", "Office")];
        let names = filter_systems(&systems, "  ")
            .into_iter()
            .map(|system| system.name.as_str())
            .collect::<Vec<_>>();

        assert_eq!(names, vec!["Plant", "Office"]);
    }

    #[test]
    fn fuzzy_query_matches_name_case_insensitively() {
        let systems = vec![
            system("1", "Demo lab"),
            system("2", "Office network"),
            system("3", "Plant floor"),
        ];

        let names = filter_systems(&systems, "OFNET")
            .into_iter()
            .map(|system| system.name.as_str())
            .collect::<Vec<_>>();

        assert_eq!(names, vec!["Office network"]);
    }
}
