use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use eframe::egui::{self, Context, Vec2};

use crate::session::{EditingSession, LoadError, VersionCoordinator, load_snapshot};
use crate::store::{PersistenceError, SaveRequest, SaveResponse, SystemSummary, TopologyBackend};
use crate::topology::{AttrValue, ConnectionKind, ID_KEY, SYSTEM_VERSION_KEY, Snapshot};

mod graph;
mod render_utils;
mod ui;

use ui::catalogue::{CatalogueAction, CatalogueModel};

pub struct TopologyApp {
    backend: Arc<dyn TopologyBackend>,
    state: AppState,
    jobs: JobQueue,
    load_request: u64,
}

enum AppState {
    Catalogue(Box<CatalogueModel>),
    Loading { system: String },
    Editor(Box<EditorModel>),
    Error(String),
}

/// Which system/version to open. `None` opens the latest version.
#[derive(Clone, Debug)]
pub struct OpenRequest {
    pub system: String,
    pub version: Option<u32>,
}

struct LoadedVersion {
    summary: SystemSummary,
    version: u32,
    snapshot: Snapshot,
}

enum JobOutcome {
    Systems(Result<Vec<SystemSummary>, PersistenceError>),
    Loaded {
        request: u64,
        result: Result<LoadedVersion, LoadError>,
    },
    Saved {
        system: String,
        base_version: u32,
        revision: u64,
        result: Result<SaveResponse, PersistenceError>,
    },
    Renamed(Result<(), PersistenceError>),
    Deleted {
        system: String,
        result: Result<(), PersistenceError>,
    },
}

struct JobQueue {
    tx: Sender<JobOutcome>,
    rx: Receiver<JobOutcome>,
}

/// Things the editor asks the app to run in the background.
enum EditorAction {
    BackToCatalogue,
    LoadVersion(u32),
    Save { request: SaveRequest, revision: u64 },
    DeleteSystem,
}

#[derive(Clone, Debug)]
struct StatusLine {
    text: String,
    is_error: bool,
}

impl StatusLine {
    fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// Presentation state around one open editing session.
struct EditorModel {
    coordinator: VersionCoordinator,
    session: EditingSession,
    pan: Vec2,
    zoom: f32,
    search: String,
    connect_kind: ConnectionKind,
    drag: Option<CanvasDrag>,
    field_buffers: FieldBuffers,
    new_property_value: String,
    edit_error: Option<String>,
    status: Option<StatusLine>,
    pending_version: Option<u32>,
    saving: bool,
    deleting: bool,
}

#[derive(Clone, Debug)]
enum CanvasDrag {
    Move { node: String },
    Connect { from: String },
    Pan,
}

/// Text being typed into the property editor, keyed by attribute name, for one entity.
#[derive(Default)]
struct FieldBuffers {
    owner: Option<String>,
    values: HashMap<String, String>,
    seeded: HashMap<String, AttrValue>,
}

impl FieldBuffers {
    /// Drops every buffer when the editor switches to another entity.
    fn switch_to(&mut self, owner: &str) -> bool {
        if self.owner.as_deref() == Some(owner) {
            return false;
        }
        self.owner = Some(owner.to_owned());
        self.values.clear();
        self.seeded.clear();
        true
    }

    /// Text buffer for `name`, seeded from `value` the first time the field is shown.
    fn buffer(&mut self, name: &str, value: &AttrValue) -> &mut String {
        self.seeded
            .entry(name.to_owned())
            .or_insert_with(|| value.clone());
        self.values
            .entry(name.to_owned())
            .or_insert_with(|| value.to_string())
    }

    /// Parses the buffer for `name` against the kind the field had when it was seeded.
    fn parsed(&self, name: &str) -> AttrValue {
        let input = self.values.get(name).map_or("", String::as_str);
        AttrValue::coerce_input(self.seeded.get(name), input)
    }

    fn forget(&mut self, name: &str) {
        self.values.remove(name);
        self.seeded.remove(name);
    }
}

impl TopologyApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        backend: Arc<dyn TopologyBackend>,
        open: Option<OpenRequest>,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        let mut app = Self {
            backend,
            state: AppState::Catalogue(Box::default()),
            jobs: JobQueue { tx, rx },
            load_request: 0,
        };

        match open {
            Some(request) => app.start_open(&cc.egui_ctx, request),
            None => app.refresh_systems(&cc.egui_ctx),
        }
        app
    }

    fn spawn_job<F>(&self, ctx: &Context, job: F)
    where
        F: FnOnce(&dyn TopologyBackend) -> JobOutcome + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let tx = self.jobs.tx.clone();
        let ctx = ctx.clone();

        thread::spawn(move || {
            let outcome = job(backend.as_ref());
            let _ = tx.send(outcome);
            ctx.request_repaint();
        });
    }

    fn refresh_systems(&mut self, ctx: &Context) {
        if let AppState::Catalogue(model) = &mut self.state {
            model.loading = true;
        }
        self.spawn_job(ctx, |backend| JobOutcome::Systems(backend.list_systems()));
    }

    /// Starts loading a version. Earlier loads are not cancelled; whichever finishes last wins.
    fn start_open(&mut self, ctx: &Context, open: OpenRequest) {
        self.load_request += 1;
        let request = self.load_request;

        match &mut self.state {
            AppState::Editor(editor) => editor.pending_version = open.version,
            state => {
                *state = AppState::Loading {
                    system: open.system.clone(),
                };
            }
        }

        tracing::debug!(request, system = %open.system, version = ?open.version, "starting load");
        self.spawn_job(ctx, move |backend| JobOutcome::Loaded {
            request,
            result: open_version(backend, &open),
        });
    }

    fn handle_outcome(&mut self, ctx: &Context, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Systems(result) => {
                if let AppState::Catalogue(model) = &mut self.state {
                    model.apply_systems(result);
                }
            }
            JobOutcome::Loaded { request, result } => self.apply_load(request, result),
            JobOutcome::Saved {
                system,
                base_version,
                revision,
                result,
            } => {
                let AppState::Editor(editor) = &mut self.state else {
                    tracing::debug!(%system, "save finished after the editor was closed");
                    return;
                };
                editor.apply_save(&system, base_version, revision, result);
            }
            JobOutcome::Renamed(result) => {
                if let Err(error) = result
                    && let AppState::Catalogue(model) = &mut self.state
                {
                    model.status = Some(StatusLine::error(error.to_string()));
                }
                self.refresh_systems(ctx);
            }
            JobOutcome::Deleted { system, result } => match result {
                Ok(()) => {
                    tracing::info!(%system, "system deleted");
                    self.state = AppState::Catalogue(Box::new(CatalogueModel::with_status(
                        StatusLine::info(format!("Deleted system {system}")),
                    )));
                    self.refresh_systems(ctx);
                }
                Err(error) => match &mut self.state {
                    AppState::Editor(editor) => {
                        editor.deleting = false;
                        editor.status = Some(StatusLine::error(error.to_string()));
                    }
                    AppState::Catalogue(model) => {
                        model.status = Some(StatusLine::error(error.to_string()));
                    }
                    _ => {}
                },
            },
        }
    }

    fn apply_load(&mut self, request: u64, result: Result<LoadedVersion, LoadError>) {
        if request != self.load_request {
            tracing::debug!(
                request,
                latest = self.load_request,
                "an older load finished after a newer one was started"
            );
        }

        match result {
            Ok(loaded) => {
                let coordinator = VersionCoordinator::new(
                    loaded.summary.id,
                    loaded.summary.name,
                    loaded.version,
                    loaded.summary.version,
                );
                let session = EditingSession::new(loaded.snapshot);
                let viewport = match &self.state {
                    AppState::Editor(editor)
                        if editor.coordinator.system_id() == coordinator.system_id() =>
                    {
                        Some((editor.pan, editor.zoom))
                    }
                    _ => None,
                };

                let mut editor = EditorModel::new(coordinator, session);
                if let Some((pan, zoom)) = viewport {
                    editor.pan = pan;
                    editor.zoom = zoom;
                }
                self.state = AppState::Editor(Box::new(editor));
            }
            Err(error) => {
                tracing::warn!(%error, "load failed");
                match &mut self.state {
                    AppState::Editor(editor) => {
                        editor.pending_version = None;
                        editor.status = Some(StatusLine::error(error.to_string()));
                    }
                    state => *state = AppState::Error(error.to_string()),
                }
            }
        }
    }

    fn run_editor_action(&mut self, ctx: &Context, action: EditorAction) {
        let AppState::Editor(editor) = &mut self.state else {
            return;
        };

        match action {
            EditorAction::BackToCatalogue => {
                self.state = AppState::Catalogue(Box::default());
                self.refresh_systems(ctx);
            }
            EditorAction::LoadVersion(version) => {
                let system = editor.coordinator.system_id().to_owned();
                self.start_open(
                    ctx,
                    OpenRequest {
                        system,
                        version: Some(version),
                    },
                );
            }
            EditorAction::Save { request, revision } => {
                editor.saving = true;
                let system = editor.coordinator.system_id().to_owned();
                let base_version = request.version;
                self.spawn_job(ctx, move |backend| JobOutcome::Saved {
                    result: backend.save_graph(&system, &request),
                    system,
                    base_version,
                    revision,
                });
            }
            EditorAction::DeleteSystem => {
                editor.deleting = true;
                let coordinator = editor.coordinator.clone();
                self.spawn_job(ctx, move |backend| JobOutcome::Deleted {
                    result: coordinator.delete(backend),
                    system: coordinator.system_id().to_owned(),
                });
            }
        }
    }

    fn run_catalogue_action(&mut self, ctx: &Context, action: CatalogueAction) {
        match action {
            CatalogueAction::Refresh => self.refresh_systems(ctx),
            CatalogueAction::Open(system) => self.start_open(
                ctx,
                OpenRequest {
                    system,
                    version: None,
                },
            ),
            CatalogueAction::Rename { system, name } => {
                self.spawn_job(ctx, move |backend| {
                    JobOutcome::Renamed(backend.rename_system(&system, &name))
                });
            }
            CatalogueAction::Delete(system) => {
                self.spawn_job(ctx, move |backend| JobOutcome::Deleted {
                    result: backend.delete_system(&system),
                    system,
                });
            }
        }
    }
}

fn open_version(
    backend: &dyn TopologyBackend,
    open: &OpenRequest,
) -> Result<LoadedVersion, LoadError> {
    let summary = backend
        .list_systems()?
        .into_iter()
        .find(|summary| summary.id == open.system)
        .ok_or_else(|| PersistenceError::UnknownSystem(open.system.clone()))?;

    let version = open.version.unwrap_or(summary.version);
    let snapshot = load_snapshot(backend, &summary.id, version)?;
    Ok(LoadedVersion {
        summary,
        version,
        snapshot,
    })
}

impl EditorModel {
    fn new(coordinator: VersionCoordinator, session: EditingSession) -> Self {
        Self {
            coordinator,
            session,
            pan: Vec2::ZERO,
            zoom: 1.0,
            search: String::new(),
            connect_kind: ConnectionKind::Network,
            drag: None,
            field_buffers: FieldBuffers::default(),
            new_property_value: String::new(),
            edit_error: None,
            status: None,
            pending_version: None,
            saving: false,
            deleting: false,
        }
    }

    fn apply_save(
        &mut self,
        system: &str,
        base_version: u32,
        revision: u64,
        result: Result<SaveResponse, PersistenceError>,
    ) {
        if self.coordinator.system_id() != system || self.coordinator.version() != base_version {
            tracing::warn!(
                system,
                base_version,
                "ignoring save result for a version that is no longer open"
            );
            return;
        }

        self.saving = false;
        self.status = Some(
            match self
                .coordinator
                .finish_save(result, &mut self.session, revision)
            {
                Ok(version) => {
                    self.field_buffers.forget(ID_KEY);
                    self.field_buffers.forget(SYSTEM_VERSION_KEY);
                    StatusLine::info(format!("Saved as version {version}"))
                }
                Err(error) => StatusLine::error(format!("Save failed: {error}")),
            },
        );
    }
}

impl eframe::App for TopologyApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        while let Ok(outcome) = self.jobs.rx.try_recv() {
            self.handle_outcome(ctx, outcome);
        }

        let mut editor_action = None;
        let mut catalogue_action = None;
        let mut retry = false;

        match &mut self.state {
            AppState::Catalogue(model) => {
                catalogue_action = model.show(ctx);
            }
            AppState::Loading { system } => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading(format!("Loading system {system}..."));
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Editor(editor) => {
                editor_action = editor.show(ctx);
            }
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load topology");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    if ui.button("Back to systems").clicked() {
                        retry = true;
                    }
                });
            }
        }

        if retry {
            self.state = AppState::Catalogue(Box::default());
            self.refresh_systems(ctx);
        }
        if let Some(action) = catalogue_action {
            self.run_catalogue_action(ctx, action);
        }
        if let Some(action) = editor_action {
            self.run_editor_action(ctx, action);
        }
    }
}
