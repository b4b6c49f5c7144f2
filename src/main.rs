mod app;
mod layout;
mod session;
mod store;
mod topology;
mod util;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::store::{JsonStore, TopologyBackend};

#[derive(Debug, Parser)]
#[command(author, about)]
struct Args {
    /// Directory holding one sub-directory per system.
    #[arg(long, env = "TOPOLOGY_STORE_DIR", default_value = "./systems")]
    store_dir: PathBuf,

    /// Open this system directly instead of the system list.
    #[arg(long)]
    system: Option<String>,

    /// Version to open together with `--system`; defaults to the latest.
    #[arg(long = "version", requires = "system")]
    open_version: Option<u32>,

    /// Create a small demo system when the store is empty.
    #[arg(long)]
    seed_demo: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("topology_modeler=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_filter(filter))
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing();

    let store = JsonStore::open(&args.store_dir)
        .with_context(|| format!("failed to open store at {}", args.store_dir.display()))?;
    if args.seed_demo {
        match store.seed_demo().context("failed to seed demo system")? {
            Some(id) => tracing::info!(system = %id, "seeded demo system"),
            None => tracing::info!("store already has systems; skipping demo seed"),
        }
    }

    let backend: Arc<dyn TopologyBackend> = Arc::new(store);
    let open = args.system.map(|system| app::OpenRequest {
        system,
        version: args.open_version,
    });
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "topology-modeler",
        options,
        Box::new(move |cc| Ok(Box::new(app::TopologyApp::new(cc, backend, open)))),
    )
    .map_err(|error| anyhow!("{error}"))
}
