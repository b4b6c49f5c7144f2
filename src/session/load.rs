use thiserror::Error;

use crate::layout::apply_layout;
use crate::store::{PersistenceError, TopologyBackend};
use crate::topology::{ResolutionError, Snapshot, snapshot_from_records};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("failed to resolve connections: {0}")]
    Resolution(#[from] ResolutionError),
}

/// Fetches devices, then connections, for one version and builds its snapshot.
///
/// When every node sits at the origin the stored positions are treated as missing and an
/// automatic layout is applied before the snapshot is returned.
pub fn load_snapshot(
    backend: &dyn TopologyBackend,
    system: &str,
    version: u32,
) -> Result<Snapshot, LoadError> {
    let devices = backend.list_devices(system, version)?;
    let connections = backend.list_connections(system, version)?;

    let mut snapshot = snapshot_from_records(&devices, &connections)?;
    if snapshot.all_at_origin() {
        tracing::debug!(system, version, "no stored positions, applying auto layout");
        apply_layout(&mut snapshot.nodes, &snapshot.edges);
    }

    tracing::info!(
        system,
        version,
        nodes = snapshot.nodes.len(),
        edges = snapshot.edges.len(),
        "loaded topology"
    );
    Ok(snapshot)
}
