mod json;
mod records;

use thiserror::Error;

pub use json::JsonStore;
pub use records::{
    ConnectionRecord, DeviceRecord, SaveRequest, SaveResponse, SystemSummary, backend_key,
};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("system `{0}` does not exist")]
    UnknownSystem(String),
    #[error("version {version} of system `{system}` does not exist")]
    UnknownVersion { system: String, version: u32 },
    #[error("system `{system}` is at version {latest}; only the latest version can be saved (got {base})")]
    StaleVersion { system: String, base: u32, latest: u32 },
    #[error("graph rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Request/response contract of the topology persistence backend.
pub trait TopologyBackend: Send + Sync {
    fn list_systems(&self) -> Result<Vec<SystemSummary>, PersistenceError>;

    fn list_devices(&self, system: &str, version: u32) -> Result<Vec<DeviceRecord>, PersistenceError>;

    fn list_connections(
        &self,
        system: &str,
        version: u32,
    ) -> Result<Vec<ConnectionRecord>, PersistenceError>;

    fn save_graph(&self, system: &str, request: &SaveRequest) -> Result<SaveResponse, PersistenceError>;

    fn rename_system(&self, system: &str, name: &str) -> Result<(), PersistenceError>;

    fn delete_system(&self, system: &str) -> Result<(), PersistenceError>;
}
