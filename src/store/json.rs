use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::topology::{
    AttrValue, BANDWIDTH_KEY, CONNECTION_BLOB_KEY, CONNECTION_TYPE_KEY, DEVICE_BLOB_KEY, Edge,
    ID_KEY, LABEL_KEY, LATENCY_KEY, Node, SOURCE_KEY, SYSTEM_VERSION_KEY, Snapshot, TARGET_KEY,
    X_POSITION_KEY, Y_POSITION_KEY,
};

use super::records::{
    ConnectionRecord, DeviceRecord, SaveRequest, SaveResponse, SystemSummary, backend_key,
};
use super::{PersistenceError, TopologyBackend};

const SYSTEM_FILE: &str = "system.json";
const DEVICES_FILE: &str = "devices.json";
const CONNECTIONS_FILE: &str = "connections.json";
const ASSET_NAME_KEY: &str = "AssetName";

#[derive(Clone, Debug, Serialize, Deserialize)]
struct SystemFile {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Version")]
    version: u32,
    #[serde(rename = "NextDeviceId", default)]
    next_device_id: u64,
}

/// Directory-backed store: `<root>/<system>/system.json` plus one `v<N>/` directory with
/// `devices.json` and `connections.json` per saved version.
#[derive(Clone, Debug)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create store directory {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn create_system(
        &self,
        name: &str,
        devices: &[DeviceRecord],
        connections: &[ConnectionRecord],
    ) -> Result<String, PersistenceError> {
        let id = self.next_system_id()?;
        let dir = self.root.join(&id);
        let version = 1;

        write_json(&version_dir(&dir, version).join(DEVICES_FILE), &devices)?;
        write_json(&version_dir(&dir, version).join(CONNECTIONS_FILE), &connections)?;

        let next_device_id = devices
            .iter()
            .filter_map(|device| device.id.as_ref().and_then(backend_key))
            .filter_map(|key| key.parse::<u64>().ok())
            .max()
            .map_or(1, |max| max + 1);
        write_json(
            &dir.join(SYSTEM_FILE),
            &SystemFile {
                name: name.to_owned(),
                version,
                next_device_id,
            },
        )?;

        tracing::info!(system = %id, name, "created system");
        Ok(id)
    }

    /// Writes the demo lab when the store holds no systems yet.
    pub fn seed_demo(&self) -> Result<Option<String>, PersistenceError> {
        if !self.list_systems()?.is_empty() {
            return Ok(None);
        }

        let devices = [
            json!({"id": 1, "AssetName": "core-switch", "DeviceType": "switch", "IsOnline": true}),
            json!({
                "id": 2,
                "AssetName": "web-01",
                "DeviceType": "host",
                "IpAddress": "192.168.10.11",
                "IsOnline": true,
                "TrafficRateMbps": 420.0
            }),
            json!({
                "id": 3,
                "AssetName": "db-01",
                "DeviceType": "host",
                "IsOnline": false,
                "TrafficRateMbps": 150.0,
                "AdditionalAsJson": {"Rack": "B2"}
            }),
        ]
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<DeviceRecord>, _>>()
        .context("invalid demo devices")?;

        let connections = [
            json!({"Source": 1, "Target": 2, "ConnectionType": "ethernet", "BandwidthMbps": 1000.0}),
            json!({"Source": 1, "Target": 3, "ConnectionType": "data", "BandwidthMbps": 500.0, "LatencyMs": 2.5}),
        ]
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<ConnectionRecord>, _>>()
        .context("invalid demo connections")?;

        self.create_system("Demo lab", &devices, &connections).map(Some)
    }

    fn next_system_id(&self) -> Result<String> {
        let mut max = 0u64;
        for entry in read_dir_entries(&self.root)? {
            if let Some(id) = entry.file_name().to_str().and_then(|name| name.parse::<u64>().ok()) {
                max = max.max(id);
            }
        }
        Ok((max + 1).to_string())
    }

    fn system_dir(&self, system: &str) -> Result<PathBuf, PersistenceError> {
        let valid = !system.is_empty()
            && system
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(PersistenceError::UnknownSystem(system.to_owned()));
        }

        let dir = self.root.join(system);
        if dir.join(SYSTEM_FILE).is_file() {
            Ok(dir)
        } else {
            Err(PersistenceError::UnknownSystem(system.to_owned()))
        }
    }

    fn read_system(&self, system: &str) -> Result<(PathBuf, SystemFile), PersistenceError> {
        let dir = self.system_dir(system)?;
        let file = read_json::<SystemFile>(&dir.join(SYSTEM_FILE))?;
        Ok((dir, file))
    }

    fn read_version_file<T: DeserializeOwned>(
        &self,
        system: &str,
        version: u32,
        file_name: &str,
    ) -> Result<Vec<T>, PersistenceError> {
        let (dir, file) = self.read_system(system)?;
        if version == 0 && file.version == 0 {
            return Ok(Vec::new());
        }

        let path = version_dir(&dir, version).join(file_name);
        if version == 0 || version > file.version || !path.is_file() {
            return Err(PersistenceError::UnknownVersion {
                system: system.to_owned(),
                version,
            });
        }

        Ok(read_json(&path)?)
    }
}

impl TopologyBackend for JsonStore {
    fn list_systems(&self) -> Result<Vec<SystemSummary>, PersistenceError> {
        let mut systems = Vec::new();

        for entry in read_dir_entries(&self.root)? {
            let Some(id) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let path = entry.path().join(SYSTEM_FILE);
            if !path.is_file() {
                continue;
            }

            let file = read_json::<SystemFile>(&path)?;
            let (node_count, edge_count) = if file.version == 0 {
                (0, 0)
            } else {
                let dir = version_dir(&entry.path(), file.version);
                let devices = read_json::<Vec<Value>>(&dir.join(DEVICES_FILE)).unwrap_or_default();
                let connections =
                    read_json::<Vec<Value>>(&dir.join(CONNECTIONS_FILE)).unwrap_or_default();
                (devices.len(), connections.len())
            };

            systems.push(SystemSummary {
                id,
                name: file.name,
                version: file.version,
                node_count,
                edge_count,
            });
        }

        systems.sort_by(|a, b| {
            a.id.len()
                .cmp(&b.id.len())
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(systems)
    }

    fn list_devices(&self, system: &str, version: u32) -> Result<Vec<DeviceRecord>, PersistenceError> {
        self.read_version_file(system, version, DEVICES_FILE)
    }

    fn list_connections(
        &self,
        system: &str,
        version: u32,
    ) -> Result<Vec<ConnectionRecord>, PersistenceError> {
        self.read_version_file(system, version, CONNECTIONS_FILE)
    }

    fn save_graph(&self, system: &str, request: &SaveRequest) -> Result<SaveResponse, PersistenceError> {
        let (dir, mut file) = self.read_system(system)?;
        if request.version != file.version {
            return Err(PersistenceError::StaleVersion {
                system: system.to_owned(),
                base: request.version,
                latest: file.version,
            });
        }

        let snapshot = Snapshot::new(request.devices.clone(), request.connections.clone())
            .map_err(|error| PersistenceError::Rejected(error.to_string()))?;

        let new_version = file.version + 1;
        let mut next_device_id = snapshot
            .nodes
            .iter()
            .filter_map(|node| node_backend_key(node))
            .filter_map(|key| key.parse::<u64>().ok())
            .max()
            .map_or(file.next_device_id, |max| file.next_device_id.max(max + 1))
            .max(1);

        let mut used = HashSet::new();
        let mut backend_ids = Vec::with_capacity(snapshot.nodes.len());
        for node in &snapshot.nodes {
            let key = match node_backend_key(node) {
                Some(key) if used.insert(key.clone()) => key,
                _ => {
                    let key = next_device_id.to_string();
                    next_device_id += 1;
                    used.insert(key.clone());
                    key
                }
            };
            backend_ids.push(key);
        }

        let devices = snapshot
            .nodes
            .iter()
            .zip(&backend_ids)
            .map(|(node, key)| device_record(node, key, new_version))
            .collect::<Vec<_>>();

        let lookup = snapshot
            .nodes
            .iter()
            .zip(&backend_ids)
            .map(|(node, key)| (node.id.as_str(), key.as_str()))
            .collect::<std::collections::HashMap<_, _>>();
        let connections = snapshot
            .edges
            .iter()
            .enumerate()
            .map(|(index, edge)| {
                let source = lookup.get(edge.source.as_str()).copied().unwrap_or_default();
                let target = lookup.get(edge.target.as_str()).copied().unwrap_or_default();
                connection_record(edge, index + 1, source, target, new_version)
            })
            .collect::<Vec<_>>();

        let target_dir = version_dir(&dir, new_version);
        write_json(&target_dir.join(DEVICES_FILE), &devices)?;
        write_json(&target_dir.join(CONNECTIONS_FILE), &connections)?;

        file.version = new_version;
        file.next_device_id = next_device_id;
        write_json(&dir.join(SYSTEM_FILE), &file)?;

        tracing::info!(
            system,
            version = new_version,
            devices = devices.len(),
            connections = connections.len(),
            "saved graph"
        );
        let assigned_ids = snapshot
            .nodes
            .iter()
            .zip(&backend_ids)
            .map(|(node, key)| (node.id.clone(), id_value(key)))
            .collect();
        Ok(SaveResponse {
            new_version,
            assigned_ids,
        })
    }

    fn rename_system(&self, system: &str, name: &str) -> Result<(), PersistenceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PersistenceError::Rejected("system name cannot be empty".to_owned()));
        }

        let (dir, mut file) = self.read_system(system)?;
        file.name = name.to_owned();
        write_json(&dir.join(SYSTEM_FILE), &file)?;

        tracing::info!(system, name, "renamed system");
        Ok(())
    }

    fn delete_system(&self, system: &str) -> Result<(), PersistenceError> {
        let dir = self.system_dir(system)?;
        fs::remove_dir_all(&dir)
            .with_context(|| format!("failed to remove {}", dir.display()))?;

        tracing::info!(system, "deleted system");
        Ok(())
    }
}

fn node_backend_key(node: &Node) -> Option<String> {
    node.attributes
        .get(ID_KEY)
        .map(AttrValue::to_json)
        .as_ref()
        .and_then(backend_key)
}

fn id_value(key: &str) -> Value {
    key.parse::<u64>().map_or_else(|_| json!(key), |number| json!(number))
}

fn device_record(node: &Node, key: &str, version: u32) -> DeviceRecord {
    let mut fields = Map::new();
    fields.insert(ASSET_NAME_KEY.to_owned(), json!(node.label()));
    for (name, value) in node.attributes.iter() {
        if matches!(
            name,
            LABEL_KEY
                | ID_KEY
                | SYSTEM_VERSION_KEY
                | ASSET_NAME_KEY
                | X_POSITION_KEY
                | Y_POSITION_KEY
                | DEVICE_BLOB_KEY
        ) {
            continue;
        }
        fields.insert(name.to_owned(), value.to_json());
    }
    fields.insert(SYSTEM_VERSION_KEY.to_owned(), json!(version));

    DeviceRecord {
        id: Some(id_value(key)),
        x_position: Some(f64::from(node.position.x)),
        y_position: Some(f64::from(node.position.y)),
        additional: None,
        fields,
    }
}

fn connection_record(
    edge: &Edge,
    ordinal: usize,
    source: &str,
    target: &str,
    version: u32,
) -> ConnectionRecord {
    let mut fields = Map::new();
    for (name, value) in edge.attributes.iter() {
        if matches!(
            name,
            ID_KEY
                | SYSTEM_VERSION_KEY
                | BANDWIDTH_KEY
                | LATENCY_KEY
                | SOURCE_KEY
                | TARGET_KEY
                | CONNECTION_TYPE_KEY
                | CONNECTION_BLOB_KEY
        ) {
            tracing::debug!(edge = %edge.id, name, "skipping record column on save");
            continue;
        }
        fields.insert(name.to_owned(), value.to_json());
    }
    fields.insert(SYSTEM_VERSION_KEY.to_owned(), json!(version));

    ConnectionRecord {
        id: Some(json!(ordinal)),
        source: Some(id_value(source)),
        target: Some(id_value(target)),
        connection_type: Some(edge.kind.as_str().to_owned()),
        bandwidth_mbps: edge.attributes.get(BANDWIDTH_KEY).and_then(AttrValue::as_f64),
        latency_ms: edge.attributes.get(LATENCY_KEY).and_then(AttrValue::as_f64),
        details: None,
        fields,
    }
}

fn version_dir(system_dir: &Path, version: u32) -> PathBuf {
    system_dir.join(format!("v{version}"))
}

fn read_dir_entries(dir: &Path) -> Result<Vec<fs::DirEntry>> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("failed to list {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("failed to list {}", dir.display()))?;
    entries.sort_by_key(|entry| entry.file_name());
    Ok(entries)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow!("{} has no parent directory", path.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;

    let raw = serde_json::to_string_pretty(value).context("failed to serialize JSON")?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, raw).with_context(|| format!("failed to write {}", staging.display()))?;
    fs::rename(&staging, path)
        .with_context(|| format!("failed to move {} into place", path.display()))?;
    Ok(())
}
