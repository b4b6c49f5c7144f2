use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::store::{ConnectionRecord, DeviceRecord, backend_key};

use super::attributes::{
    AttrValue, Attributes, BANDWIDTH_KEY, ID_KEY, LABEL_KEY, LATENCY_KEY, is_locked_key,
};
use super::model::{ConnectionKind, Edge, Node, Position, ResolutionError, Snapshot};

const DEVICE_NAME_KEYS: [&str; 2] = ["device_name", "AssetName"];
const NEW_CONNECTION_LABEL: &str = "New Connection";

/// Backend device id -> local node id, produced only by [`nodes_from_devices`], so
/// connections can never be resolved before the device listing is complete.
#[derive(Clone, Debug, Default)]
pub struct DeviceIndex {
    by_backend_id: HashMap<String, String>,
}

impl DeviceIndex {
    pub fn resolve(&self, backend_id: &str) -> Option<&str> {
        self.by_backend_id.get(backend_id).map(String::as_str)
    }
}

pub fn nodes_from_devices(devices: &[DeviceRecord]) -> (Vec<Node>, DeviceIndex) {
    let mut nodes = Vec::with_capacity(devices.len());
    let mut index = DeviceIndex::default();

    for (position, device) in devices.iter().enumerate() {
        let local_id = (position + 1).to_string();

        let label = DEVICE_NAME_KEYS
            .iter()
            .find_map(|key| device.fields.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| format!("Device {}", position + 1));

        let mut attributes = Attributes::with_label(label);
        if let Some(backend_id) = &device.id {
            if let Some(value) = AttrValue::from_json(backend_id) {
                attributes.insert(ID_KEY, value);
            }
            if let Some(key) = backend_key(backend_id) {
                index.by_backend_id.insert(key, local_id.clone());
            }
        }

        flatten_into(&mut attributes, &device.fields, false);
        if let Some(additional) = device.additional.as_ref().and_then(json_blob) {
            flatten_into(&mut attributes, &additional, true);
        }

        let x = device.x_position.unwrap_or_default() as f32;
        let y = device.y_position.unwrap_or_default() as f32;

        nodes.push(Node {
            id: local_id,
            position: Position::new(x, y),
            attributes,
        });
    }

    (nodes, index)
}

pub fn edges_from_connections(
    connections: &[ConnectionRecord],
    index: &DeviceIndex,
) -> Result<Vec<Edge>, ResolutionError> {
    let mut edges = Vec::with_capacity(connections.len());

    for (position, connection) in connections.iter().enumerate() {
        let source = resolve_endpoint(index, position, "source", connection.source.as_ref())?;
        let target = resolve_endpoint(index, position, "target", connection.target.as_ref())?;

        let kind_text = connection.connection_type.clone().unwrap_or_default();
        let label = connection
            .fields
            .get(LABEL_KEY)
            .and_then(Value::as_str)
            .filter(|label| !label.trim().is_empty())
            .map(str::to_owned)
            .or_else(|| Some(kind_text.clone()).filter(|kind| !kind.trim().is_empty()))
            .unwrap_or_else(|| NEW_CONNECTION_LABEL.to_owned());

        let mut attributes = Attributes::with_label(label);
        if let Some(bandwidth) = connection.bandwidth_mbps {
            attributes.insert(BANDWIDTH_KEY, AttrValue::Number(bandwidth));
        }
        if let Some(latency) = connection.latency_ms {
            attributes.insert(LATENCY_KEY, AttrValue::Number(latency));
        }
        flatten_into(&mut attributes, &connection.fields, false);
        if let Some(details) = connection.details.as_ref().and_then(json_blob) {
            flatten_into(&mut attributes, &details, true);
        }

        edges.push(Edge {
            id: format!("e{}", position + 1),
            source: source.to_owned(),
            target: target.to_owned(),
            kind: ConnectionKind::parse(&kind_text),
            attributes,
        });
    }

    Ok(edges)
}

/// Devices first, then connections; any unresolved endpoint aborts the whole load.
pub fn snapshot_from_records(
    devices: &[DeviceRecord],
    connections: &[ConnectionRecord],
) -> Result<Snapshot, ResolutionError> {
    let (nodes, index) = nodes_from_devices(devices);
    let edges = edges_from_connections(connections, &index)?;
    Snapshot::new(nodes, edges)
}

fn resolve_endpoint<'a>(
    index: &'a DeviceIndex,
    connection: usize,
    endpoint: &'static str,
    raw: Option<&Value>,
) -> Result<&'a str, ResolutionError> {
    let key = raw
        .and_then(backend_key)
        .ok_or(ResolutionError::MissingEndpoint {
            connection,
            endpoint,
        })?;

    index
        .resolve(&key)
        .ok_or(ResolutionError::UnknownEndpoint {
            connection,
            endpoint,
            reference: key,
        })
}

/// Serialized blobs arrive either as objects or as JSON text holding an object.
fn json_blob(value: &Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map.clone()),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        },
        _ => None,
    }
}

fn flatten_into(attributes: &mut Attributes, fields: &Map<String, Value>, from_blob: bool) {
    for (key, value) in fields {
        if key == LABEL_KEY || (from_blob && is_locked_key(key)) {
            continue;
        }
        if let Some(value) = AttrValue::from_json(value) {
            attributes.insert(key.clone(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn device(raw: Value) -> DeviceRecord {
        serde_json::from_value(raw).unwrap()
    }

    fn connection(raw: Value) -> ConnectionRecord {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn devices_flatten_blobs_and_fall_back_to_positional_labels() {
        let devices = vec![
            device(json!({
                "id": 41,
                "AssetName": "edge-router",
                "Xposition": 10.0,
                "Yposition": 20.0,
                "Manufacturer": null,
                "AdditionalAsJson": "{\"Rack\": \"R4\", \"id\": 999}"
            })),
            device(json!({"id": 42, "AssetName": "  "})),
        ];

        let (nodes, index) = nodes_from_devices(&devices);

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].id, "1");
        assert_eq!(nodes[0].label(), "edge-router");
        assert_eq!(nodes[0].position, Position::new(10.0, 20.0));
        assert_eq!(
            nodes[0].attributes.iter().map(|(key, _)| key).collect::<Vec<_>>(),
            vec!["label", "id", "AssetName", "Rack"]
        );
        assert_eq!(
            nodes[0].attributes.get(ID_KEY),
            Some(&AttrValue::Number(41.0))
        );
        assert!(nodes[0].attributes.get("AdditionalAsJson").is_none());
        assert_eq!(nodes[1].label(), "Device 2");
        assert_eq!(index.resolve("42"), Some("2"));
    }

    #[test]
    fn connections_resolve_backend_ids_to_local_ids() {
        let devices = vec![
            device(json!({"id": 7, "AssetName": "sw"})),
            device(json!({"id": 9, "AssetName": "host"})),
        ];
        let connections = vec![connection(json!({
            "Source": 7,
            "Target": "9",
            "ConnectionType": "Ethernet",
            "BandwidthMbps": 100.0,
            "ConnectionDetails": {"Vlan": 20}
        }))];

        let snapshot = snapshot_from_records(&devices, &connections).unwrap();

        let edge = &snapshot.edges[0];
        assert_eq!(edge.id, "e1");
        assert_eq!((edge.source.as_str(), edge.target.as_str()), ("1", "2"));
        assert_eq!(edge.kind, ConnectionKind::Ethernet);
        assert_eq!(edge.label(), "Ethernet");
        assert_eq!(
            edge.attributes.get(BANDWIDTH_KEY),
            Some(&AttrValue::Number(100.0))
        );
        assert_eq!(edge.attributes.get("Vlan"), Some(&AttrValue::Number(20.0)));
    }

    #[test]
    fn unresolved_endpoint_aborts_the_load() {
        let devices = vec![device(json!({"id": 1}))];
        let connections = vec![
            connection(json!({"Source": 1, "Target": 1, "ConnectionType": "power"})),
            connection(json!({"Source": 1, "Target": 5, "ConnectionType": "power"})),
        ];

        assert_eq!(
            snapshot_from_records(&devices, &connections),
            Err(ResolutionError::UnknownEndpoint {
                connection: 1,
                endpoint: "target",
                reference: "5".to_owned(),
            })
        );
    }

    #[test]
    fn connections_without_devices_fail_resolution() {
        let connections = vec![connection(json!({"Source": 1, "Target": 2}))];
        assert!(matches!(
            edges_from_connections(&connections, &DeviceIndex::default()),
            Err(ResolutionError::UnknownEndpoint { connection: 0, .. })
        ));

        let missing = vec![connection(json!({"Target": 2}))];
        assert_eq!(
            edges_from_connections(&missing, &DeviceIndex::default()),
            Err(ResolutionError::MissingEndpoint {
                connection: 0,
                endpoint: "source",
            })
        );
    }

    #[test]
    fn every_loaded_edge_resolves_inside_the_snapshot() {
        let devices = (1..=4)
            .map(|id| device(json!({"id": id, "AssetName": format!("d{id}")})))
            .collect::<Vec<_>>();
        let connections = [(1, 2), (2, 3), (3, 4), (4, 1)]
            .iter()
            .map(|(s, t)| connection(json!({"Source": s, "Target": t, "ConnectionType": "data"})))
            .collect::<Vec<_>>();

        let snapshot = snapshot_from_records(&devices, &connections).unwrap();

        for edge in &snapshot.edges {
            assert!(snapshot.contains_node(&edge.source));
            assert!(snapshot.contains_node(&edge.target));
        }
    }
}
