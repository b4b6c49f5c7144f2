use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::topology::{Edge, Node};

/// Device row as returned by the backend for one (system, version).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(rename = "Xposition", default)]
    pub x_position: Option<f64>,
    #[serde(rename = "Yposition", default)]
    pub y_position: Option<f64>,
    #[serde(
        rename = "AdditionalAsJson",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub additional: Option<Value>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Connection row; `Source`/`Target` hold backend device ids, not local node ids.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(rename = "Source", default)]
    pub source: Option<Value>,
    #[serde(rename = "Target", default)]
    pub target: Option<Value>,
    #[serde(rename = "ConnectionType", default)]
    pub connection_type: Option<String>,
    #[serde(rename = "BandwidthMbps", default)]
    pub bandwidth_mbps: Option<f64>,
    #[serde(rename = "LatencyMs", default)]
    pub latency_ms: Option<f64>,
    #[serde(
        rename = "ConnectionDetails",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub details: Option<Value>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemSummary {
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Version")]
    pub version: u32,
    #[serde(rename = "NodeCount", default)]
    pub node_count: usize,
    #[serde(rename = "EdgeCount", default)]
    pub edge_count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaveRequest {
    pub version: u32,
    pub devices: Vec<Node>,
    pub connections: Vec<Edge>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveResponse {
    #[serde(rename = "newVersion")]
    pub new_version: u32,
    /// Backend device id written for each local node id of the request.
    #[serde(rename = "assignedIds", default)]
    pub assigned_ids: IndexMap<String, Value>,
}

/// Normalizes a backend identifier: numbers and non-empty strings are accepted.
pub fn backend_key(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => Some(match number.as_f64() {
            Some(float) if number.as_i64().is_none() && float.fract() == 0.0 && float.abs() < 1e15 => {
                format!("{}", float as i64)
            }
            _ => number.to_string(),
        }),
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_owned()),
        _ => None,
    }
}
