//! Presentation state computed from node and edge attributes.
//!
//! Everything here is a pure function of `(snapshot, heat_mode)`. Nothing is written back
//! into the attribute bags; callers rebuild a [`DerivedView`] after each committed change.

use std::collections::HashMap;

use eframe::egui::Color32;

use super::attributes::{
    BANDWIDTH_KEY, DEVICE_TYPE_KEY, IP_ADDRESS_KEY, IS_ONLINE_KEY, TRAFFIC_RATE_KEY,
};
use super::model::{ConnectionKind, Edge, Node, NodeLookup, Snapshot};

/// Link capacity assumed when an edge carries no `BandwidthMbps`.
pub const DEFAULT_LINK_CAPACITY_MBPS: f64 = 1000.0;

const OFFLINE_OPACITY: f32 = 0.45;
const DOWN_EDGE_OPACITY: f32 = 0.5;

/// Device class used for icons, colors and placeholder addressing.
///
/// An explicit `DeviceType` wins (lowercased). Without one, a device that has an
/// `IpAddress` is a host and everything else is a switch.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Switch,
    Host,
    Other(String),
}

impl DeviceClass {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Switch => "switch",
            Self::Host => "host",
            Self::Other(name) => name,
        }
    }
}

pub fn classify_device_type(node: &Node) -> DeviceClass {
    if let Some(explicit) = node.attributes.get_present(DEVICE_TYPE_KEY) {
        let normalized = explicit.to_string().trim().to_lowercase();
        return match normalized.as_str() {
            "switch" => DeviceClass::Switch,
            "host" => DeviceClass::Host,
            _ => DeviceClass::Other(normalized),
        };
    }

    if node.attributes.get_present(IP_ADDRESS_KEY).is_some() {
        DeviceClass::Host
    } else {
        DeviceClass::Switch
    }
}

/// Cosmetic placeholder address for hosts without one, keyed by the node's ordinal.
/// Returns `None` when the node already has an address or is not a host.
pub fn assign_address(node: &Node, index: usize) -> Option<String> {
    if node.attributes.get_present(IP_ADDRESS_KEY).is_some() {
        return None;
    }
    if classify_device_type(node) != DeviceClass::Host {
        return None;
    }

    let third = (index / 254) % 256;
    let fourth = index % 254 + 1;
    Some(format!("10.0.{third}.{fourth}"))
}

/// Devices are online unless `IsOnline` says otherwise.
pub fn is_online(node: &Node) -> bool {
    node.attributes
        .get(IS_ONLINE_KEY)
        .and_then(|value| value.as_bool())
        .unwrap_or(true)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeStyle {
    pub fill: Color32,
    pub border: Color32,
    pub opacity: f32,
}

pub fn node_style(class: &DeviceClass, online: bool) -> NodeStyle {
    if !online {
        return NodeStyle {
            fill: Color32::from_rgb(92, 96, 104),
            border: Color32::from_rgb(140, 144, 150),
            opacity: OFFLINE_OPACITY,
        };
    }

    let (fill, border) = match class {
        DeviceClass::Switch => (Color32::from_rgb(37, 99, 235), Color32::from_rgb(147, 197, 253)),
        DeviceClass::Host => (Color32::from_rgb(5, 150, 105), Color32::from_rgb(110, 231, 183)),
        DeviceClass::Other(_) => (Color32::from_rgb(124, 58, 237), Color32::from_rgb(196, 181, 253)),
    };

    NodeStyle {
        fill,
        border,
        opacity: 1.0,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkStatus {
    Up,
    Down,
}

pub fn edge_status(edge: &Edge, nodes: &NodeLookup<'_>) -> LinkStatus {
    let endpoint_up = |id: &str| nodes.get(id).is_some_and(|node| is_online(node));
    if endpoint_up(&edge.source) && endpoint_up(&edge.target) {
        LinkStatus::Up
    } else {
        LinkStatus::Down
    }
}

/// Offered traffic of a device in Mbps. Only hosts generate traffic.
pub fn traffic_rate(node: &Node) -> f64 {
    if classify_device_type(node) != DeviceClass::Host {
        return 0.0;
    }

    node.attributes
        .get(TRAFFIC_RATE_KEY)
        .and_then(|value| value.as_f64())
        .filter(|rate| rate.is_finite())
        .map(|rate| rate.max(0.0))
        .unwrap_or(0.0)
}

pub fn edge_capacity(edge: &Edge) -> f64 {
    edge.attributes
        .get(BANDWIDTH_KEY)
        .and_then(|value| value.as_f64())
        .filter(|capacity| capacity.is_finite())
        .unwrap_or(DEFAULT_LINK_CAPACITY_MBPS)
}

/// `min(1, (source rate + target rate) / max(capacity, 1))`, always within `[0, 1]`.
pub fn edge_utilization(edge: &Edge, nodes: &NodeLookup<'_>) -> f64 {
    let rate = |id: &str| nodes.get(id).map(|node| traffic_rate(node)).unwrap_or(0.0);
    let offered = rate(&edge.source) + rate(&edge.target);
    let utilization = offered / edge_capacity(edge).max(1.0);
    utilization.clamp(0.0, 1.0)
}

pub fn edge_animate(edge: &Edge, nodes: &NodeLookup<'_>) -> bool {
    if edge_status(edge, nodes) != LinkStatus::Up {
        return false;
    }

    [&edge.source, &edge.target].into_iter().any(|id| {
        nodes
            .get(id.as_str())
            .is_some_and(|node| classify_device_type(node) == DeviceClass::Host)
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum HeatLevel {
    Nominal,
    Caution,
    Warning,
    Critical,
}

impl HeatLevel {
    pub fn from_utilization(utilization: f64) -> Self {
        if utilization >= 0.9 {
            Self::Critical
        } else if utilization >= 0.7 {
            Self::Warning
        } else if utilization >= 0.4 {
            Self::Caution
        } else {
            Self::Nominal
        }
    }

    pub fn color(self) -> Color32 {
        match self {
            Self::Nominal => Color32::from_rgb(34, 197, 94),
            Self::Caution => Color32::from_rgb(234, 179, 8),
            Self::Warning => Color32::from_rgb(249, 115, 22),
            Self::Critical => Color32::from_rgb(239, 68, 68),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeStyle {
    pub color: Color32,
    pub width: f32,
    pub dashed: bool,
    pub pulse: bool,
}

pub fn edge_style(kind: &ConnectionKind, status: LinkStatus, heat: HeatLevel, heat_mode: bool) -> EdgeStyle {
    let mut style = EdgeStyle {
        color: Color32::from_rgb(148, 163, 184),
        width: 2.0,
        dashed: false,
        pulse: false,
    };

    match kind {
        ConnectionKind::Power => style.color = Color32::from_rgb(255, 0, 0),
        ConnectionKind::Network => style.color = Color32::from_rgb(0, 255, 0),
        ConnectionKind::Ethernet => style.color = Color32::from_rgb(56, 189, 248),
        ConnectionKind::Command => style.width = 4.0,
        ConnectionKind::Sync => style.dashed = true,
        ConnectionKind::Data => style.pulse = true,
        ConnectionKind::Other(_) => {}
    }

    if heat_mode {
        style.color = heat.color();
    }
    if status == LinkStatus::Down {
        style.color = style.color.gamma_multiply(DOWN_EDGE_OPACITY);
    }

    style
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeView {
    pub id: String,
    pub class: DeviceClass,
    pub online: bool,
    pub address: Option<String>,
    pub style: NodeStyle,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EdgeView {
    pub id: String,
    pub status: LinkStatus,
    pub utilization: f64,
    pub heat: HeatLevel,
    pub animate: bool,
    pub style: EdgeStyle,
}

/// Derived state for every node and edge, index-aligned with the snapshot it came from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DerivedView {
    pub heat_mode: bool,
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
    node_index: HashMap<String, usize>,
    edge_index: HashMap<String, usize>,
}

impl DerivedView {
    pub fn node(&self, id: &str) -> Option<&NodeView> {
        self.node_index.get(id).and_then(|&index| self.nodes.get(index))
    }

    pub fn edge(&self, id: &str) -> Option<&EdgeView> {
        self.edge_index.get(id).and_then(|&index| self.edges.get(index))
    }
}

pub fn recompute(snapshot: &Snapshot, heat_mode: bool) -> DerivedView {
    let lookup = snapshot.node_lookup();

    let nodes = snapshot
        .nodes
        .iter()
        .enumerate()
        .map(|(index, node)| {
            let class = classify_device_type(node);
            let online = is_online(node);
            NodeView {
                id: node.id.clone(),
                address: assign_address(node, index),
                style: node_style(&class, online),
                class,
                online,
            }
        })
        .collect::<Vec<_>>();

    let edges = snapshot
        .edges
        .iter()
        .map(|edge| {
            let status = edge_status(edge, &lookup);
            let utilization = edge_utilization(edge, &lookup);
            let heat = HeatLevel::from_utilization(utilization);
            EdgeView {
                id: edge.id.clone(),
                status,
                utilization,
                heat,
                animate: edge_animate(edge, &lookup),
                style: edge_style(&edge.kind, status, heat, heat_mode),
            }
        })
        .collect::<Vec<_>>();

    let node_index = nodes
        .iter()
        .enumerate()
        .map(|(index, view)| (view.id.clone(), index))
        .collect();
    let edge_index = edges
        .iter()
        .enumerate()
        .map(|(index, view)| (view.id.clone(), index))
        .collect();

    DerivedView {
        heat_mode,
        nodes,
        edges,
        node_index,
        edge_index,
    }
}
