use std::collections::{HashMap, HashSet};
use std::fmt;

use eframe::egui::{Vec2, vec2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::attributes::Attributes;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_origin(self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn to_vec2(self) -> Vec2 {
        vec2(self.x, self.y)
    }

    pub fn from_vec2(value: Vec2) -> Self {
        Self::new(value.x, value.y)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConnectionKind {
    Power,
    Network,
    Command,
    Sync,
    Data,
    Ethernet,
    Other(String),
}

impl ConnectionKind {
    pub const PRESETS: [ConnectionKind; 6] = [
        Self::Power,
        Self::Network,
        Self::Command,
        Self::Sync,
        Self::Data,
        Self::Ethernet,
    ];

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "power" => Self::Power,
            "network" => Self::Network,
            "command" => Self::Command,
            "sync" => Self::Sync,
            "data" => Self::Data,
            "ethernet" => Self::Ethernet,
            _ => Self::Other(raw.trim().to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Power => "power",
            Self::Network => "network",
            Self::Command => "command",
            Self::Sync => "sync",
            Self::Data => "data",
            Self::Ethernet => "ethernet",
            Self::Other(raw) => raw,
        }
    }
}

impl Default for ConnectionKind {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<String> for ConnectionKind {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<ConnectionKind> for String {
    fn from(value: ConnectionKind) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(raw) if raw.is_empty() => f.write_str("other"),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub position: Position,
    #[serde(rename = "data")]
    pub attributes: Attributes,
}

impl Node {
    pub fn new(id: impl Into<String>, label: impl Into<String>, position: Position) -> Self {
        Self {
            id: id.into(),
            position,
            attributes: Attributes::with_label(label),
        }
    }

    pub fn label(&self) -> &str {
        self.attributes.label()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub kind: ConnectionKind,
    #[serde(rename = "data")]
    pub attributes: Attributes,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        kind: ConnectionKind,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            kind,
            attributes: Attributes::with_label(label),
        }
    }

    pub fn label(&self) -> &str {
        self.attributes.label()
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }

    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("connection #{connection} {endpoint} `{reference}` does not match any loaded device")]
    UnknownEndpoint {
        connection: usize,
        endpoint: &'static str,
        reference: String,
    },
    #[error("connection #{connection} has no {endpoint} reference")]
    MissingEndpoint {
        connection: usize,
        endpoint: &'static str,
    },
    #[error("device id `{0}` appears more than once")]
    DuplicateNode(String),
    #[error("edge `{edge}` references missing node `{node}`")]
    DanglingEdge { edge: String, node: String },
}

pub type NodeLookup<'a> = HashMap<&'a str, &'a Node>;

/// Nodes and edges of one (system, version) pair.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Snapshot {
    /// Builds a snapshot and rejects duplicate node ids or edges whose endpoints are absent.
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self, ResolutionError> {
        let snapshot = Self { nodes, edges };
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn validate(&self) -> Result<(), ResolutionError> {
        let mut seen = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(ResolutionError::DuplicateNode(node.id.clone()));
            }
        }

        for edge in &self.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !seen.contains(endpoint.as_str()) {
                    return Err(ResolutionError::DanglingEdge {
                        edge: edge.id.clone(),
                        node: endpoint.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn node_lookup(&self) -> NodeLookup<'_> {
        self.nodes
            .iter()
            .map(|node| (node.id.as_str(), node))
            .collect()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|edge| edge.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|node| node.id == id)
    }

    pub fn incident_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |edge| edge.touches(node_id))
    }

    /// Returns `{prefix}{n}` for the smallest `n >= floor` not yet used by a node or edge.
    pub fn fresh_id(&self, prefix: &str, floor: usize) -> String {
        let taken = self
            .nodes
            .iter()
            .map(|node| node.id.as_str())
            .chain(self.edges.iter().map(|edge| edge.id.as_str()))
            .collect::<HashSet<_>>();

        let mut counter = floor.max(1);
        loop {
            let candidate = format!("{prefix}{counter}");
            if !taken.contains(candidate.as_str()) {
                return candidate;
            }
            counter += 1;
        }
    }

    pub fn all_at_origin(&self) -> bool {
        !self.nodes.is_empty() && self.nodes.iter().all(|node| node.position.is_origin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_kind_parses_known_and_custom_values() {
        assert_eq!(ConnectionKind::parse(" Power "), ConnectionKind::Power);
        assert_eq!(ConnectionKind::parse("ETHERNET"), ConnectionKind::Ethernet);
        assert_eq!(
            ConnectionKind::parse("fiber"),
            ConnectionKind::Other("fiber".to_owned())
        );
        assert_eq!(ConnectionKind::Other(String::new()).to_string(), "other");
    }

    #[test]
    fn validate_rejects_dangling_and_duplicate_ids() {
        let a = Node::new("1", "a", Position::ORIGIN);
        let b = Node::new("2", "b", Position::ORIGIN);
        let edge = Edge::new("e1", "1", "3", ConnectionKind::Network, "network");

        assert_eq!(
            Snapshot::new(vec![a.clone(), b.clone()], vec![edge]),
            Err(ResolutionError::DanglingEdge {
                edge: "e1".to_owned(),
                node: "3".to_owned(),
            })
        );
        assert_eq!(
            Snapshot::new(vec![a.clone(), a], Vec::new()),
            Err(ResolutionError::DuplicateNode("1".to_owned()))
        );
    }

    #[test]
    fn fresh_id_skips_taken_ids() {
        let snapshot = Snapshot {
            nodes: vec![
                Node::new("new-3", "a", Position::ORIGIN),
                Node::new("new-4", "b", Position::ORIGIN),
            ],
            edges: Vec::new(),
        };

        assert_eq!(snapshot.fresh_id("new-", 3), "new-5");
        assert_eq!(snapshot.fresh_id("e", 0), "e1");
    }

    #[test]
    fn origin_sentinel_requires_every_node_at_origin() {
        let mut snapshot = Snapshot {
            nodes: vec![
                Node::new("1", "a", Position::ORIGIN),
                Node::new("2", "b", Position::ORIGIN),
            ],
            edges: Vec::new(),
        };
        assert!(snapshot.all_at_origin());

        snapshot.nodes[1].position = Position::new(0.0, 100.0);
        assert!(!snapshot.all_at_origin());
        assert!(!Snapshot::default().all_at_origin());
    }
}
