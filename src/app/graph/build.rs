use std::collections::HashMap;

use eframe::egui::{Pos2, Rect, vec2};

use super::super::EditorModel;
use super::super::render_utils::{segment_distance, world_to_screen};

pub(in crate::app) const NODE_WIDTH: f32 = 150.0;
pub(in crate::app) const NODE_HEIGHT: f32 = 52.0;
const EDGE_HIT_DISTANCE: f32 = 6.0;

/// Screen-space geometry of the current snapshot for one frame.
pub(in crate::app) struct CanvasGeometry {
    pub(in crate::app) nodes: Vec<CanvasNode>,
    pub(in crate::app) edges: Vec<CanvasEdge>,
    index_by_id: HashMap<String, usize>,
}

pub(in crate::app) struct CanvasNode {
    pub(in crate::app) id: String,
    pub(in crate::app) rect: Rect,
}

pub(in crate::app) struct CanvasEdge {
    pub(in crate::app) id: String,
    pub(in crate::app) start: Pos2,
    pub(in crate::app) end: Pos2,
    pub(in crate::app) world_length: f32,
}

impl CanvasGeometry {
    pub(in crate::app) fn node(&self, id: &str) -> Option<&CanvasNode> {
        self.index_by_id.get(id).and_then(|&index| self.nodes.get(index))
    }

    /// Topmost node under `pointer`; later nodes are drawn above earlier ones.
    pub(in crate::app) fn node_at(&self, pointer: Pos2) -> Option<&CanvasNode> {
        self.nodes.iter().rev().find(|node| node.rect.contains(pointer))
    }

    pub(in crate::app) fn edge_at(&self, pointer: Pos2) -> Option<&CanvasEdge> {
        self.edges
            .iter()
            .map(|edge| (edge, segment_distance(pointer, edge.start, edge.end)))
            .filter(|(_, distance)| *distance <= EDGE_HIT_DISTANCE)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(edge, _)| edge)
    }
}

impl EditorModel {
    pub(in crate::app) fn build_geometry(&self, rect: Rect) -> CanvasGeometry {
        let snapshot = self.session.snapshot();
        let size = vec2(NODE_WIDTH, NODE_HEIGHT) * self.zoom;

        let nodes = snapshot
            .nodes
            .iter()
            .map(|node| CanvasNode {
                id: node.id.clone(),
                rect: Rect::from_center_size(
                    world_to_screen(rect, self.pan, self.zoom, node.position.to_vec2()),
                    size,
                ),
            })
            .collect::<Vec<_>>();

        let index_by_id = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.clone(), index))
            .collect::<HashMap<_, _>>();

        let edges = snapshot
            .edges
            .iter()
            .filter_map(|edge| {
                let source = nodes.get(*index_by_id.get(&edge.source)?)?;
                let target = nodes.get(*index_by_id.get(&edge.target)?)?;
                let start = source.rect.center();
                let end = target.rect.center();
                Some(CanvasEdge {
                    id: edge.id.clone(),
                    start,
                    end,
                    world_length: start.distance(end) / self.zoom,
                })
            })
            .collect();

        CanvasGeometry {
            nodes,
            edges,
            index_by_id,
        }
    }
}
