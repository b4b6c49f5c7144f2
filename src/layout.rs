use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};

use crate::topology::{Edge, Node, Position};

/// Distance between consecutive layers along the primary (left to right) axis.
pub const RANK_SEPARATION: f32 = 300.0;
/// Distance between siblings inside one layer.
pub const NODE_SEPARATION: f32 = 100.0;
/// Extra secondary-axis gap between weakly connected components.
const COMPONENT_GAP: f32 = 60.0;

/// Layered left-to-right layout.
///
/// Returns one position per node, in node order. Each weakly connected component is
/// layered by BFS depth from its sources, ordered inside each layer by the barycenter of
/// its predecessors, and stacked below the previous component. The result depends only
/// on node order and the edge list.
pub fn hierarchical_layout(nodes: &[Node], edges: &[Edge]) -> Vec<Position> {
    let n = nodes.len();
    if n == 0 {
        return Vec::new();
    }

    let index_by_id = nodes
        .iter()
        .enumerate()
        .map(|(index, node)| (node.id.as_str(), index))
        .collect::<HashMap<_, _>>();

    let mut outgoing = vec![Vec::new(); n];
    let mut incoming = vec![Vec::new(); n];
    for edge in edges {
        let (Some(&from), Some(&to)) = (
            index_by_id.get(edge.source.as_str()),
            index_by_id.get(edge.target.as_str()),
        ) else {
            continue;
        };
        if from == to || outgoing[from].contains(&to) {
            continue;
        }
        outgoing[from].push(to);
        incoming[to].push(from);
    }

    let mut positions = vec![Position::ORIGIN; n];
    let mut component_of = vec![usize::MAX; n];
    let mut band_top = 0.0_f32;

    for seed in 0..n {
        if component_of[seed] != usize::MAX {
            continue;
        }

        let members = collect_component(seed, &outgoing, &incoming, &mut component_of);
        let depth = assign_depths(&members, &outgoing, &incoming);
        let layers = order_layers(&members, &depth, &incoming);

        let widest = layers.iter().map(Vec::len).max().unwrap_or(1).max(1);
        let band_height = (widest - 1) as f32 * NODE_SEPARATION;
        let band_center = band_top + band_height / 2.0;

        for (rank, layer) in layers.iter().enumerate() {
            let layer_height = (layer.len().saturating_sub(1)) as f32 * NODE_SEPARATION;
            let start = band_center - layer_height / 2.0;
            for (slot, &index) in layer.iter().enumerate() {
                positions[index] = Position::new(
                    rank as f32 * RANK_SEPARATION,
                    start + slot as f32 * NODE_SEPARATION,
                );
            }
        }

        band_top += band_height + NODE_SEPARATION + COMPONENT_GAP;
    }

    positions
}

/// Writes fresh layout positions into `nodes`.
pub fn apply_layout(nodes: &mut [Node], edges: &[Edge]) {
    let positions = hierarchical_layout(nodes, edges);
    for (node, position) in nodes.iter_mut().zip(positions) {
        node.position = position;
    }
}

fn collect_component(
    seed: usize,
    outgoing: &[Vec<usize>],
    incoming: &[Vec<usize>],
    component_of: &mut [usize],
) -> Vec<usize> {
    let mut members = Vec::new();
    let mut queue = VecDeque::from([seed]);
    component_of[seed] = seed;

    while let Some(current) = queue.pop_front() {
        members.push(current);
        for &next in outgoing[current].iter().chain(incoming[current].iter()) {
            if component_of[next] == usize::MAX {
                component_of[next] = seed;
                queue.push_back(next);
            }
        }
    }

    members.sort_unstable();
    members
}

/// BFS depth along edge direction from every source of the component. Nodes only
/// reachable against the edge direction (or sitting in a source-less cycle) are placed one
/// layer after their first already-placed neighbour.
fn assign_depths(
    members: &[usize],
    outgoing: &[Vec<usize>],
    incoming: &[Vec<usize>],
) -> HashMap<usize, usize> {
    let mut depth = HashMap::with_capacity(members.len());
    let mut queue = VecDeque::new();

    for &index in members {
        if incoming[index].is_empty() {
            depth.insert(index, 0);
            queue.push_back(index);
        }
    }
    if queue.is_empty()
        && let Some(&first) = members.first()
    {
        depth.insert(first, 0);
        queue.push_back(first);
    }

    loop {
        while let Some(current) = queue.pop_front() {
            let next_depth = depth[&current] + 1;
            for &next in &outgoing[current] {
                if !depth.contains_key(&next) {
                    depth.insert(next, next_depth);
                    queue.push_back(next);
                }
            }
        }

        let Some((orphan, anchor_depth)) = members.iter().find_map(|&index| {
            if depth.contains_key(&index) {
                return None;
            }
            incoming[index]
                .iter()
                .chain(outgoing[index].iter())
                .filter_map(|neighbor| depth.get(neighbor).copied())
                .min()
                .map(|anchor| (index, anchor))
        }) else {
            break;
        };

        depth.insert(orphan, anchor_depth + 1);
        queue.push_back(orphan);
    }

    depth
}

fn order_layers(
    members: &[usize],
    depth: &HashMap<usize, usize>,
    incoming: &[Vec<usize>],
) -> Vec<Vec<usize>> {
    let layer_count = members
        .iter()
        .filter_map(|index| depth.get(index))
        .max()
        .map_or(1, |deepest| deepest + 1);
    let mut layers = vec![Vec::new(); layer_count];
    for &index in members {
        if let Some(&layer) = depth.get(&index) {
            layers[layer].push(index);
        }
    }

    let mut slot_of = HashMap::with_capacity(members.len());
    for layer in &mut layers {
        let mut keyed = layer
            .iter()
            .map(|&index| {
                let parents = incoming[index]
                    .iter()
                    .filter_map(|parent| slot_of.get(parent).copied())
                    .collect::<Vec<f32>>();
                let barycenter = if parents.is_empty() {
                    None
                } else {
                    Some(parents.iter().sum::<f32>() / parents.len() as f32)
                };
                (barycenter, index)
            })
            .collect::<Vec<_>>();

        keyed.sort_by(|a, b| match (a.0, b.0) {
            (Some(left), Some(right)) => left.total_cmp(&right).then(a.1.cmp(&b.1)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.1.cmp(&b.1),
        });

        *layer = keyed.into_iter().map(|(_, index)| index).collect();
        for (slot, &index) in layer.iter().enumerate() {
            slot_of.insert(index, slot as f32);
        }
    }

    layers
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::topology::ConnectionKind;

    fn nodes(count: usize) -> Vec<Node> {
        (1..=count)
            .map(|id| Node::new(id.to_string(), format!("n{id}"), Position::ORIGIN))
            .collect()
    }

    fn edge(source: usize, target: usize) -> Edge {
        Edge::new(
            format!("e{source}-{target}"),
            source.to_string(),
            target.to_string(),
            ConnectionKind::Network,
            "network",
        )
    }

    #[test]
    fn layers_follow_graph_depth() {
        let nodes = nodes(4);
        let edges = vec![edge(1, 2), edge(1, 3), edge(3, 4)];

        let positions = hierarchical_layout(&nodes, &edges);

        assert_eq!(positions[0].x, 0.0);
        assert_eq!(positions[1].x, RANK_SEPARATION);
        assert_eq!(positions[2].x, RANK_SEPARATION);
        assert_eq!(positions[3].x, RANK_SEPARATION * 2.0);
        assert_eq!((positions[1].y - positions[2].y).abs(), NODE_SEPARATION);
    }

    #[test]
    fn layout_is_deterministic() {
        let nodes = nodes(7);
        let edges = vec![
            edge(1, 2),
            edge(2, 3),
            edge(3, 1),
            edge(4, 5),
            edge(6, 5),
            edge(2, 5),
        ];

        assert_eq!(
            hierarchical_layout(&nodes, &edges),
            hierarchical_layout(&nodes, &edges)
        );
    }

    #[test]
    fn disconnected_nodes_never_overlap() {
        let nodes = nodes(6);
        let edges = vec![edge(1, 2), edge(4, 5)];

        let positions = hierarchical_layout(&nodes, &edges);

        assert_eq!(positions.len(), 6);
        let distinct = positions
            .iter()
            .map(|p| (p.x.to_bits(), p.y.to_bits()))
            .collect::<HashSet<_>>();
        assert_eq!(distinct.len(), 6);
        for (i, a) in positions.iter().enumerate() {
            for b in positions.iter().skip(i + 1) {
                let dx = (a.x - b.x).abs();
                let dy = (a.y - b.y).abs();
                assert!(dx >= RANK_SEPARATION || dy >= NODE_SEPARATION);
            }
        }
    }

    #[test]
    fn cycles_and_dangling_edges_are_tolerated() {
        let nodes = nodes(3);
        let mut edges = vec![edge(1, 2), edge(2, 3), edge(3, 1), edge(2, 2)];
        edges.push(Edge::new("ghost", "1", "99", ConnectionKind::Data, "data"));

        let positions = hierarchical_layout(&nodes, &edges);

        assert_eq!(positions[0], Position::new(0.0, 0.0));
        assert_eq!(positions[1].x, RANK_SEPARATION);
        assert_eq!(positions[2].x, RANK_SEPARATION * 2.0);
    }

    #[test]
    fn apply_layout_overwrites_existing_positions() {
        let mut nodes = nodes(2);
        nodes[0].position = Position::new(512.0, -40.0);
        let edges = vec![edge(1, 2)];

        apply_layout(&mut nodes, &edges);

        assert_eq!(nodes[0].position, Position::new(0.0, 0.0));
        assert_eq!(nodes[1].position, Position::new(RANK_SEPARATION, 0.0));
    }
}
