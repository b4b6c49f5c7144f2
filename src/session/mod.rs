mod load;
mod save;

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use crate::layout::{RANK_SEPARATION, apply_layout};
use crate::topology::{
    ASSET_ID_KEY, AttrValue, AttributeError, Attributes, ConnectionKind, DerivedView, Edge,
    ID_KEY, IS_ONLINE_KEY, LABEL_KEY, Node, Position, SYSTEM_VERSION_KEY, Snapshot, recompute,
};

pub use load::{LoadError, load_snapshot};
pub use save::VersionCoordinator;

const NEW_NODE_PREFIX: &str = "new-";
const NEW_EDGE_PREFIX: &str = "e";
const NEW_DEVICE_LABEL: &str = "New Device";
const NEW_CONNECTION_LABEL: &str = "New Connection";
const COPY_SUFFIX: &str = " (copy)";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error(transparent)]
    Attribute(#[from] AttributeError),
    #[error("select a device or connection first")]
    NothingSelected,
    #[error("device `{0}` does not exist")]
    UnknownNode(String),
    #[error("connection `{0}` does not exist")]
    UnknownEdge(String),
    #[error("hover a device to duplicate it")]
    NoFocusedNode,
    #[error("device `{0}` cannot connect to itself")]
    SelfConnection(String),
    #[error("confirm or cancel the pending delete first")]
    ConfirmationPending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    NodeSelected,
    EdgeSelected,
    ConfirmingDelete,
}

/// Selection with the in-progress copy being edited. The snapshot is only touched on commit.
#[derive(Clone, Debug, PartialEq)]
enum Selection {
    Idle,
    Node(Node),
    Edge(Edge),
    ConfirmingDelete,
}

/// Editing state for one loaded (system, version).
///
/// Every committed mutation goes through this type and is followed by a full
/// [`recompute`], so `derived()` always matches `snapshot()`.
#[derive(Debug)]
pub struct EditingSession {
    snapshot: Snapshot,
    derived: DerivedView,
    selection: Selection,
    focused: Option<String>,
    heat_mode: bool,
    pub pending_property_name: String,
    revision: u64,
    saved_revision: u64,
}

impl EditingSession {
    pub fn new(snapshot: Snapshot) -> Self {
        let derived = recompute(&snapshot, false);
        Self {
            snapshot,
            derived,
            selection: Selection::Idle,
            focused: None,
            heat_mode: false,
            pending_property_name: String::new(),
            revision: 0,
            saved_revision: 0,
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn derived(&self) -> &DerivedView {
        &self.derived
    }

    pub fn state(&self) -> SessionState {
        match self.selection {
            Selection::Idle => SessionState::Idle,
            Selection::Node(_) => SessionState::NodeSelected,
            Selection::Edge(_) => SessionState::EdgeSelected,
            Selection::ConfirmingDelete => SessionState::ConfirmingDelete,
        }
    }

    /// The draft copy of the selected node.
    pub fn selected_node(&self) -> Option<&Node> {
        match &self.selection {
            Selection::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn selected_edge(&self) -> Option<&Edge> {
        match &self.selection {
            Selection::Edge(edge) => Some(edge),
            _ => None,
        }
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    pub fn heat_mode(&self) -> bool {
        self.heat_mode
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_dirty(&self) -> bool {
        self.revision != self.saved_revision
    }

    /// Marks the snapshot as persisted up to `revision`. Edits made after that revision stay dirty.
    pub fn mark_saved(&mut self, revision: u64) {
        self.saved_revision = revision.min(self.revision);
    }

    /// Copies the backend ids and version a save wrote back onto the snapshot and any open draft.
    ///
    /// Nodes removed while the save was in flight are skipped. The revision is left alone so the
    /// dirty state still follows `mark_saved`.
    pub fn apply_saved_ids(&mut self, assigned: &IndexMap<String, Value>, version: u32) {
        let version = AttrValue::Number(f64::from(version));
        let stamp = |attributes: &mut Attributes, id: Option<&Value>| {
            if let Some(id) = id.and_then(AttrValue::from_json) {
                attributes.insert(ID_KEY, id);
            }
            attributes.insert(SYSTEM_VERSION_KEY, version.clone());
        };

        for node in &mut self.snapshot.nodes {
            stamp(&mut node.attributes, assigned.get(&node.id));
        }
        for edge in &mut self.snapshot.edges {
            stamp(&mut edge.attributes, None);
        }
        match &mut self.selection {
            Selection::Node(draft) => stamp(&mut draft.attributes, assigned.get(&draft.id)),
            Selection::Edge(draft) => stamp(&mut draft.attributes, None),
            Selection::Idle | Selection::ConfirmingDelete => {}
        }

        self.derived = recompute(&self.snapshot, self.heat_mode);
    }

    pub fn select_node(&mut self, id: &str) -> Result<(), EditError> {
        self.ensure_not_confirming()?;
        let node = self
            .snapshot
            .node(id)
            .cloned()
            .ok_or_else(|| EditError::UnknownNode(id.to_owned()))?;

        self.pending_property_name.clear();
        self.selection = Selection::Node(node);
        Ok(())
    }

    pub fn select_edge(&mut self, id: &str) -> Result<(), EditError> {
        self.ensure_not_confirming()?;
        let edge = self
            .snapshot
            .edge(id)
            .cloned()
            .ok_or_else(|| EditError::UnknownEdge(id.to_owned()))?;

        self.pending_property_name.clear();
        self.selection = Selection::Edge(edge);
        Ok(())
    }

    /// Drops any selection (and its uncommitted draft) or cancels a pending delete.
    pub fn dismiss(&mut self) {
        self.selection = Selection::Idle;
        self.pending_property_name.clear();
    }

    pub fn request_delete(&mut self) {
        self.pending_property_name.clear();
        self.selection = Selection::ConfirmingDelete;
    }

    pub fn set_focus(&mut self, id: Option<&str>) {
        self.focused = id
            .filter(|id| self.snapshot.contains_node(id))
            .map(str::to_owned);
    }

    pub fn add_attribute(&mut self, name: &str, value: AttrValue) -> Result<(), EditError> {
        self.draft_attributes()?.add(name, value)?;
        self.pending_property_name.clear();
        Ok(())
    }

    pub fn remove_attribute(&mut self, name: &str) -> Result<Option<AttrValue>, EditError> {
        Ok(self.draft_attributes()?.remove(name)?)
    }

    pub fn update_attribute(&mut self, name: &str, value: AttrValue) -> Result<(), EditError> {
        self.draft_attributes()?.update(name, value)?;
        Ok(())
    }

    pub fn set_connection_kind(&mut self, kind: ConnectionKind) -> Result<(), EditError> {
        match &mut self.selection {
            Selection::Edge(edge) => {
                edge.kind = kind;
                Ok(())
            }
            _ => Err(EditError::NothingSelected),
        }
    }

    pub fn commit_node(&mut self) -> Result<(), EditError> {
        let Selection::Node(draft) = &self.selection else {
            return Err(EditError::NothingSelected);
        };
        let slot = self
            .snapshot
            .node_mut(&draft.id)
            .ok_or_else(|| EditError::UnknownNode(draft.id.clone()))?;

        *slot = draft.clone();
        tracing::debug!(node = %draft.id, "committed device edit");
        self.selection = Selection::Idle;
        self.pending_property_name.clear();
        self.touch();
        Ok(())
    }

    pub fn commit_edge(&mut self) -> Result<(), EditError> {
        let Selection::Edge(draft) = &self.selection else {
            return Err(EditError::NothingSelected);
        };
        let Some(slot) = self.snapshot.edges.iter_mut().find(|edge| edge.id == draft.id) else {
            return Err(EditError::UnknownEdge(draft.id.clone()));
        };

        *slot = draft.clone();
        tracing::debug!(edge = %draft.id, "committed connection edit");
        self.selection = Selection::Idle;
        self.pending_property_name.clear();
        self.touch();
        Ok(())
    }

    /// Removes the node and every edge touching it in one step.
    pub fn delete_node(&mut self, id: &str) -> Result<(), EditError> {
        let index = self
            .snapshot
            .nodes
            .iter()
            .position(|node| node.id == id)
            .ok_or_else(|| EditError::UnknownNode(id.to_owned()))?;

        self.snapshot.nodes.remove(index);
        let before = self.snapshot.edges.len();
        self.snapshot.edges.retain(|edge| !edge.touches(id));
        tracing::debug!(
            node = id,
            removed_edges = before - self.snapshot.edges.len(),
            "deleted device"
        );

        if self.focused.as_deref() == Some(id) {
            self.focused = None;
        }
        self.selection = Selection::Idle;
        self.pending_property_name.clear();
        self.touch();
        Ok(())
    }

    pub fn delete_edge(&mut self, id: &str) -> Result<(), EditError> {
        let index = self
            .snapshot
            .edges
            .iter()
            .position(|edge| edge.id == id)
            .ok_or_else(|| EditError::UnknownEdge(id.to_owned()))?;

        self.snapshot.edges.remove(index);
        tracing::debug!(edge = id, "deleted connection");
        self.selection = Selection::Idle;
        self.pending_property_name.clear();
        self.touch();
        Ok(())
    }

    /// Copies the hovered node one rank to the right. Incident edges are not copied.
    pub fn duplicate_node(&mut self) -> Result<String, EditError> {
        let source = self
            .focused
            .as_deref()
            .and_then(|id| self.snapshot.node(id))
            .ok_or(EditError::NoFocusedNode)?;

        let id = self
            .snapshot
            .fresh_id(NEW_NODE_PREFIX, self.snapshot.nodes.len() + 1);
        let mut attributes = source.attributes.clone();
        attributes.insert(
            LABEL_KEY,
            AttrValue::Text(format!("{}{COPY_SUFFIX}", source.label())),
        );
        let copy = Node {
            id: id.clone(),
            position: source.position.offset(RANK_SEPARATION, 0.0),
            attributes,
        };

        self.snapshot.nodes.push(copy);
        tracing::debug!(node = %id, "duplicated device");
        self.touch();
        Ok(id)
    }

    pub fn toggle_online(&mut self, id: &str) -> Result<bool, EditError> {
        let node = self
            .snapshot
            .node_mut(id)
            .ok_or_else(|| EditError::UnknownNode(id.to_owned()))?;

        let online = !node
            .attributes
            .get(IS_ONLINE_KEY)
            .and_then(AttrValue::as_bool)
            .unwrap_or(true);
        node.attributes.insert(IS_ONLINE_KEY, AttrValue::Bool(online));

        if let Selection::Node(draft) = &mut self.selection
            && draft.id == id
        {
            draft.attributes.insert(IS_ONLINE_KEY, AttrValue::Bool(online));
        }

        self.touch();
        Ok(online)
    }

    /// Display-only switch; the snapshot and revision are untouched.
    pub fn toggle_heat_mode(&mut self) {
        self.heat_mode = !self.heat_mode;
        self.derived = recompute(&self.snapshot, self.heat_mode);
    }

    pub fn add_device(&mut self, system_version: u32) -> String {
        let id = self
            .snapshot
            .fresh_id(NEW_NODE_PREFIX, self.snapshot.nodes.len() + 1);

        let mut node = Node::new(id.clone(), NEW_DEVICE_LABEL, Position::ORIGIN);
        node.attributes
            .insert(SYSTEM_VERSION_KEY, AttrValue::Number(f64::from(system_version)));
        node.attributes.insert(ASSET_ID_KEY, AttrValue::from(""));

        self.snapshot.nodes.push(node);
        tracing::debug!(node = %id, "added device");
        self.touch();
        id
    }

    pub fn connect(
        &mut self,
        source: &str,
        target: &str,
        kind: ConnectionKind,
    ) -> Result<String, EditError> {
        for endpoint in [source, target] {
            if !self.snapshot.contains_node(endpoint) {
                return Err(EditError::UnknownNode(endpoint.to_owned()));
            }
        }
        if source == target {
            return Err(EditError::SelfConnection(source.to_owned()));
        }

        let id = self
            .snapshot
            .fresh_id(NEW_EDGE_PREFIX, self.snapshot.edges.len() + 1);
        self.snapshot
            .edges
            .push(Edge::new(id.clone(), source, target, kind, NEW_CONNECTION_LABEL));
        tracing::debug!(edge = %id, source, target, "connected devices");
        self.touch();
        Ok(id)
    }

    /// Removes every edge between `a` and `b` in either direction.
    pub fn disconnect(&mut self, a: &str, b: &str) -> usize {
        let before = self.snapshot.edges.len();
        self.snapshot.edges.retain(|edge| !edge.connects(a, b));
        let removed = before - self.snapshot.edges.len();

        if removed > 0 {
            if matches!(&self.selection, Selection::Edge(draft) if draft.connects(a, b)) {
                self.selection = Selection::Idle;
            }
            self.touch();
        }
        removed
    }

    pub fn move_node(&mut self, id: &str, position: Position) -> Result<(), EditError> {
        let node = self
            .snapshot
            .node_mut(id)
            .ok_or_else(|| EditError::UnknownNode(id.to_owned()))?;
        if node.position == position {
            return Ok(());
        }

        node.position = position;
        if let Selection::Node(draft) = &mut self.selection
            && draft.id == id
        {
            draft.position = position;
        }
        self.touch();
        Ok(())
    }

    /// Lays out every node again, overwriting stored positions.
    pub fn auto_layout(&mut self) {
        apply_layout(&mut self.snapshot.nodes, &self.snapshot.edges);

        if let Selection::Node(draft) = &mut self.selection
            && let Some(node) = self.snapshot.nodes.iter().find(|node| node.id == draft.id)
        {
            draft.position = node.position;
        }
        tracing::debug!(nodes = self.snapshot.nodes.len(), "applied auto layout");
        self.touch();
    }

    fn draft_attributes(&mut self) -> Result<&mut Attributes, EditError> {
        match &mut self.selection {
            Selection::Node(node) => Ok(&mut node.attributes),
            Selection::Edge(edge) => Ok(&mut edge.attributes),
            Selection::ConfirmingDelete => Err(EditError::ConfirmationPending),
            Selection::Idle => Err(EditError::NothingSelected),
        }
    }

    fn ensure_not_confirming(&self) -> Result<(), EditError> {
        if self.selection == Selection::ConfirmingDelete {
            Err(EditError::ConfirmationPending)
        } else {
            Ok(())
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.derived = recompute(&self.snapshot, self.heat_mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{
        DEVICE_TYPE_KEY, ID_KEY, LinkStatus, SYSTEM_VERSION_KEY, is_locked_key,
    };

    fn device(id: &str, label: &str, kind: &str, online: bool) -> Node {
        let mut node = Node::new(id, label, Position::ORIGIN);
        node.attributes.insert(ID_KEY, AttrValue::Number(id.parse().unwrap_or(0.0)));
        node.attributes.insert(SYSTEM_VERSION_KEY, AttrValue::Number(1.0));
        node.attributes.insert(DEVICE_TYPE_KEY, AttrValue::from(kind));
        node.attributes.insert(IS_ONLINE_KEY, AttrValue::Bool(online));
        node
    }

    fn lab() -> EditingSession {
        let snapshot = Snapshot::new(
            vec![
                device("1", "switch", "switch", true),
                device("2", "web", "host", true),
                device("3", "db", "host", false),
            ],
            vec![
                Edge::new("e1", "1", "2", ConnectionKind::Ethernet, "ethernet"),
                Edge::new("e2", "1", "3", ConnectionKind::Data, "data"),
                Edge::new("e3", "3", "2", ConnectionKind::Sync, "sync"),
            ],
        )
        .unwrap();
        EditingSession::new(snapshot)
    }

    #[test]
    fn selection_is_single_and_dismissable() {
        let mut session = lab();
        assert_eq!(session.state(), SessionState::Idle);

        session.select_node("2").unwrap();
        assert_eq!(session.state(), SessionState::NodeSelected);
        session.select_edge("e1").unwrap();
        assert_eq!(session.state(), SessionState::EdgeSelected);
        assert!(session.selected_node().is_none());
        session.select_node("1").unwrap();
        assert_eq!(session.selected_node().map(|node| node.id.as_str()), Some("1"));

        session.dismiss();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(
            session.select_node("missing"),
            Err(EditError::UnknownNode("missing".to_owned()))
        );
    }

    #[test]
    fn attribute_edits_stay_in_draft_until_commit() {
        let mut session = lab();
        session.select_node("2").unwrap();
        session.add_attribute("Rack", AttrValue::from("A1")).unwrap();
        session
            .update_attribute(LABEL_KEY, AttrValue::from("web-primary"))
            .unwrap();

        assert_eq!(session.snapshot().node("2").unwrap().label(), "web");
        assert!(!session.is_dirty());

        session.commit_node().unwrap();
        let node = session.snapshot().node("2").unwrap();
        assert_eq!(node.label(), "web-primary");
        assert_eq!(node.attributes.iter().last().map(|(key, _)| key), Some("Rack"));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.is_dirty());
    }

    #[test]
    fn dismiss_discards_the_draft() {
        let mut session = lab();
        let before = session.snapshot().clone();
        session.select_edge("e1").unwrap();
        session.update_attribute(LABEL_KEY, AttrValue::from("uplink")).unwrap();
        session.dismiss();

        assert_eq!(session.snapshot(), &before);
    }

    #[test]
    fn rejected_edits_leave_everything_unchanged() {
        let mut session = lab();
        let before = session.snapshot().clone();
        session.select_node("1").unwrap();
        let draft = session.selected_node().cloned();

        assert_eq!(
            session.add_attribute("", AttrValue::from("x")),
            Err(EditError::Attribute(AttributeError::EmptyName))
        );
        assert_eq!(
            session.add_attribute("DeviceType", AttrValue::from("x")),
            Err(EditError::Attribute(AttributeError::Duplicate(
                "DeviceType".to_owned()
            )))
        );
        for key in [ID_KEY, SYSTEM_VERSION_KEY] {
            assert!(is_locked_key(key));
            assert_eq!(
                session.update_attribute(key, AttrValue::from("9")),
                Err(EditError::Attribute(AttributeError::Protected(key.to_owned())))
            );
            assert_eq!(
                session.remove_attribute(key),
                Err(EditError::Attribute(AttributeError::Protected(key.to_owned())))
            );
        }

        assert_eq!(session.selected_node().cloned(), draft);
        assert_eq!(session.snapshot(), &before);
    }

    #[test]
    fn attribute_edits_need_a_selection() {
        let mut session = lab();
        assert_eq!(
            session.add_attribute("x", AttrValue::from("y")),
            Err(EditError::NothingSelected)
        );
        assert_eq!(session.commit_node(), Err(EditError::NothingSelected));

        session.request_delete();
        assert_eq!(
            session.remove_attribute("x"),
            Err(EditError::ConfirmationPending)
        );
        assert_eq!(session.select_node("1"), Err(EditError::ConfirmationPending));
        session.dismiss();
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn add_then_remove_round_trips_on_the_draft() {
        let mut session = lab();
        session.select_edge("e2").unwrap();
        let before = session.selected_edge().cloned();

        session.add_attribute("Vlan", AttrValue::from("20")).unwrap();
        session.remove_attribute("Vlan").unwrap();

        assert_eq!(session.selected_edge().cloned(), before);
    }

    #[test]
    fn delete_node_cascades_to_incident_edges() {
        let mut session = lab();
        session.select_node("3").unwrap();

        session.delete_node("3").unwrap();

        let snapshot = session.snapshot();
        assert!(snapshot.node("3").is_none());
        assert!(snapshot.edges.iter().all(|edge| !edge.touches("3")));
        assert_eq!(snapshot.edges.len(), 1);
        assert!(snapshot.validate().is_ok());
        assert_eq!(session.derived().edges.len(), 1);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn delete_edge_removes_only_that_edge() {
        let mut session = lab();
        session.delete_edge("e2").unwrap();

        assert_eq!(session.snapshot().edges.len(), 2);
        assert!(session.snapshot().edge("e2").is_none());
        assert_eq!(
            session.delete_edge("e2"),
            Err(EditError::UnknownEdge("e2".to_owned()))
        );
    }

    #[test]
    fn duplicate_requires_focus_and_copies_without_edges() {
        let mut session = lab();
        assert_eq!(session.duplicate_node(), Err(EditError::NoFocusedNode));

        session.add_device(1);
        let router_id = session.snapshot().nodes.last().unwrap().id.clone();
        session.select_node(&router_id).unwrap();
        session.update_attribute(LABEL_KEY, AttrValue::from("Router")).unwrap();
        session.commit_node().unwrap();
        session
            .move_node(&router_id, Position::new(100.0, 100.0))
            .unwrap();

        session.set_focus(Some(&router_id));
        let copy_id = session.duplicate_node().unwrap();

        let copy = session.snapshot().node(&copy_id).unwrap();
        assert_ne!(copy_id, router_id);
        assert_eq!(copy.label(), "Router (copy)");
        assert_eq!(copy.position, Position::new(100.0 + RANK_SEPARATION, 100.0));
        assert_eq!(session.snapshot().incident_edges(&copy_id).count(), 0);
        assert!(session.derived().node(&copy_id).is_some());
    }

    #[test]
    fn toggle_online_rederives_node_and_edges() {
        let mut session = lab();
        assert_eq!(
            session.derived().edge("e2").unwrap().status,
            LinkStatus::Down
        );

        session.select_node("3").unwrap();
        let online = session.toggle_online("3").unwrap();

        assert!(online);
        assert!(session.derived().node("3").unwrap().online);
        assert_eq!(session.derived().edge("e2").unwrap().status, LinkStatus::Up);
        assert_eq!(
            session.selected_node().unwrap().attributes.get(IS_ONLINE_KEY),
            Some(&AttrValue::Bool(true))
        );
    }

    #[test]
    fn heat_mode_does_not_touch_the_snapshot() {
        let mut session = lab();
        let before = session.snapshot().clone();

        session.toggle_heat_mode();

        assert!(session.heat_mode());
        assert!(session.derived().heat_mode);
        assert_eq!(session.snapshot(), &before);
        assert!(!session.is_dirty());
    }

    #[test]
    fn connect_and_disconnect() {
        let mut session = lab();
        assert_eq!(
            session.connect("2", "2", ConnectionKind::Power),
            Err(EditError::SelfConnection("2".to_owned()))
        );
        assert_eq!(
            session.connect("2", "9", ConnectionKind::Power),
            Err(EditError::UnknownNode("9".to_owned()))
        );

        let id = session.connect("2", "1", ConnectionKind::Power).unwrap();
        assert_eq!(id, "e4");
        assert_eq!(session.snapshot().edge(&id).unwrap().label(), "New Connection");
        assert!(session.derived().edge(&id).is_some());

        assert_eq!(session.disconnect("1", "2"), 2);
        assert_eq!(session.disconnect("1", "2"), 0);
        assert!(session.snapshot().validate().is_ok());
    }

    #[test]
    fn add_device_locks_system_version() {
        let mut session = lab();
        let id = session.add_device(4);

        let node = session.snapshot().node(&id).unwrap();
        assert_eq!(id, "new-4");
        assert_eq!(node.label(), "New Device");
        assert_eq!(node.position, Position::ORIGIN);
        assert_eq!(
            node.attributes.get(SYSTEM_VERSION_KEY),
            Some(&AttrValue::Number(4.0))
        );
        assert_eq!(node.attributes.get(ASSET_ID_KEY), Some(&AttrValue::from("")));
    }

    #[test]
    fn auto_layout_overwrites_positions() {
        let mut session = lab();
        session.move_node("2", Position::new(-500.0, 900.0)).unwrap();

        session.auto_layout();
        let first = session.snapshot().clone();
        session.auto_layout();

        assert_eq!(session.snapshot(), &first);
        assert_eq!(session.snapshot().node("1").unwrap().position.x, 0.0);
        assert_ne!(
            session.snapshot().node("2").unwrap().position,
            Position::new(-500.0, 900.0)
        );
    }

    #[test]
    fn dirty_tracking_follows_saved_revision() {
        let mut session = lab();
        session.add_device(1);
        let saved_at = session.revision();
        session.add_device(1);

        session.mark_saved(saved_at);
        assert!(session.is_dirty());
        session.mark_saved(session.revision());
        assert!(!session.is_dirty());
    }
}
