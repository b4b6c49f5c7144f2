use std::ops::RangeInclusive;

use crate::store::{PersistenceError, SaveRequest, SaveResponse, TopologyBackend};

use super::EditingSession;

/// Tracks which version is open and which is the latest one the backend knows of.
///
/// The open version only moves forward after the backend acknowledges a save.
#[derive(Clone, Debug)]
pub struct VersionCoordinator {
    system_id: String,
    system_name: String,
    version: u32,
    latest: u32,
}

impl VersionCoordinator {
    pub fn new(
        system_id: impl Into<String>,
        system_name: impl Into<String>,
        version: u32,
        latest: u32,
    ) -> Self {
        Self {
            system_id: system_id.into(),
            system_name: system_name.into(),
            version,
            latest: latest.max(version),
        }
    }

    pub fn system_id(&self) -> &str {
        &self.system_id
    }

    pub fn system_name(&self) -> &str {
        &self.system_name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn latest(&self) -> u32 {
        self.latest
    }

    /// Versions selectable in the editor, oldest first.
    pub fn versions(&self) -> RangeInclusive<u32> {
        1..=self.latest
    }

    /// Only the latest version can be saved; older ones are read for comparison.
    pub fn can_save(&self) -> bool {
        self.version == self.latest
    }

    pub fn save_request(&self, session: &EditingSession) -> SaveRequest {
        let snapshot = session.snapshot();
        SaveRequest {
            version: self.version,
            devices: snapshot.nodes.clone(),
            connections: snapshot.edges.clone(),
        }
    }

    /// Applies the outcome of a save that was built at `revision`.
    ///
    /// On success the editor moves to `version + 1`, the session picks up the backend ids the save
    /// assigned and is marked clean up to `revision`. On failure nothing changes and the edits
    /// stay dirty.
    pub fn finish_save(
        &mut self,
        result: Result<SaveResponse, PersistenceError>,
        session: &mut EditingSession,
        revision: u64,
    ) -> Result<u32, PersistenceError> {
        match result {
            Ok(response) => {
                let next = self.version + 1;
                if response.new_version != next {
                    tracing::warn!(
                        system = %self.system_id,
                        expected = next,
                        reported = response.new_version,
                        "backend reported an unexpected version after save"
                    );
                }

                self.version = next;
                self.latest = self.latest.max(next);
                session.apply_saved_ids(&response.assigned_ids, next);
                session.mark_saved(revision);
                tracing::info!(system = %self.system_id, version = next, "saved topology");
                Ok(next)
            }
            Err(error) => {
                tracing::warn!(
                    system = %self.system_id,
                    version = self.version,
                    %error,
                    "save failed, keeping local edits"
                );
                Err(error)
            }
        }
    }

    pub fn delete(&self, backend: &dyn TopologyBackend) -> Result<(), PersistenceError> {
        backend.delete_system(&self.system_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::session::load_snapshot;
    use crate::store::{ConnectionRecord, DeviceRecord, JsonStore, SystemSummary};
    use crate::topology::{
        AttrValue, ConnectionKind, Edge, ID_KEY, Node, Position, SYSTEM_VERSION_KEY, Snapshot,
    };

    /// Backend double that records save requests and can be told to fail.
    #[derive(Default)]
    struct FakeBackend {
        fail: bool,
        report: Option<u32>,
        saves: Mutex<Vec<SaveRequest>>,
    }

    impl TopologyBackend for FakeBackend {
        fn list_systems(&self) -> Result<Vec<SystemSummary>, PersistenceError> {
            Ok(Vec::new())
        }

        fn list_devices(&self, _: &str, _: u32) -> Result<Vec<DeviceRecord>, PersistenceError> {
            Ok(Vec::new())
        }

        fn list_connections(&self, _: &str, _: u32) -> Result<Vec<ConnectionRecord>, PersistenceError> {
            Ok(Vec::new())
        }

        fn save_graph(&self, _: &str, request: &SaveRequest) -> Result<SaveResponse, PersistenceError> {
            self.saves.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(PersistenceError::Rejected("backend unavailable".to_owned()));
            }
            Ok(SaveResponse {
                new_version: self.report.unwrap_or(request.version + 1),
                ..SaveResponse::default()
            })
        }

        fn rename_system(&self, _: &str, _: &str) -> Result<(), PersistenceError> {
            Ok(())
        }

        fn delete_system(&self, _: &str) -> Result<(), PersistenceError> {
            Ok(())
        }
    }

    fn save(
        coordinator: &mut VersionCoordinator,
        backend: &dyn TopologyBackend,
        session: &mut EditingSession,
    ) -> Result<u32, PersistenceError> {
        let request = coordinator.save_request(session);
        let revision = session.revision();
        let result = backend.save_graph(coordinator.system_id(), &request);
        coordinator.finish_save(result, session, revision)
    }

    fn session() -> EditingSession {
        let snapshot = Snapshot::new(
            vec![
                Node::new("1", "router", Position::ORIGIN),
                Node::new("2", "host", Position::new(300.0, 0.0)),
            ],
            vec![Edge::new("e1", "1", "2", ConnectionKind::Network, "uplink")],
        )
        .unwrap();
        EditingSession::new(snapshot)
    }

    #[test]
    fn successful_save_advances_the_version() {
        let backend = FakeBackend::default();
        let mut coordinator = VersionCoordinator::new("7", "lab", 2, 2);
        let mut session = session();
        session.add_device(2);

        let version = save(&mut coordinator, &backend, &mut session).unwrap();

        assert_eq!(version, 3);
        assert_eq!(coordinator.version(), 3);
        assert_eq!(coordinator.latest(), 3);
        assert!(!session.is_dirty());

        let saves = backend.saves.lock().unwrap();
        assert_eq!(saves[0].version, 2);
        assert_eq!(saves[0].devices.len(), 3);
        assert_eq!(saves[0].connections.len(), 1);
    }

    #[test]
    fn failed_save_keeps_version_and_edits() {
        let mut coordinator = VersionCoordinator::new("7", "lab", 2, 2);
        let mut session = session();
        save(&mut coordinator, &FakeBackend::default(), &mut session).unwrap();
        assert_eq!(coordinator.version(), 3);

        session.add_device(3);
        let snapshot = session.snapshot().clone();
        let failing = FakeBackend {
            fail: true,
            ..FakeBackend::default()
        };

        let result = save(&mut coordinator, &failing, &mut session);

        assert!(matches!(result, Err(PersistenceError::Rejected(_))));
        assert_eq!(coordinator.version(), 3);
        assert!(session.is_dirty());
        assert_eq!(session.snapshot(), &snapshot);
    }

    #[test]
    fn edits_made_while_saving_stay_dirty() {
        let mut coordinator = VersionCoordinator::new("7", "lab", 1, 1);
        let mut session = session();
        session.add_device(1);

        let request = coordinator.save_request(&session);
        let revision = session.revision();
        session.add_device(1);
        let result = FakeBackend::default().save_graph("7", &request);
        coordinator.finish_save(result, &mut session, revision).unwrap();

        assert!(session.is_dirty());
        assert_eq!(coordinator.version(), 2);
    }

    #[test]
    fn unexpected_backend_version_is_not_trusted() {
        let backend = FakeBackend {
            report: Some(42),
            ..FakeBackend::default()
        };
        let mut coordinator = VersionCoordinator::new("7", "lab", 4, 4);

        assert_eq!(save(&mut coordinator, &backend, &mut session()).unwrap(), 5);
    }

    #[test]
    fn added_device_keeps_its_backend_id_across_saves() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        let system = store.seed_demo().unwrap().unwrap();
        let mut session = EditingSession::new(load_snapshot(&store, &system, 1).unwrap());
        let mut coordinator = VersionCoordinator::new(system.as_str(), "Demo lab", 1, 1);

        let added = session.add_device(1);
        session.select_node(&added).unwrap();
        save(&mut coordinator, &store, &mut session).unwrap();

        let assigned = AttrValue::Number(4.0);
        assert_eq!(session.snapshot().node(&added).unwrap().attributes.get(ID_KEY), Some(&assigned));
        assert_eq!(session.selected_node().unwrap().attributes.get(ID_KEY), Some(&assigned));
        assert_eq!(
            session.snapshot().edges[0].attributes.get(SYSTEM_VERSION_KEY),
            Some(&AttrValue::Number(2.0))
        );
        assert!(!session.is_dirty());

        session.commit_node().unwrap();
        session.move_node(&added, Position::new(80.0, 80.0)).unwrap();
        save(&mut coordinator, &store, &mut session).unwrap();

        let ids = |version| {
            load_snapshot(&store, &system, version)
                .unwrap()
                .nodes
                .iter()
                .map(|node| node.attributes.get(ID_KEY).cloned())
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(2), ids(3));
        assert_eq!(ids(3).len(), 4);
        assert_eq!(ids(3)[3], Some(assigned));
    }

    #[test]
    fn delete_goes_to_the_backend() {
        let coordinator = VersionCoordinator::new("7", "lab", 1, 1);
        assert!(coordinator.delete(&FakeBackend::default()).is_ok());
    }

    #[test]
    fn older_versions_are_read_only() {
        let coordinator = VersionCoordinator::new("7", "lab", 2, 5);

        assert!(!coordinator.can_save());
        assert_eq!(coordinator.versions().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    }
}
