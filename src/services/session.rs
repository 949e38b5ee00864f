//! The working copy of one project.
//!
//! Every mutation is applied locally first, then sent to the collaborator
//! that owns persistence. Whatever the outcome of that call, the refresh
//! counter moves, and the next [`Session::sync`] replaces the local state
//! with the collaborator's. A rejected request therefore rolls back on the
//! next sync.

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::models::board::{BoardColumn, BoardPosition, find_task};
use crate::models::catalog::ServiceCatalog;
use crate::models::node::{NodeId, WbsNode};
use crate::models::patch::{BoardMoveRequest, MoveRequest, NodePatch};
use crate::models::snapshot::Snapshot;
use crate::services::board;
use crate::services::codes;
use crate::services::dependencies::{self, DateShift, DependencyError};
use crate::services::mutator::{self, MoveError};
use crate::services::normalizer::{PriorityNormalizer, StatusNormalizer};
use crate::services::scheduler::{DependencyScheduler, Schedule};
use crate::services::service_hours::derive_service_hours;
use crate::services::tree;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// The persistence side of a session. Requests mirror the backend's REST
/// calls; `fetch` returns flat records.
pub trait Collaborator {
    fn fetch(&self) -> Result<Snapshot, CollaboratorError>;
    fn move_node(&self, node_id: &str, request: &MoveRequest) -> Result<(), CollaboratorError>;
    fn update_node(&self, node_id: &str, patch: &NodePatch) -> Result<(), CollaboratorError>;
    fn reorder_siblings(&self, parent_id: Option<&str>, ordered_ids: &[NodeId]) -> Result<(), CollaboratorError>;
    fn move_board_task(&self, task_id: &str, request: &BoardMoveRequest) -> Result<(), CollaboratorError>;
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("Node '{0}' not found")]
    UnknownNode(NodeId),

    #[error(transparent)]
    Move(#[from] MoveError),

    #[error(transparent)]
    Dependency(#[from] DependencyError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

/// Monotonic counter whose change is the only trigger for a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct RefreshCounter(u64);

impl RefreshCounter {
    pub fn bump(&mut self) {
        self.0 += 1;
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

pub struct Session<C: Collaborator> {
    collaborator: C,
    statuses: StatusNormalizer,
    priorities: PriorityNormalizer,
    scheduler: DependencyScheduler,
    forest: Vec<WbsNode>,
    board: Vec<BoardColumn>,
    catalog: ServiceCatalog,
    selection: Option<NodeId>,
    refresh: RefreshCounter,
    synced: Option<RefreshCounter>,
}

impl<C: Collaborator> Session<C> {
    pub fn new(
        collaborator: C,
        statuses: StatusNormalizer,
        priorities: PriorityNormalizer,
        scheduler: DependencyScheduler,
    ) -> Self {
        Self {
            collaborator,
            statuses,
            priorities,
            scheduler,
            forest: Vec::new(),
            board: Vec::new(),
            catalog: ServiceCatalog::default(),
            selection: None,
            refresh: RefreshCounter::default(),
            synced: None,
        }
    }

    /// A session with its first state already fetched.
    pub fn open(
        collaborator: C,
        statuses: StatusNormalizer,
        priorities: PriorityNormalizer,
        scheduler: DependencyScheduler,
    ) -> Result<Self, CollaboratorError> {
        let mut session = Self::new(collaborator, statuses, priorities, scheduler);
        session.sync()?;
        Ok(session)
    }

    pub fn forest(&self) -> &[WbsNode] {
        &self.forest
    }

    pub fn board(&self) -> &[BoardColumn] {
        &self.board
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    pub fn statuses(&self) -> &StatusNormalizer {
        &self.statuses
    }

    pub fn priorities(&self) -> &PriorityNormalizer {
        &self.priorities
    }

    pub fn scheduler(&self) -> &DependencyScheduler {
        &self.scheduler
    }

    pub fn collaborator(&self) -> &C {
        &self.collaborator
    }

    pub fn refresh_count(&self) -> u64 {
        self.refresh.value()
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    /// Select a node present in the current forest; anything else clears
    /// the selection.
    pub fn select(&mut self, node_id: Option<&str>) -> bool {
        self.selection = node_id
            .filter(|id| tree::contains(&self.forest, id))
            .map(String::from);
        self.selection.is_some()
    }

    pub fn find(&self, node_id: &str) -> Option<&WbsNode> {
        tree::find(&self.forest, node_id)
    }

    /// Ask for a rebuild on the next [`Session::sync`].
    pub fn refresh(&mut self) {
        self.refresh.bump();
    }

    /// Re-fetch and rebuild when the refresh counter moved since the last
    /// rebuild. Returns whether a rebuild happened.
    #[instrument(skip_all, fields(refresh = self.refresh.value()))]
    pub fn sync(&mut self) -> Result<bool, CollaboratorError> {
        if self.synced == Some(self.refresh) {
            return Ok(false);
        }

        let snapshot = self.collaborator.fetch()?;
        self.forest = tree::build(snapshot.nodes);
        self.board = if snapshot.board.is_empty() {
            board::project_board(&self.forest, &self.statuses)
        } else {
            snapshot.board
        };
        self.catalog = snapshot.catalog;
        self.synced = Some(self.refresh);

        if let Some(selected) = &self.selection
            && !tree::contains(&self.forest, selected)
        {
            debug!(node = %selected, "selected node vanished, clearing selection");
            self.selection = None;
        }

        debug!(nodes = tree::count(&self.forest), "working copy rebuilt");
        Ok(true)
    }

    fn settle(&mut self, operation: &str, result: Result<(), CollaboratorError>) -> Result<(), UpdateError> {
        self.refresh.bump();
        if let Err(err) = &result {
            warn!(operation, %err, "collaborator call failed, local changes will be discarded");
        }
        result.map_err(UpdateError::from)
    }

    /// Reparent a node. Invalid moves are reported and change nothing.
    #[instrument(skip(self))]
    pub fn move_node(&mut self, node_id: &str, parent_id: Option<&str>, position: usize) -> Result<(), UpdateError> {
        self.forest = mutator::try_move(&self.forest, node_id, parent_id, position)?;

        let request = MoveRequest {
            parent_id: parent_id.map(String::from),
            order: position,
        };
        let result = self.collaborator.move_node(node_id, &request);
        self.settle("move_node", result)
    }

    /// Dates and effort the node would get from its dependencies.
    pub fn schedule_preview(&self, node_id: &str) -> Option<Schedule> {
        let node = self.find(node_id)?;
        self.scheduler.schedule(&self.forest, &node.dependencies, node)
    }

    /// Complete a user edit with everything derived from it and send it.
    ///
    /// Dependencies are validated; a dependency schedule fills in dates
    /// unless the edit set one; dates without an estimate yield an
    /// estimate; a catalog or multiplier change yields service hours.
    /// Returns the patch that was sent.
    #[instrument(skip(self, changes))]
    pub fn update_node(&mut self, node_id: &str, mut changes: NodePatch) -> Result<NodePatch, UpdateError> {
        let node = self
            .find(node_id)
            .cloned()
            .ok_or_else(|| UpdateError::UnknownNode(node_id.to_string()))?;

        if let Some(requested) = &changes.dependencies {
            let accepted = dependencies::validate_dependencies(&self.forest, node_id, requested)?;
            changes.dependencies = Some(accepted);
        }

        if let Some(dependencies) = &changes.dependencies
            && !changes.has_explicit_dates()
        {
            let mut target = node.clone();
            changes.apply_to(&mut target);
            if let Some(schedule) = self.scheduler.schedule(&self.forest, dependencies, &target) {
                changes.start_date = Some(Some(schedule.start_date));
                changes.end_date = Some(Some(schedule.end_date));
                if changes.estimate_hours.is_none() {
                    changes.estimate_hours = Some(Some(schedule.estimate_hours));
                }
            }
        }

        if (changes.start_date.is_some() || changes.end_date.is_some()) && changes.estimate_hours.is_none() {
            let mut target = node.clone();
            changes.apply_to(&mut target);
            if let Some(hours) = self.scheduler.estimate_for_dates(target.start_date, target.end_date) {
                changes.estimate_hours = Some(Some(hours));
            }
        }

        derive_service_hours(&self.catalog, &node, &mut changes);

        if changes.is_empty() {
            debug!("nothing to update");
            return Ok(changes);
        }

        self.forest = mutator::patch(&self.forest, node_id, &changes);
        self.refresh_card(node_id);

        let result = self.collaborator.update_node(node_id, &changes);
        self.settle("update_node", result)?;
        Ok(changes)
    }

    /// Duration edit: effort and, for started nodes, end date follow the
    /// new day count.
    pub fn set_duration(&mut self, node_id: &str, days: i64) -> Result<NodePatch, UpdateError> {
        let node = self
            .find(node_id)
            .ok_or_else(|| UpdateError::UnknownNode(node_id.to_string()))?;
        let changes = self.scheduler.duration_change(node, days);
        self.update_node(node_id, changes)
    }

    /// Keep the node's card in the column of its status.
    fn refresh_card(&mut self, node_id: &str) {
        if let Some(node) = tree::find(&self.forest, node_id) {
            self.board = board::refresh_card(&self.board, node, &self.statuses);
        }
    }

    /// Reschedule everything downstream of `node_id` and send the shifted
    /// dates.
    #[instrument(skip(self))]
    pub fn propagate(&mut self, node_id: &str) -> Result<Vec<DateShift>, UpdateError> {
        if !tree::contains(&self.forest, node_id) {
            return Err(UpdateError::UnknownNode(node_id.to_string()));
        }
        let propagation = dependencies::propagate_dates(&self.forest, &[node_id.to_string()], &self.scheduler)?;
        if propagation.shifts.is_empty() {
            return Ok(propagation.shifts);
        }

        self.forest = propagation.forest;
        for shift in &propagation.shifts {
            self.refresh_card(&shift.id);
        }
        let mut result = Ok(());
        for shift in &propagation.shifts {
            result = self.collaborator.update_node(&shift.id, &shift.to_patch());
            if result.is_err() {
                break;
            }
        }
        self.settle("propagate", result)?;
        Ok(propagation.shifts)
    }

    /// Recompute every code from tree position and send the ones that
    /// changed. Returns how many changed.
    pub fn renumber(&mut self) -> Result<usize, UpdateError> {
        let changed: Vec<_> = codes::code_assignments(&self.forest)
            .into_iter()
            .filter(|assignment| {
                tree::find(&self.forest, &assignment.id)
                    .is_some_and(|node| node.wbs_code.as_deref() != Some(assignment.code.as_str()))
            })
            .collect();
        if changed.is_empty() {
            return Ok(0);
        }

        self.forest = codes::assign_codes(&self.forest);
        let mut result = Ok(());
        for assignment in &changed {
            let patch = NodePatch {
                wbs_code: Some(Some(assignment.code.clone())),
                ..NodePatch::default()
            };
            result = self.collaborator.update_node(&assignment.id, &patch);
            if result.is_err() {
                break;
            }
        }
        self.settle("renumber", result)?;
        Ok(changed.len())
    }

    pub fn reorder_siblings(&mut self, parent_id: Option<&str>, ordered_ids: &[NodeId]) -> Result<(), UpdateError> {
        if let Some(parent_id) = parent_id
            && !tree::contains(&self.forest, parent_id)
        {
            return Err(UpdateError::UnknownNode(parent_id.to_string()));
        }
        self.forest = mutator::reorder_siblings(&self.forest, parent_id, ordered_ids);
        let result = self.collaborator.reorder_siblings(parent_id, ordered_ids);
        self.settle("reorder_siblings", result)
    }

    /// Drag a card between positions. A drop that changes nothing sends
    /// nothing. The card's new status is mirrored on the node.
    #[instrument(skip(self))]
    pub fn move_board_task(
        &mut self,
        task_id: &str,
        from: &BoardPosition,
        to: &BoardPosition,
        status: Option<&str>,
    ) -> Result<bool, UpdateError> {
        let next = board::reorder(&self.board, from, to, task_id, status, &self.statuses);
        if next == self.board {
            return Ok(false);
        }
        let Some((position, card)) = find_task(&next, task_id) else {
            return Ok(false);
        };

        let request = BoardMoveRequest {
            column_id: position.column_id.clone(),
            status: card.status,
            order: position.index,
        };
        let node_patch = NodePatch {
            status: Some(card.status),
            ..NodePatch::default()
        };
        self.forest = mutator::patch(&self.forest, task_id, &node_patch);
        self.board = next;

        let result = self.collaborator.move_board_task(task_id, &request);
        self.settle("move_board_task", result)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use jiff::civil::date;

    use super::*;
    use crate::models::catalog::ServiceCatalogEntry;
    use crate::models::status::Status;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Move(String, MoveRequest),
        Update(String, NodePatch),
        Reorder(Option<String>, Vec<NodeId>),
        Board(String, BoardMoveRequest),
    }

    #[derive(Default)]
    struct FakeBackend {
        snapshot: RefCell<Snapshot>,
        calls: RefCell<Vec<Call>>,
        fetches: Cell<usize>,
        reject: Cell<bool>,
    }

    impl FakeBackend {
        fn answer(&self, call: Call) -> Result<(), CollaboratorError> {
            self.calls.borrow_mut().push(call);
            if self.reject.get() {
                Err(CollaboratorError::Rejected("backend says no".into()))
            } else {
                Ok(())
            }
        }
    }

    impl Collaborator for FakeBackend {
        fn fetch(&self) -> Result<Snapshot, CollaboratorError> {
            self.fetches.set(self.fetches.get() + 1);
            Ok(self.snapshot.borrow().clone())
        }

        fn move_node(&self, node_id: &str, request: &MoveRequest) -> Result<(), CollaboratorError> {
            self.answer(Call::Move(node_id.into(), request.clone()))
        }

        fn update_node(&self, node_id: &str, patch: &NodePatch) -> Result<(), CollaboratorError> {
            self.answer(Call::Update(node_id.into(), patch.clone()))
        }

        fn reorder_siblings(&self, parent_id: Option<&str>, ordered_ids: &[NodeId]) -> Result<(), CollaboratorError> {
            self.answer(Call::Reorder(parent_id.map(String::from), ordered_ids.to_vec()))
        }

        fn move_board_task(&self, task_id: &str, request: &BoardMoveRequest) -> Result<(), CollaboratorError> {
            self.answer(Call::Board(task_id.into(), request.clone()))
        }
    }

    fn coded(id: &str, code: &str) -> WbsNode {
        WbsNode {
            wbs_code: Some(code.into()),
            ..WbsNode::new(id, id.to_uppercase())
        }
    }

    fn backend() -> FakeBackend {
        let mut dep = coded("dep", "2");
        dep.end_date = Some(date(2024, 1, 10));
        let snapshot = Snapshot {
            nodes: vec![coded("a", "1"), coded("a1", "1.1"), dep, coded("b", "3")],
            catalog: ServiceCatalog::new(vec![ServiceCatalogEntry {
                id: "s1".into(),
                hours_base: Some(10.0),
                ..ServiceCatalogEntry::default()
            }]),
            ..Snapshot::default()
        };
        FakeBackend {
            snapshot: RefCell::new(snapshot),
            ..FakeBackend::default()
        }
    }

    fn open(backend: FakeBackend) -> Session<FakeBackend> {
        Session::open(
            backend,
            StatusNormalizer::default(),
            PriorityNormalizer::default(),
            DependencyScheduler::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_open_builds_forest_and_board() {
        let session = open(backend());

        assert_eq!(tree::count(session.forest()), 4);
        assert!(tree::find(session.forest(), "a").unwrap().children.len() == 1);
        assert_eq!(session.board().len(), 8);
        assert_eq!(session.board()[0].tasks.len(), 4);
    }

    #[test]
    fn test_sync_only_after_refresh() {
        let mut session = open(backend());
        assert!(!session.sync().unwrap());
        assert_eq!(session.collaborator().fetches.get(), 1);

        session.refresh();
        assert!(session.sync().unwrap());
        assert_eq!(session.collaborator().fetches.get(), 2);
    }

    #[test]
    fn test_move_is_optimistic_and_bumps_counter() {
        let mut session = open(backend());
        session.move_node("a1", Some("b"), 0).unwrap();

        assert_eq!(tree::find(session.forest(), "b").unwrap().children[0].id, "a1");
        assert_eq!(session.refresh_count(), 1);
        assert_eq!(
            session.collaborator().calls.borrow()[0],
            Call::Move(
                "a1".into(),
                MoveRequest {
                    parent_id: Some("b".into()),
                    order: 0
                }
            )
        );
    }

    #[test]
    fn test_failed_request_rolls_back_on_sync() {
        let mut session = open(backend());
        session.collaborator().reject.set(true);

        let result = session.move_node("a1", None, 0);
        assert!(matches!(result, Err(UpdateError::Collaborator(_))));
        assert_eq!(session.refresh_count(), 1);
        assert_eq!(session.forest()[0].id, "a1");

        assert!(session.sync().unwrap());
        assert_eq!(tree::find(session.forest(), "a").unwrap().children[0].id, "a1");
    }

    #[test]
    fn test_invalid_move_sends_nothing() {
        let mut session = open(backend());
        let result = session.move_node("a", Some("a1"), 0);

        assert!(matches!(result, Err(UpdateError::Move(MoveError::WouldCreateCycle { .. }))));
        assert!(session.collaborator().calls.borrow().is_empty());
        assert_eq!(session.refresh_count(), 0);
    }

    #[test]
    fn test_selection_cleared_when_node_vanishes() {
        let mut session = open(backend());
        assert!(session.select(Some("b")));
        assert!(!session.select(Some("ghost")));
        assert_eq!(session.selection(), None);

        session.select(Some("b"));
        session.collaborator().snapshot.borrow_mut().nodes.retain(|n| n.id != "b");
        session.refresh();
        session.sync().unwrap();
        assert_eq!(session.selection(), None);
    }

    #[test]
    fn test_update_merges_dependency_schedule() {
        let mut session = open(backend());
        let changes = NodePatch {
            dependencies: Some(vec!["dep".into(), "dep".into(), "ghost".into()]),
            estimate_hours: Some(Some(16.0)),
            ..NodePatch::default()
        };

        let sent = session.update_node("b", changes).unwrap();

        assert_eq!(sent.dependencies, Some(vec!["dep".to_string()]));
        assert_eq!(sent.start_date, Some(Some(date(2024, 1, 11))));
        assert_eq!(sent.end_date, Some(Some(date(2024, 1, 12))));
        assert_eq!(sent.estimate_hours, Some(Some(16.0)));
        let b = session.find("b").unwrap();
        assert_eq!(b.start_date, Some(date(2024, 1, 11)));
        assert!(matches!(&session.collaborator().calls.borrow()[0], Call::Update(id, _) if id == "b"));
    }

    #[test]
    fn test_explicit_dates_win_and_derive_estimate() {
        let mut session = open(backend());
        let changes = NodePatch {
            dependencies: Some(vec!["dep".into()]),
            start_date: Some(Some(date(2024, 2, 1))),
            end_date: Some(Some(date(2024, 2, 3))),
            ..NodePatch::default()
        };

        let sent = session.update_node("b", changes).unwrap();
        assert_eq!(sent.start_date, Some(Some(date(2024, 2, 1))));
        assert_eq!(sent.estimate_hours, Some(Some(24.0)));
    }

    #[test]
    fn test_update_rejects_cycles_without_request() {
        let mut session = open(backend());
        session
            .update_node("b", NodePatch {
                dependencies: Some(vec!["a".into()]),
                ..NodePatch::default()
            })
            .unwrap();

        let result = session.update_node("a", NodePatch {
            dependencies: Some(vec!["b".into()]),
            ..NodePatch::default()
        });
        assert!(matches!(result, Err(UpdateError::Dependency(DependencyError::Cycle(_)))));
        assert_eq!(session.collaborator().calls.borrow().len(), 1);
    }

    #[test]
    fn test_update_derives_service_hours() {
        let mut session = open(backend());
        let sent = session
            .update_node("a", NodePatch {
                service_catalog_id: Some(Some("s1".into())),
                ..NodePatch::default()
            })
            .unwrap();

        assert_eq!(sent.service_multiplier, Some(Some(1.0)));
        assert_eq!(sent.service_hours, Some(Some(10.0)));
        assert_eq!(session.find("a").unwrap().service_hours, Some(10.0));
    }

    #[test]
    fn test_board_move_mirrors_status() {
        let mut session = open(backend());
        let moved = session
            .move_board_task(
                "b",
                &BoardPosition::new("BACKLOG", 3),
                &BoardPosition::new("DONE", 0),
                None,
            )
            .unwrap();

        assert!(moved);
        assert_eq!(session.find("b").unwrap().status, Status::Done);
        assert_eq!(
            session.collaborator().calls.borrow()[0],
            Call::Board(
                "b".into(),
                BoardMoveRequest {
                    column_id: "DONE".into(),
                    status: Status::Done,
                    order: 0
                }
            )
        );

        let same = session.move_board_task(
            "b",
            &BoardPosition::new("DONE", 0),
            &BoardPosition::new("DONE", 0),
            None,
        );
        assert!(!same.unwrap());
        assert_eq!(session.refresh_count(), 1);
    }

    #[test]
    fn test_status_edit_moves_card_to_its_column() {
        let mut session = open(backend());
        session
            .move_board_task(
                "b",
                &BoardPosition::new("BACKLOG", 3),
                &BoardPosition::new("REVIEW", 0),
                None,
            )
            .unwrap();

        session
            .update_node("b", NodePatch {
                status: Some(Status::Done),
                ..NodePatch::default()
            })
            .unwrap();

        let (position, card) = find_task(session.board(), "b").unwrap();
        assert_eq!(position.column_id, "DONE");
        assert_eq!(card.status, Status::Done);
        let review = session.board().iter().find(|c| c.id == "REVIEW").unwrap();
        assert!(review.tasks.is_empty());

        session
            .update_node("b", NodePatch {
                deleted_at: Some(Some(jiff::Timestamp::UNIX_EPOCH)),
                ..NodePatch::default()
            })
            .unwrap();
        assert!(find_task(session.board(), "b").is_none());
    }

    #[test]
    fn test_propagate_and_renumber() {
        let mut session = open(backend());
        session
            .update_node("b", NodePatch {
                dependencies: Some(vec!["dep".into()]),
                ..NodePatch::default()
            })
            .unwrap();
        session
            .update_node("dep", NodePatch {
                end_date: Some(Some(date(2024, 1, 20))),
                ..NodePatch::default()
            })
            .unwrap();

        let shifts = session.propagate("dep").unwrap();
        assert_eq!(shifts.len(), 1);
        assert_eq!(session.find("b").unwrap().start_date, Some(date(2024, 1, 21)));

        session.move_node("b", None, 0).unwrap();
        let changed = session.renumber().unwrap();
        assert_eq!(changed, 4);
        assert_eq!(session.find("b").unwrap().wbs_code.as_deref(), Some("1"));
    }

    #[test]
    fn test_reorder_siblings_request() {
        let mut session = open(backend());
        let ids = vec!["b".to_string(), "a".to_string()];
        session.reorder_siblings(None, &ids).unwrap();

        assert_eq!(session.forest()[0].id, "b");
        assert_eq!(session.collaborator().calls.borrow()[0], Call::Reorder(None, ids));
        assert!(matches!(
            session.reorder_siblings(Some("ghost"), &[]),
            Err(UpdateError::UnknownNode(_))
        ));
    }
}
