//! A collaborator backed by a local snapshot file.
//!
//! Each request loads the stored flat records, runs the same engine the
//! session uses, and saves the result, so that a later fetch sees what the
//! backend would have answered: renumbered codes after structural changes,
//! downstream dates after schedule changes, node status following the
//! board and cards following node edits.

use tracing::debug;

use crate::models::board::{BoardPosition, find_task};
use crate::models::node::{NodeId, WbsNode};
use crate::models::patch::{BoardMoveRequest, MoveRequest, NodePatch};
use crate::models::snapshot::Snapshot;
use crate::models::status::Canonical;
use crate::services::board;
use crate::services::codes::assign_codes;
use crate::services::dependencies::{propagate_dates, validate_dependencies};
use crate::services::mutator;
use crate::services::normalizer::StatusNormalizer;
use crate::services::scheduler::DependencyScheduler;
use crate::services::session::{Collaborator, CollaboratorError};
use crate::services::tree;
use crate::storage::Storage;

pub struct SnapshotCollaborator<S: Storage> {
    storage: S,
    statuses: StatusNormalizer,
    scheduler: DependencyScheduler,
}

fn rejected(message: impl ToString) -> CollaboratorError {
    CollaboratorError::Rejected(message.to_string())
}

impl<S: Storage> SnapshotCollaborator<S> {
    pub fn new(storage: S, statuses: StatusNormalizer, scheduler: DependencyScheduler) -> Self {
        Self {
            storage,
            statuses,
            scheduler,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn load(&self) -> Result<(Snapshot, Vec<WbsNode>), CollaboratorError> {
        let mut snapshot = self.storage.load()?;
        let forest = tree::build(std::mem::take(&mut snapshot.nodes));
        Ok((snapshot, forest))
    }

    fn commit(&self, mut snapshot: Snapshot, forest: &[WbsNode]) -> Result<(), CollaboratorError> {
        snapshot.nodes = tree::flatten(forest);
        self.storage.save(&snapshot)?;
        Ok(())
    }

    /// Sibling order values follow current positions under `parent_id`.
    fn settle_order(forest: &[WbsNode], parent_id: Option<&str>) -> Vec<WbsNode> {
        let positions: Vec<NodeId> = match parent_id {
            None => forest.iter().map(|n| n.id.clone()).collect(),
            Some(parent_id) => tree::find(forest, parent_id)
                .map(|parent| parent.children.iter().map(|n| n.id.clone()).collect())
                .unwrap_or_default(),
        };
        mutator::reorder_siblings(forest, parent_id, &positions)
    }
}

impl<S: Storage> Collaborator for SnapshotCollaborator<S> {
    fn fetch(&self) -> Result<Snapshot, CollaboratorError> {
        Ok(self.storage.load()?)
    }

    fn move_node(&self, node_id: &str, request: &MoveRequest) -> Result<(), CollaboratorError> {
        let (snapshot, forest) = self.load()?;
        let parent_id = request.parent_id.as_deref();

        let moved = mutator::try_move(&forest, node_id, parent_id, request.order).map_err(rejected)?;
        let settled = Self::settle_order(&moved, parent_id);
        self.commit(snapshot, &assign_codes(&settled))
    }

    fn update_node(&self, node_id: &str, patch: &NodePatch) -> Result<(), CollaboratorError> {
        let (mut snapshot, forest) = self.load()?;
        if !tree::contains(&forest, node_id) {
            return Err(rejected(format!("node '{node_id}' not found")));
        }

        let mut patch = patch.clone();
        if let Some(requested) = &patch.dependencies {
            patch.dependencies = Some(validate_dependencies(&forest, node_id, requested).map_err(rejected)?);
        }

        let mut forest = mutator::patch(&forest, node_id, &patch);
        let mut touched = vec![node_id.to_string()];
        if patch.touches_schedule() {
            let propagation = propagate_dates(&forest, &[node_id.to_string()], &self.scheduler).map_err(rejected)?;
            debug!(node = node_id, shifted = propagation.shifts.len(), "dependents rescheduled");
            touched.extend(propagation.shifts.into_iter().map(|shift| shift.id));
            forest = propagation.forest;
        }

        for id in &touched {
            if let Some(node) = tree::find(&forest, id) {
                snapshot.board = board::refresh_card(&snapshot.board, node, &self.statuses);
            }
        }

        self.commit(snapshot, &forest)
    }

    fn reorder_siblings(&self, parent_id: Option<&str>, ordered_ids: &[NodeId]) -> Result<(), CollaboratorError> {
        let (snapshot, forest) = self.load()?;
        if let Some(parent_id) = parent_id
            && !tree::contains(&forest, parent_id)
        {
            return Err(rejected(format!("parent '{parent_id}' not found")));
        }

        let reordered = mutator::reorder_siblings(&forest, parent_id, ordered_ids);
        self.commit(snapshot, &assign_codes(&reordered))
    }

    fn move_board_task(&self, task_id: &str, request: &BoardMoveRequest) -> Result<(), CollaboratorError> {
        let (mut snapshot, forest) = self.load()?;
        if snapshot.board.is_empty() {
            snapshot.board = board::project_board(&forest, &self.statuses);
        }

        let (from, _) = find_task(&snapshot.board, task_id)
            .ok_or_else(|| rejected(format!("task '{task_id}' is not on the board")))?;
        let to = BoardPosition::new(request.column_id.clone(), request.order);
        if !snapshot.board.iter().any(|column| column.id == to.column_id) {
            return Err(rejected(format!("column '{}' not found", to.column_id)));
        }

        snapshot.board = board::reorder(
            &snapshot.board,
            &from,
            &to,
            task_id,
            Some(request.status.as_str()),
            &self.statuses,
        );

        let status = NodePatch {
            status: Some(request.status),
            ..NodePatch::default()
        };
        self.commit(snapshot, &mutator::patch(&forest, task_id, &status))
    }
}
