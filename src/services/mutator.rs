//! Pure operations over a forest. Every function returns a new forest and
//! leaves its input untouched.

use thiserror::Error;
use tracing::{debug, warn};

use crate::models::node::{NodeId, WbsNode};
use crate::models::patch::NodePatch;
use crate::services::tree;

/// Spacing between consecutive sibling order values.
pub const ORDER_STEP: i64 = 1000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoveError {
    #[error("Node '{0}' not found")]
    NodeNotFound(NodeId),

    #[error("Parent '{0}' not found")]
    ParentNotFound(NodeId),

    #[error("Cannot move '{node}' under '{parent}': the target is inside the moved subtree")]
    WouldCreateCycle { node: NodeId, parent: NodeId },
}

/// Remove the node with `id` (and its subtree) from wherever it sits.
fn excise(nodes: &mut Vec<WbsNode>, id: &str) -> Option<WbsNode> {
    if let Some(index) = nodes.iter().position(|node| node.id == id) {
        return Some(nodes.remove(index));
    }
    nodes
        .iter_mut()
        .find_map(|node| excise(&mut node.children, id))
}

fn siblings_mut<'a>(forest: &'a mut Vec<WbsNode>, parent_id: Option<&str>) -> Option<&'a mut Vec<WbsNode>> {
    match parent_id {
        None => Some(forest),
        Some(parent_id) => tree::find_mut(forest, parent_id).map(|parent| &mut parent.children),
    }
}

/// Move `node_id` with its subtree under `new_parent_id` (root level when
/// `None`) at `position` among the new siblings. Positions past the end
/// append.
pub fn try_move(
    forest: &[WbsNode],
    node_id: &str,
    new_parent_id: Option<&str>,
    position: usize,
) -> Result<Vec<WbsNode>, MoveError> {
    let node = tree::find(forest, node_id).ok_or_else(|| MoveError::NodeNotFound(node_id.to_string()))?;

    if let Some(parent_id) = new_parent_id {
        if node.subtree_contains(parent_id) {
            return Err(MoveError::WouldCreateCycle {
                node: node_id.to_string(),
                parent: parent_id.to_string(),
            });
        }
        if !tree::contains(forest, parent_id) {
            return Err(MoveError::ParentNotFound(parent_id.to_string()));
        }
    }

    let mut next = forest.to_vec();
    let mut moved = excise(&mut next, node_id).ok_or_else(|| MoveError::NodeNotFound(node_id.to_string()))?;
    moved.parent_id = new_parent_id.map(String::from);

    let siblings = siblings_mut(&mut next, new_parent_id)
        .ok_or_else(|| MoveError::ParentNotFound(new_parent_id.unwrap_or_default().to_string()))?;
    let at = position.min(siblings.len());
    siblings.insert(at, moved);

    for root in &mut next {
        root.set_levels(0);
    }

    debug!(node = node_id, parent = ?new_parent_id, position = at, "node moved");
    Ok(next)
}

/// Like [`try_move`], but any rejection yields an unchanged copy of the input.
pub fn move_node(
    forest: &[WbsNode],
    node_id: &str,
    new_parent_id: Option<&str>,
    position: usize,
) -> Vec<WbsNode> {
    try_move(forest, node_id, new_parent_id, position).unwrap_or_else(|err| {
        warn!(%err, "move rejected");
        forest.to_vec()
    })
}

/// Merge `changes` into the node with `node_id`. Unknown ids leave the forest
/// as it was.
pub fn patch(forest: &[WbsNode], node_id: &str, changes: &NodePatch) -> Vec<WbsNode> {
    let mut next = forest.to_vec();
    match tree::find_mut(&mut next, node_id) {
        Some(node) => changes.apply_to(node),
        None => debug!(node = node_id, "patch target not found"),
    }
    next
}

/// Reorder the children of one parent (the roots when `parent_id` is `None`).
///
/// Listed ids come first in the given order; children that were not listed
/// keep their relative order after them. Ids that are not children of that
/// parent are ignored. Every sibling gets `sortOrder = order = index * 1000`.
pub fn reorder_siblings(forest: &[WbsNode], parent_id: Option<&str>, ordered_ids: &[NodeId]) -> Vec<WbsNode> {
    let mut next = forest.to_vec();
    let Some(siblings) = siblings_mut(&mut next, parent_id) else {
        debug!(parent = ?parent_id, "reorder target not found");
        return next;
    };

    let mut remaining = std::mem::take(siblings);
    let mut reordered = Vec::with_capacity(remaining.len());
    for id in ordered_ids {
        if let Some(index) = remaining.iter().position(|node| node.id == *id) {
            reordered.push(remaining.remove(index));
        }
    }
    reordered.append(&mut remaining);

    for (index, node) in reordered.iter_mut().enumerate() {
        let value = index as i64 * ORDER_STEP;
        node.sort_order = Some(value);
        node.order = Some(value);
    }
    *siblings = reordered;
    next
}
