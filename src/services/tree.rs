//! Building and reading the work-breakdown forest.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::{debug, instrument, warn};

use crate::models::node::{NodeId, WbsNode};

fn missing_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sibling order: `sortOrder`, then `order`, then creation time, each
/// ascending with missing values last.
pub fn sibling_order(a: &WbsNode, b: &WbsNode) -> Ordering {
    missing_last(&a.sort_order, &b.sort_order)
        .then_with(|| missing_last(&a.order, &b.order))
        .then_with(|| missing_last(&a.created_at, &b.created_at))
}

/// Stable sort of one sibling list.
pub fn sort_siblings(nodes: &mut [WbsNode]) {
    nodes.sort_by(sibling_order);
}

/// `"1.2.3"` -> `"1.2"`. Top-level codes have no parent.
fn parent_code(code: &str) -> Option<&str> {
    code.trim()
        .rsplit_once('.')
        .map(|(parent, _)| parent)
        .filter(|parent| !parent.is_empty())
}

fn has_parent_ref(node: &WbsNode) -> bool {
    node.parent_id.as_deref().is_some_and(|id| !id.is_empty())
}

/// Reconstruct the forest from flat records.
///
/// Records without a parent reference but with a dotted code are attached to
/// the record owning the parent code. Unresolvable parents make roots; no
/// record is ever dropped except later duplicates of an id. Input that is
/// already hierarchical (any record has children) is returned as is.
#[instrument(skip_all, fields(nodes = flat.len()))]
pub fn build(flat: Vec<WbsNode>) -> Vec<WbsNode> {
    if flat.iter().any(|node| !node.children.is_empty()) {
        debug!("input already hierarchical");
        return flat;
    }

    let mut nodes: Vec<WbsNode> = Vec::with_capacity(flat.len());
    let mut index: HashMap<NodeId, usize> = HashMap::with_capacity(flat.len());
    for node in flat {
        if index.contains_key(&node.id) {
            warn!(id = %node.id, "duplicate node id, keeping the first record");
            continue;
        }
        index.insert(node.id.clone(), nodes.len());
        nodes.push(node);
    }

    infer_parents_from_codes(&mut nodes);

    let mut parents: Vec<Option<usize>> = nodes
        .iter()
        .map(|node| {
            node.parent_id
                .as_deref()
                .and_then(|parent_id| index.get(parent_id).copied())
        })
        .collect();

    break_cycles(&mut nodes, &mut parents);

    let mut children_of: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut roots = Vec::new();
    for (i, parent) in parents.iter().enumerate() {
        match parent {
            Some(p) => children_of[*p].push(i),
            None => roots.push(i),
        }
    }

    let mut slots: Vec<Option<WbsNode>> = nodes.into_iter().map(Some).collect();
    let mut forest: Vec<WbsNode> = roots
        .into_iter()
        .filter_map(|i| assemble(i, &children_of, &mut slots))
        .collect();
    sort_siblings(&mut forest);
    for root in &mut forest {
        root.set_levels(0);
    }

    debug!(roots = forest.len(), "forest built");
    forest
}

fn infer_parents_from_codes(nodes: &mut [WbsNode]) {
    let mut by_code: HashMap<String, NodeId> = HashMap::new();
    for node in nodes.iter() {
        if let Some(code) = node.wbs_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            by_code
                .entry(code.to_lowercase())
                .or_insert_with(|| node.id.clone());
        }
    }

    for node in nodes.iter_mut() {
        if has_parent_ref(node) {
            continue;
        }
        let Some(parent_code) = node.wbs_code.as_deref().and_then(parent_code) else {
            continue;
        };
        if let Some(parent_id) = by_code.get(&parent_code.to_lowercase())
            && *parent_id != node.id
        {
            debug!(id = %node.id, parent = %parent_id, "parent inferred from code");
            node.parent_id = Some(parent_id.clone());
        }
    }
}

/// Each record has at most one parent, so every connected group holds at
/// most one cycle. The cycle is cut at its member that came first in the
/// input, which becomes a root.
fn break_cycles(nodes: &mut [WbsNode], parents: &mut [Option<usize>]) {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        OnPath,
        Settled,
    }

    let mut marks = vec![Mark::Unvisited; nodes.len()];
    for start in 0..nodes.len() {
        let mut path: Vec<usize> = Vec::new();
        let mut current = Some(start);
        while let Some(i) = current {
            match marks[i] {
                Mark::Settled => break,
                Mark::OnPath => {
                    let member = path
                        .iter()
                        .position(|&p| p == i)
                        .and_then(|pos| path[pos..].iter().copied().min());
                    if let Some(member) = member {
                        warn!(id = %nodes[member].id, "parent cycle detected, detaching node to root");
                        parents[member] = None;
                        nodes[member].parent_id = None;
                    }
                    break;
                }
                Mark::Unvisited => {
                    marks[i] = Mark::OnPath;
                    path.push(i);
                    current = parents[i];
                }
            }
        }
        for i in path {
            marks[i] = Mark::Settled;
        }
    }
}

fn assemble(
    index: usize,
    children_of: &[Vec<usize>],
    slots: &mut [Option<WbsNode>],
) -> Option<WbsNode> {
    let mut node = slots[index].take()?;
    node.children = children_of[index]
        .iter()
        .filter_map(|&child| assemble(child, children_of, slots))
        .collect();
    sort_siblings(&mut node.children);
    Some(node)
}

/// Preorder copy of the forest with `children` emptied. Each record's
/// `parentId` names the node it was nested under.
pub fn flatten(forest: &[WbsNode]) -> Vec<WbsNode> {
    let mut flat = Vec::with_capacity(count(forest));
    for root in forest {
        flatten_into(root, root.parent_id.clone(), &mut flat);
    }
    flat
}

fn flatten_into(node: &WbsNode, parent_id: Option<NodeId>, flat: &mut Vec<WbsNode>) {
    let mut record = WbsNode {
        children: Vec::new(),
        ..node.clone()
    };
    record.parent_id = parent_id;
    flat.push(record);
    for child in &node.children {
        flatten_into(child, Some(node.id.clone()), flat);
    }
}

/// Preorder walk yielding each node with its depth.
pub struct Preorder<'a> {
    stack: Vec<(&'a WbsNode, u32)>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = (&'a WbsNode, u32);

    fn next(&mut self) -> Option<Self::Item> {
        let (node, depth) = self.stack.pop()?;
        self.stack
            .extend(node.children.iter().rev().map(|child| (child, depth + 1)));
        Some((node, depth))
    }
}

pub fn walk(forest: &[WbsNode]) -> Preorder<'_> {
    Preorder {
        stack: forest.iter().rev().map(|root| (root, 0)).collect(),
    }
}

pub fn find<'a>(forest: &'a [WbsNode], id: &str) -> Option<&'a WbsNode> {
    walk(forest).map(|(node, _)| node).find(|node| node.id == id)
}

pub fn find_mut<'a>(forest: &'a mut [WbsNode], id: &str) -> Option<&'a mut WbsNode> {
    for node in forest.iter_mut() {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_mut(&mut node.children, id) {
            return Some(found);
        }
    }
    None
}

/// Recursive membership test, used to drop a stale selection after a rebuild.
pub fn contains(forest: &[WbsNode], id: &str) -> bool {
    forest.iter().any(|node| node.subtree_contains(id))
}

pub fn count(forest: &[WbsNode]) -> usize {
    forest.iter().map(WbsNode::subtree_len).sum()
}

/// Copy of the forest without soft-deleted nodes. Deleting a node hides its
/// whole subtree.
pub fn active(forest: &[WbsNode]) -> Vec<WbsNode> {
    forest
        .iter()
        .filter(|node| !node.is_deleted())
        .map(|node| WbsNode {
            children: active(&node.children),
            ..node.clone()
        })
        .collect()
}
