//! Dependency graph between nodes.
//!
//! Edges point `predecessor -> successor`: a node's `dependencies` are its
//! predecessors. Making `node` depend on `p` closes a cycle when `p` is
//! already reachable from `node`.

use std::collections::{HashMap, HashSet, VecDeque};

use jiff::civil::Date;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, EdgeRef};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::models::node::{NodeId, WbsNode};
use crate::models::patch::NodePatch;
use crate::services::scheduler::DependencyScheduler;
use crate::services::tree;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DependencyError {
    #[error("Node '{0}' cannot depend on itself")]
    SelfDependency(NodeId),

    #[error("Node '{0}' not found")]
    UnknownNode(NodeId),

    #[error("Dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<NodeId>),
}

pub struct DependencyGraph {
    graph: DiGraph<NodeId, ()>,
    index: HashMap<NodeId, NodeIndex>,
}

impl DependencyGraph {
    /// Every node of the forest, deleted ones included. References to
    /// unknown nodes carry no edge.
    pub fn from_forest(forest: &[WbsNode]) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        for (node, _) in tree::walk(forest) {
            index
                .entry(node.id.clone())
                .or_insert_with(|| graph.add_node(node.id.clone()));
        }
        for (node, _) in tree::walk(forest) {
            let successor = index[&node.id];
            for dependency in &node.dependencies {
                match index.get(dependency) {
                    Some(&predecessor) => {
                        graph.update_edge(predecessor, successor, ());
                    }
                    None => debug!(node = %node.id, dependency = %dependency, "dangling dependency"),
                }
            }
        }
        Self { graph, index }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    fn id_of(&self, idx: NodeIndex) -> NodeId {
        self.graph
            .node_weight(idx)
            .cloned()
            .unwrap_or_else(|| format!("#{}", idx.index()))
    }

    /// The cycle that `predecessor -> successor` would close, as
    /// `predecessor -> successor -> ... -> predecessor`.
    pub fn would_create_cycle(&self, predecessor: &str, successor: &str) -> Option<Vec<NodeId>> {
        let from = *self.index.get(predecessor)?;
        let to = *self.index.get(successor)?;
        if from == to {
            return Some(vec![predecessor.to_string(), predecessor.to_string()]);
        }
        if self.graph.contains_edge(from, to) {
            return None;
        }

        let mut queue = VecDeque::from([to]);
        let mut visited = HashSet::from([to]);
        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        while let Some(current) = queue.pop_front() {
            if current == from {
                let mut path = vec![from];
                let mut cursor = from;
                while let Some(&previous) = parent.get(&cursor) {
                    path.push(previous);
                    cursor = previous;
                }
                path.reverse();

                let mut cycle = vec![self.id_of(from)];
                cycle.extend(path.into_iter().map(|idx| self.id_of(idx)));
                return Some(cycle);
            }
            for edge in self.graph.edges(current) {
                let next = edge.target();
                if visited.insert(next) {
                    parent.insert(next, current);
                    queue.push_back(next);
                }
            }
        }
        None
    }

    /// Nodes reachable from `starts` along successor edges, starts included.
    fn downstream(&self, starts: &[NodeId]) -> HashSet<NodeIndex> {
        let mut reached = HashSet::new();
        for start in starts {
            let Some(&idx) = self.index.get(start) else {
                continue;
            };
            let mut bfs = Bfs::new(&self.graph, idx);
            while let Some(next) = bfs.next(&self.graph) {
                reached.insert(next);
            }
        }
        reached
    }

    fn topological_order(&self) -> Result<Vec<NodeIndex>, DependencyError> {
        toposort(&self.graph, None).map_err(|cycle| {
            let culprit = cycle.node_id();
            let mut members: Vec<NodeId> = tarjan_scc(&self.graph)
                .into_iter()
                .find(|component| component.contains(&culprit))
                .unwrap_or_else(|| vec![culprit])
                .into_iter()
                .map(|idx| self.id_of(idx))
                .collect();
            members.sort_unstable();
            DependencyError::Cycle(members)
        })
    }
}

/// Clean a requested dependency list for `node_id`.
///
/// Duplicates and blanks are removed and unknown ids dropped. Depending on
/// itself, or on anything that already depends on it, is an error.
pub fn validate_dependencies(
    forest: &[WbsNode],
    node_id: &str,
    requested: &[NodeId],
) -> Result<Vec<NodeId>, DependencyError> {
    let graph = DependencyGraph::from_forest(forest);
    if !graph.contains(node_id) {
        return Err(DependencyError::UnknownNode(node_id.to_string()));
    }

    let mut seen = HashSet::new();
    let mut accepted = Vec::new();
    for id in requested.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
        if !seen.insert(id) {
            continue;
        }
        if id == node_id {
            return Err(DependencyError::SelfDependency(id.to_string()));
        }
        if !graph.contains(id) {
            warn!(node = node_id, dependency = id, "unknown dependency ignored");
            continue;
        }
        if let Some(cycle) = graph.would_create_cycle(id, node_id) {
            return Err(DependencyError::Cycle(cycle));
        }
        accepted.push(id.to_string());
    }
    Ok(accepted)
}

/// A node whose dates moved during propagation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateShift {
    pub id: NodeId,
    pub previous_start: Option<Date>,
    pub previous_end: Option<Date>,
    pub start_date: Date,
    pub end_date: Date,
}

impl DateShift {
    pub fn to_patch(&self) -> NodePatch {
        NodePatch {
            start_date: Some(Some(self.start_date)),
            end_date: Some(Some(self.end_date)),
            ..NodePatch::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Propagation {
    pub forest: Vec<WbsNode>,
    pub shifts: Vec<DateShift>,
}

/// Reschedule everything downstream of `start_ids`, in dependency order.
///
/// Each affected node that has dependencies is scheduled after them; its
/// duration is kept and its estimate left alone. A cyclic graph shifts
/// nothing.
#[instrument(skip_all, fields(starts = start_ids.len()))]
pub fn propagate_dates(
    forest: &[WbsNode],
    start_ids: &[NodeId],
    scheduler: &DependencyScheduler,
) -> Result<Propagation, DependencyError> {
    let graph = DependencyGraph::from_forest(forest);
    let order = graph.topological_order()?;
    let affected = graph.downstream(start_ids);

    let mut working = forest.to_vec();
    let mut shifts = Vec::new();
    for idx in order.into_iter().filter(|idx| affected.contains(idx)) {
        let id = graph.id_of(idx);
        let Some(node) = tree::find(&working, &id) else {
            continue;
        };
        if node.dependencies.is_empty() {
            continue;
        }
        let Some(schedule) = scheduler.schedule(&working, &node.dependencies, node) else {
            continue;
        };
        if node.start_date == Some(schedule.start_date) && node.end_date == Some(schedule.end_date) {
            continue;
        }

        let shift = DateShift {
            id: id.clone(),
            previous_start: node.start_date,
            previous_end: node.end_date,
            start_date: schedule.start_date,
            end_date: schedule.end_date,
        };
        if let Some(node) = tree::find_mut(&mut working, &id) {
            shift.to_patch().apply_to(node);
        }
        debug!(node = %id, start = %shift.start_date, end = %shift.end_date, "dates shifted");
        shifts.push(shift);
    }

    Ok(Propagation {
        forest: working,
        shifts,
    })
}
