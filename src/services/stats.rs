use std::collections::BTreeMap;

use crate::models::node::WbsNode;
use crate::models::status::Status;
use crate::services::tree;

/// Aggregates over a forest. Soft-deleted nodes and everything below them
/// count as deleted and stay out of the sums.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TreeStats {
    pub total: usize,
    pub active: usize,
    pub deleted: usize,
    pub estimate_hours: f64,
    pub service_hours: f64,
    pub by_status: BTreeMap<Status, usize>,
}

impl TreeStats {
    pub fn collect(forest: &[WbsNode]) -> Self {
        let mut stats = Self {
            total: tree::count(forest),
            ..Self::default()
        };
        for (node, _) in tree::walk(&tree::active(forest)) {
            stats.active += 1;
            stats.estimate_hours += node.estimate_hours.unwrap_or(0.0);
            stats.service_hours += node.service_hours.unwrap_or(0.0);
            *stats.by_status.entry(node.status).or_insert(0) += 1;
        }
        stats.deleted = stats.total - stats.active;
        stats
    }

    /// Share of active nodes that are done, between 0 and 1.
    pub fn completion(&self) -> f64 {
        if self.active == 0 {
            return 0.0;
        }
        self.by_status.get(&Status::Done).copied().unwrap_or(0) as f64 / self.active as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_skips_deleted_subtrees() {
        let mut root = WbsNode {
            estimate_hours: Some(8.0),
            status: Status::Done,
            ..WbsNode::new("r", "Root")
        };
        let mut removed = WbsNode {
            estimate_hours: Some(100.0),
            deleted_at: Some(jiff::Timestamp::UNIX_EPOCH),
            ..WbsNode::new("x", "Removed")
        };
        removed.children.push(WbsNode {
            estimate_hours: Some(50.0),
            ..WbsNode::new("y", "Below removed")
        });
        root.children.push(removed);
        root.children.push(WbsNode {
            estimate_hours: Some(16.0),
            service_hours: Some(4.0),
            ..WbsNode::new("z", "Kept")
        });

        let stats = TreeStats::collect(&[root]);

        assert_eq!(stats.total, 4);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.deleted, 2);
        assert_eq!(stats.estimate_hours, 24.0);
        assert_eq!(stats.service_hours, 4.0);
        assert_eq!(stats.by_status.get(&Status::Done), Some(&1));
        assert_eq!(stats.completion(), 0.5);
    }

    #[test]
    fn test_empty_forest() {
        let stats = TreeStats::collect(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.completion(), 0.0);
    }
}
