use jiff::Timestamp;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use crate::models::status::{Priority, Status};
use crate::models::wire;

/// Server-assigned, opaque node identifier.
pub type NodeId = String;

/// Team member responsible for a node.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Responsible {
    /// Team membership id (weak reference)
    pub membership_id: String,
    /// Display name, as sent by the backend
    #[serde(default)]
    pub name: String,
}

/// One deliverable or task of the work-breakdown structure.
///
/// Field names follow the backend's camelCase JSON so snapshots and fetched
/// payloads deserialize directly.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct WbsNode {
    /// Server-assigned id
    pub id: NodeId,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Weak reference to the parent; lookup only
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    /// Owned subtree, ordered
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<WbsNode>,
    /// Depth in the forest; derived, never authoritative
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    /// Dotted hierarchical code such as `1.2.3`
    #[serde(default)]
    pub wbs_code: Option<String>,

    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub sort_order: Option<i64>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,

    #[serde(default, deserialize_with = "wire::lenient_date")]
    pub start_date: Option<Date>,
    #[serde(default, deserialize_with = "wire::lenient_date")]
    pub end_date: Option<Date>,
    #[serde(
        default,
        deserialize_with = "wire::lenient_hours",
        serialize_with = "wire::hours_as_string"
    )]
    pub estimate_hours: Option<f64>,
    /// Ids of the nodes this one waits for (weak references)
    #[serde(default, deserialize_with = "wire::id_list")]
    pub dependencies: Vec<NodeId>,

    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub responsible: Option<Responsible>,

    #[serde(default)]
    pub service_catalog_id: Option<String>,
    #[serde(default, deserialize_with = "wire::lenient_hours")]
    pub service_multiplier: Option<f64>,
    #[serde(default, deserialize_with = "wire::lenient_hours")]
    pub service_hours: Option<f64>,

    /// Soft-deletion mark; deleted nodes stay in the working set
    #[serde(default)]
    pub deleted_at: Option<Timestamp>,
}

impl WbsNode {
    pub fn new(id: impl Into<NodeId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(WbsNode::subtree_len).sum::<usize>()
    }

    /// Whether `id` is this node or one of its descendants.
    pub fn subtree_contains(&self, id: &str) -> bool {
        self.id == id || self.children.iter().any(|child| child.subtree_contains(id))
    }

    /// Refresh the derived `level` for this subtree, rooted at `depth`.
    pub(crate) fn set_levels(&mut self, depth: u32) {
        self.level = Some(depth);
        for child in &mut self.children {
            child.set_levels(depth + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_backend_record() {
        let json = r#"{
            "id": "n1",
            "title": "Fundação",
            "parentId": null,
            "wbsCode": "1.2",
            "order": 2000,
            "createdAt": "2024-01-02T10:00:00Z",
            "startDate": "2024-01-08T03:00:00.000Z",
            "endDate": null,
            "estimateHours": "24",
            "dependencies": null,
            "status": "Em andamento",
            "priority": "ALTA",
            "serviceMultiplier": 2,
            "responsible": {"membershipId": "m1", "name": "Ana", "userId": "u1"}
        }"#;
        let node: WbsNode = serde_json::from_str(json).unwrap();

        assert_eq!(node.id, "n1");
        assert_eq!(node.wbs_code.as_deref(), Some("1.2"));
        assert_eq!(node.order, Some(2000));
        assert!(node.start_date.is_some());
        assert_eq!(node.estimate_hours, Some(24.0));
        assert!(node.dependencies.is_empty());
        assert_eq!(node.status, Status::InProgress);
        assert_eq!(node.priority, Priority::High);
        assert_eq!(node.service_multiplier, Some(2.0));
        assert_eq!(node.responsible.unwrap().name, "Ana");
    }

    #[test]
    fn test_minimal_record_gets_defaults() {
        let node: WbsNode = serde_json::from_str(r#"{"id": "x"}"#).unwrap();
        assert_eq!(node.status, Status::Backlog);
        assert_eq!(node.priority, Priority::Medium);
        assert!(node.children.is_empty());
        assert!(!node.is_deleted());
    }

    #[test]
    fn test_subtree_helpers() {
        let mut root = WbsNode::new("a", "A");
        let mut child = WbsNode::new("b", "B");
        child.children.push(WbsNode::new("c", "C"));
        root.children.push(child);
        root.set_levels(0);

        assert_eq!(root.subtree_len(), 3);
        assert!(root.subtree_contains("c"));
        assert!(!root.subtree_contains("d"));
        assert_eq!(root.children[0].children[0].level, Some(2));
    }
}
