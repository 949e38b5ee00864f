//! Update requests sent to the persistence collaborator.

use jiff::Timestamp;
use jiff::civil::Date;
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::node::{NodeId, Responsible, WbsNode};
use crate::models::status::{Priority, Status};
use crate::models::wire;

/// Field-level update of one node.
///
/// `None` leaves a field alone. For nullable fields `Some(None)` clears it,
/// which serializes as an explicit `null`. Hierarchy fields are not
/// patchable; reparenting goes through a [`MoveRequest`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "wire::nullable", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "wire::nullable", skip_serializing_if = "Option::is_none")]
    pub wbs_code: Option<Option<String>>,
    #[serde(default, deserialize_with = "wire::patch_date", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<Option<Date>>,
    #[serde(default, deserialize_with = "wire::patch_date", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Option<Date>>,
    #[serde(
        default,
        deserialize_with = "wire::patch_hours",
        serialize_with = "wire::patch_hours_as_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub estimate_hours: Option<Option<f64>>,
    #[serde(default, deserialize_with = "patch_id_list", skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<NodeId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "wire::nullable", skip_serializing_if = "Option::is_none")]
    pub responsible: Option<Option<Responsible>>,
    #[serde(default, deserialize_with = "wire::nullable", skip_serializing_if = "Option::is_none")]
    pub service_catalog_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "wire::patch_hours", skip_serializing_if = "Option::is_none")]
    pub service_multiplier: Option<Option<f64>>,
    #[serde(default, deserialize_with = "wire::patch_hours", skip_serializing_if = "Option::is_none")]
    pub service_hours: Option<Option<f64>>,
    #[serde(default, deserialize_with = "wire::nullable", skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<Option<Timestamp>>,
}

fn patch_id_list<'de, D>(deserializer: D) -> Result<Option<Vec<NodeId>>, D::Error>
where
    D: Deserializer<'de>,
{
    wire::id_list(deserializer).map(Some)
}

macro_rules! merge {
    ($patch:expr, $node:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$patch.$field {
                $node.$field = value.clone();
            }
        )+
    };
}

impl NodePatch {
    /// Shallow-merge into `node`. Applying the same patch twice is the same
    /// as applying it once.
    pub fn apply_to(&self, node: &mut WbsNode) {
        merge!(
            self,
            node,
            title,
            description,
            wbs_code,
            start_date,
            end_date,
            estimate_hours,
            dependencies,
            status,
            priority,
            responsible,
            service_catalog_id,
            service_multiplier,
            service_hours,
            deleted_at,
        );
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether the patch changes anything that dependents are scheduled from.
    pub fn touches_schedule(&self) -> bool {
        self.start_date.is_some()
            || self.end_date.is_some()
            || self.estimate_hours.is_some()
            || self.dependencies.is_some()
    }

    /// Whether the caller supplied a date explicitly.
    pub fn has_explicit_dates(&self) -> bool {
        matches!(self.start_date, Some(Some(_))) || matches!(self.end_date, Some(Some(_)))
    }
}

/// Reparent request: new parent (root level when `None`) and position among
/// the new siblings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub parent_id: Option<NodeId>,
    pub order: usize,
}

/// Board move request, keyed by task id on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BoardMoveRequest {
    pub column_id: String,
    pub status: Status,
    pub order: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    #[test]
    fn test_apply_is_idempotent() {
        let mut node = WbsNode::new("a", "Old");
        node.start_date = Some(date(2024, 1, 1));
        let patch = NodePatch {
            title: Some("New".into()),
            start_date: Some(None),
            status: Some(Status::Done),
            ..NodePatch::default()
        };

        patch.apply_to(&mut node);
        let once = node.clone();
        patch.apply_to(&mut node);

        assert_eq!(node, once);
        assert_eq!(node.title, "New");
        assert_eq!(node.start_date, None);
        assert_eq!(node.status, Status::Done);
    }

    #[test]
    fn test_wire_shape() {
        let patch = NodePatch {
            estimate_hours: Some(Some(16.0)),
            dependencies: Some(vec![]),
            service_catalog_id: Some(None),
            status: Some(Status::InProgress),
            ..NodePatch::default()
        };
        let json = serde_json::to_value(&patch).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "estimateHours": "16",
                "dependencies": [],
                "serviceCatalogId": null,
                "status": "IN_PROGRESS",
            })
        );
    }

    #[test]
    fn test_deserialize_distinguishes_null_from_absent() {
        let patch: NodePatch =
            serde_json::from_str(r#"{"endDate": null, "estimateHours": "8", "dependencies": null}"#)
                .unwrap();

        assert_eq!(patch.end_date, Some(None));
        assert_eq!(patch.start_date, None);
        assert_eq!(patch.estimate_hours, Some(Some(8.0)));
        assert_eq!(patch.dependencies, Some(vec![]));
        assert!(patch.touches_schedule());
        assert!(!patch.has_explicit_dates());
    }

    #[test]
    fn test_empty_patch() {
        assert!(NodePatch::default().is_empty());
        assert!(!NodePatch::default().touches_schedule());
    }
}
