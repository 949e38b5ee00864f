use tracing::debug;

use crate::models::catalog::ServiceCatalog;
use crate::models::node::WbsNode;
use crate::models::patch::NodePatch;

pub const DEFAULT_MULTIPLIER: f64 = 1.0;

/// `hoursBase × multiplier` for a catalog entry, when it has base hours.
pub fn service_hours(catalog: &ServiceCatalog, catalog_id: &str, multiplier: f64) -> Option<f64> {
    catalog.hours_base(catalog_id).map(|base| base * multiplier)
}

/// Complete `changes` with derived service hours.
///
/// Runs only when the update touches the catalog reference or the
/// multiplier. Attaching a catalog reference to a node without a multiplier
/// also sets the multiplier to 1. A multiplier given in `changes` is never
/// replaced. Clearing the reference clears the hours; an unknown reference
/// leaves them alone.
pub fn derive_service_hours(catalog: &ServiceCatalog, node: &WbsNode, changes: &mut NodePatch) {
    if changes.service_catalog_id.is_none() && changes.service_multiplier.is_none() {
        return;
    }

    let catalog_id = match &changes.service_catalog_id {
        Some(Some(id)) if !id.trim().is_empty() => id.clone(),
        Some(_) => {
            changes.service_hours = Some(None);
            return;
        }
        None => match &node.service_catalog_id {
            Some(id) => id.clone(),
            None => return,
        },
    };

    let multiplier = match changes.service_multiplier {
        Some(Some(explicit)) => explicit,
        _ => match node.service_multiplier {
            Some(current) if changes.service_multiplier.is_none() => current,
            _ => {
                changes.service_multiplier = Some(Some(DEFAULT_MULTIPLIER));
                DEFAULT_MULTIPLIER
            }
        },
    };

    match service_hours(catalog, &catalog_id, multiplier) {
        Some(hours) => {
            debug!(node = %node.id, catalog_id = %catalog_id, multiplier, hours, "service hours derived");
            changes.service_hours = Some(Some(hours));
        }
        None => debug!(node = %node.id, catalog_id = %catalog_id, "catalog entry not found, service hours kept"),
    }
}
