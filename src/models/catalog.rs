use serde::{Deserialize, Serialize};

use crate::models::wire;

/// A billable service with its base effort.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCatalogEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Base hours for multiplier 1
    #[serde(default, alias = "hours", deserialize_with = "wire::lenient_hours")]
    pub hours_base: Option<f64>,
}

/// Lookup from service reference to base hours.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct ServiceCatalog {
    entries: Vec<ServiceCatalogEntry>,
}

impl ServiceCatalog {
    pub fn new(entries: Vec<ServiceCatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn get(&self, id: &str) -> Option<&ServiceCatalogEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Base hours of a service, when the entry exists and carries them.
    pub fn hours_base(&self, id: &str) -> Option<f64> {
        self.get(id).and_then(|entry| entry.hours_base)
    }

    pub fn entries(&self) -> &[ServiceCatalogEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
