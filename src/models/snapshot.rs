use serde::{Deserialize, Serialize};

use crate::models::{board::BoardColumn, catalog::ServiceCatalog, node::WbsNode};

/// Current schema version
pub const CURRENT_VERSION: u32 = 2;

/// A project's working set as stored on disk: flat node records (no
/// `children`), the board projection and the service catalog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub version: u32,
    #[serde(default)]
    pub nodes: Vec<WbsNode>,
    #[serde(default)]
    pub board: Vec<BoardColumn>,
    #[serde(default)]
    pub catalog: ServiceCatalog,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            nodes: vec![],
            board: vec![],
            catalog: ServiceCatalog::default(),
        }
    }
}
