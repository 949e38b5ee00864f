//! Persistence of project snapshots.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::snapshot::Snapshot;

pub mod collaborator;
pub mod json;
pub mod migrations;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Cannot read snapshot '{path}': {source}")]
    LoadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot '{path}' is not valid JSON or has unexpected fields: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Well-formed JSON that is not shaped like any snapshot version.
    #[error("Malformed snapshot: {0}")]
    Malformed(String),

    #[error("Cannot lock '{path}' for writing: {source}")]
    LockFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write snapshot '{path}': {source}")]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot encode snapshot with {nodes} nodes: {source}")]
    SerializeFailed {
        nodes: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot back up the previous snapshot to '{path}': {source}")]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot prune snapshot backups in '{dir}': {source}")]
    CleanupFailed {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot version {0} is newer than this build of wbs understands; upgrade wbs to open it")]
    FutureVersion(u32),

    #[error("No migration from snapshot version {0}")]
    MissingMigration(u32),
}

/// Where snapshots live. Loading a location that holds nothing yet yields
/// an empty snapshot rather than an error.
pub trait Storage {
    fn load(&self) -> Result<Snapshot, StorageError>;
    fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError>;
}
