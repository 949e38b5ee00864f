use std::{
    fs::{self, File, OpenOptions},
    io::ErrorKind,
    path::{Path, PathBuf},
};

use fs2::FileExt;
use serde_json::{Value, to_string_pretty};
use tracing::debug;
use uuid::Uuid;

use crate::{
    models::snapshot::{CURRENT_VERSION, Snapshot},
    storage::{
        Storage, StorageError,
        migrations::{apply_migrations, detect_version},
    },
};

/// Backups kept next to the snapshot file.
const MAX_BACKUPS: usize = 5;

/// Snapshot file on local disk.
///
/// Saves write a uniquely named temp file and rename it over the snapshot
/// while holding an exclusive lock on `<name>.lock`. The previous snapshot is
/// copied into `backups/` first; only the newest five copies are kept.
pub struct JsonFileStorage {
    path: PathBuf,
}

/// Exclusive lock on the snapshot, released on drop.
struct SnapshotLock {
    file: File,
}

impl Drop for SnapshotLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl JsonFileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<SnapshotLock, StorageError> {
        let lock_path = self.path.with_extension("lock");
        let lock_failed = |source| StorageError::LockFailed {
            path: lock_path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(lock_failed)?;
        file.lock_exclusive().map_err(lock_failed)?;
        Ok(SnapshotLock { file })
    }

    fn backup_dir(&self) -> PathBuf {
        self.path
            .parent()
            .unwrap_or(Path::new("."))
            .join("backups")
    }

    fn backup_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".to_string());
        self.backup_dir()
            .join(format!("{name}-{}", jiff::Timestamp::now()))
    }

    /// Copy the current snapshot into the backup directory, creating it on
    /// first use. Nothing to do before the first save.
    fn backup(&self) -> Result<(), StorageError> {
        let backup_path = self.backup_path();
        let backup_failed = |source| StorageError::BackupFailed {
            path: backup_path.clone(),
            source,
        };

        if !fs::exists(&self.path).map_err(backup_failed)? {
            return Ok(());
        }
        match fs::copy(&self.path, &backup_path) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fs::create_dir_all(self.backup_dir()).map_err(backup_failed)?;
                fs::copy(&self.path, &backup_path)
                    .map(|_| ())
                    .map_err(backup_failed)
            }
            Err(e) => Err(backup_failed(e)),
        }
    }

    fn prune_backups(&self) -> Result<(), StorageError> {
        let dir = self.backup_dir();
        let cleanup_failed = |source| StorageError::CleanupFailed {
            dir: dir.clone(),
            source,
        };

        if !fs::exists(&dir).map_err(cleanup_failed)? {
            return Ok(());
        }

        let mut backups: Vec<PathBuf> = fs::read_dir(&dir)
            .map_err(cleanup_failed)?
            .flatten()
            .filter(|entry| entry.metadata().is_ok_and(|m| m.is_file()))
            .map(|entry| entry.path())
            .collect();
        // Timestamped names sort oldest first.
        backups.sort();

        let excess = backups.len().saturating_sub(MAX_BACKUPS);
        for path in &backups[..excess] {
            fs::remove_file(path).map_err(cleanup_failed)?;
        }
        Ok(())
    }

    fn parse(&self, content: &str) -> Result<Snapshot, StorageError> {
        let parse_failed = |source| StorageError::ParseFailed {
            path: self.path.clone(),
            source,
        };

        let mut data: Value = serde_json::from_str(content).map_err(parse_failed)?;
        let file_version = detect_version(&data)?;
        if file_version > CURRENT_VERSION {
            return Err(StorageError::FutureVersion(file_version));
        }

        if file_version < CURRENT_VERSION {
            debug!(from = file_version, to = CURRENT_VERSION, "migrating snapshot");
            data = apply_migrations(data, file_version, CURRENT_VERSION)?;
        }
        if let Some(obj) = data.as_object_mut() {
            obj.insert("version".to_string(), Value::from(CURRENT_VERSION));
        }

        serde_json::from_value(data).map_err(parse_failed)
    }
}

impl Storage for JsonFileStorage {
    fn load(&self) -> Result<Snapshot, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let snapshot = self.parse(&content)?;
                debug!(path = %self.path.display(), nodes = snapshot.nodes.len(), "snapshot loaded");
                Ok(snapshot)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Snapshot::default()),
            Err(e) => Err(StorageError::LoadFailed {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let json = to_string_pretty(snapshot).map_err(|e| StorageError::SerializeFailed {
            nodes: snapshot.nodes.len(),
            source: e,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StorageError::SaveFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let temp_path = PathBuf::from(format!("{}.tmp.{}", self.path.display(), Uuid::new_v4()));
        fs::write(&temp_path, json).map_err(|e| StorageError::SaveFailed {
            path: temp_path.clone(),
            source: e,
        })?;

        let _lock = self.lock()?;
        self.backup()?;
        self.prune_backups()?;
        fs::rename(&temp_path, &self.path).map_err(|e| StorageError::SaveFailed {
            path: self.path.clone(),
            source: e,
        })?;

        debug!(path = %self.path.display(), nodes = snapshot.nodes.len(), "snapshot saved");
        Ok(())
    }
}
