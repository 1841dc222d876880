//! Durable JSON snapshot of the file registry.
//!
//! The snapshot is written whole on each persist and restored at startup.
//! Writes go to a sibling temp path followed by a rename, so a crash
//! mid-write leaves the prior snapshot intact.

use crate::registry::{FileRecord, SharedRegistry};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Error type for snapshot operations
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// IO error reading or writing the snapshot file
    #[error("snapshot IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Registry contents failed to serialize
    #[error("failed to encode snapshot: {0}")]
    Encode(serde_json::Error),

    /// Snapshot file contents failed to parse
    #[error("failed to parse snapshot: {0}")]
    Parse(serde_json::Error),
}

/// Writes the registry's contents to a single JSON file on disk.
#[derive(Debug, Clone)]
pub struct Snapshotter {
    registry: SharedRegistry,
    path: PathBuf,
}

impl Snapshotter {
    /// Create a snapshotter for the given registry and snapshot path
    pub fn new(registry: SharedRegistry, path: PathBuf) -> Self {
        Self { registry, path }
    }

    /// Path of the on-disk snapshot
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the on-disk snapshot with the current registry contents.
    ///
    /// The bytes are written to `<path>.tmp` and renamed into place, so the
    /// snapshot file is never observed partially written.
    pub fn persist(&self) -> Result<(), SnapshotError> {
        let bytes = self.registry.serialize().map_err(SnapshotError::Encode)?;

        let tmp_path = temp_path(&self.path);
        fs::write(&tmp_path, &bytes)?;
        fs::rename(&tmp_path, &self.path)?;

        info!(path = %self.path.display(), records = self.registry.len(), "snapshot persisted");
        Ok(())
    }
}

/// Sibling temp path for the atomic rename
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Load the snapshot file into a registry map.
///
/// The snapshot is required infrastructure: an absent or unparseable file is
/// an error, and starting up treats it as fatal.
pub fn load_snapshot(path: &Path) -> Result<BTreeMap<String, FileRecord>, SnapshotError> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(SnapshotError::Parse)
}
