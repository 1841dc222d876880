//! File-state registry for the chunkstream daemon.
//!
//! Process-wide mapping from client-generated file ids to metadata records.
//! All mutation goes through registry operations under a single mutex;
//! lookups hand out value copies that are safe to use after the lock is
//! released.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Error type for registry operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A status change was requested for a file id that has no record.
    /// Callers are expected to have ensured existence; hitting this is a bug.
    #[error("no record for file id '{0}'")]
    UnknownFileId(String),
}

/// Metadata record for one uploaded file.
///
/// The serde field names are part of the external contract: they appear
/// verbatim in the `/file-info` response and the snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    /// Client-provided display name, immutable after first write
    pub file_name: String,
    /// True iff a full processing pass has completed at least once
    pub is_processed: bool,
    /// True iff a processing pass is currently in flight
    pub is_processing: bool,
}

impl FileRecord {
    /// Create a fresh record with both status flags cleared
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            is_processed: false,
            is_processing: false,
        }
    }
}

/// Shared handle to the process-wide registry
pub type SharedRegistry = Arc<FileRegistry>;

/// Registry of file records keyed by file id.
///
/// A `BTreeMap` keeps `serialize` output stable across calls for the same
/// contents.
#[derive(Debug, Default)]
pub struct FileRegistry {
    inner: Mutex<BTreeMap<String, FileRecord>>,
}

impl FileRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated from a restored snapshot
    pub fn from_map(map: BTreeMap<String, FileRecord>) -> Self {
        Self {
            inner: Mutex::new(map),
        }
    }

    /// Create a shared handle to an empty registry
    pub fn shared() -> SharedRegistry {
        Arc::new(Self::new())
    }

    fn locked(&self) -> MutexGuard<'_, BTreeMap<String, FileRecord>> {
        self.inner.lock().expect("registry mutex should not be poisoned")
    }

    /// Create a record for `file_id` if none exists; no-op otherwise.
    ///
    /// Idempotent. An existing record is never overwritten, which keeps
    /// `file_name` immutable after its first write.
    pub fn ensure(&self, file_id: &str, file_name: &str) {
        let mut map = self.locked();
        map.entry(file_id.to_string())
            .or_insert_with(|| FileRecord::new(file_name));
    }

    /// Return a value copy of the record for `file_id`, if present
    pub fn lookup(&self, file_id: &str) -> Option<FileRecord> {
        self.locked().get(file_id).cloned()
    }

    /// Set `is_processing` to true.
    ///
    /// Returns `Ok(true)` if the flag actually transitioned false -> true,
    /// `Ok(false)` if a processing pass was already in flight. Callers use
    /// the returned flag to reject a second concurrent job for the same id.
    pub fn mark_processing_start(&self, file_id: &str) -> Result<bool, RegistryError> {
        let mut map = self.locked();
        let record = map
            .get_mut(file_id)
            .ok_or_else(|| RegistryError::UnknownFileId(file_id.to_string()))?;
        let transitioned = !record.is_processing;
        record.is_processing = true;
        Ok(transitioned)
    }

    /// Set `is_processing` to false
    pub fn mark_processing_end(&self, file_id: &str) -> Result<(), RegistryError> {
        let mut map = self.locked();
        let record = map
            .get_mut(file_id)
            .ok_or_else(|| RegistryError::UnknownFileId(file_id.to_string()))?;
        record.is_processing = false;
        Ok(())
    }

    /// Set `is_processed` to true. Monotonic; never cleared again.
    pub fn mark_processed(&self, file_id: &str) -> Result<(), RegistryError> {
        let mut map = self.locked();
        let record = map
            .get_mut(file_id)
            .ok_or_else(|| RegistryError::UnknownFileId(file_id.to_string()))?;
        record.is_processed = true;
        Ok(())
    }

    /// Serialize the full map to JSON under the mutex
    pub fn serialize(&self) -> Result<Vec<u8>, serde_json::Error> {
        let map = self.locked();
        serde_json::to_vec(&*map)
    }

    /// Return a value copy of the full map
    pub fn snapshot(&self) -> BTreeMap<String, FileRecord> {
        self.locked().clone()
    }

    /// Number of records in the registry
    pub fn len(&self) -> usize {
        self.locked().len()
    }

    /// True if the registry holds no records
    pub fn is_empty(&self) -> bool {
        self.locked().is_empty()
    }
}
