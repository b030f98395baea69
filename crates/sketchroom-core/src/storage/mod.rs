//! Durable per-room snapshot storage.

mod memory;

#[cfg(not(target_arch = "wasm32"))]
mod file;

#[cfg(target_arch = "wasm32")]
mod local_storage;

pub use memory::MemoryStorage;

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStorage;

#[cfg(target_arch = "wasm32")]
pub use local_storage::LocalStorage;

use crate::snapshot::RoomSnapshot;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Snapshot not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Key under which a room's snapshot is stored.
pub fn storage_key(room_id: &str) -> String {
    format!("canvas-{room_id}")
}

/// Trait for snapshot storage backends.
///
/// One snapshot per room, last write wins. Merging is the caller's job.
/// The engine is single-threaded, so implementations need not be `Send`.
pub trait SnapshotStore {
    /// Load a room's snapshot.
    fn load(&self, room_id: &str) -> StorageResult<RoomSnapshot>;

    /// Save a room's snapshot, replacing whatever was stored.
    fn save(&self, room_id: &str, snapshot: &RoomSnapshot) -> StorageResult<()>;

    /// Delete a room's snapshot. Clearing a missing room is not an error.
    fn clear(&self, room_id: &str) -> StorageResult<()>;

    /// Check if a room has a stored snapshot.
    fn exists(&self, room_id: &str) -> StorageResult<bool>;

    /// List the room ids with stored snapshots.
    fn list(&self) -> StorageResult<Vec<String>>;

    /// Load a room's snapshot, treating a missing entry and an unreadable
    /// payload alike as "no data".
    fn load_snapshot(&self, room_id: &str) -> Option<RoomSnapshot> {
        match self.load(room_id) {
            Ok(snapshot) => Some(snapshot),
            Err(StorageError::NotFound(_)) => None,
            Err(e) => {
                log::warn!("Ignoring stored snapshot for room {}: {}", room_id, e);
                None
            }
        }
    }
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for std::sync::Arc<T> {
    fn load(&self, room_id: &str) -> StorageResult<RoomSnapshot> {
        (**self).load(room_id)
    }

    fn save(&self, room_id: &str, snapshot: &RoomSnapshot) -> StorageResult<()> {
        (**self).save(room_id, snapshot)
    }

    fn clear(&self, room_id: &str) -> StorageResult<()> {
        (**self).clear(room_id)
    }

    fn exists(&self, room_id: &str) -> StorageResult<bool> {
        (**self).exists(room_id)
    }

    fn list(&self) -> StorageResult<Vec<String>> {
        (**self).list()
    }
}

/// Parse a stored payload.
pub(crate) fn decode_snapshot(room_id: &str, payload: &str) -> StorageResult<RoomSnapshot> {
    RoomSnapshot::from_json(payload).map_err(|e| {
        StorageError::Serialization(format!("Failed to parse snapshot for {}: {}", room_id, e))
    })
}

/// Serialize a snapshot for storage.
pub(crate) fn encode_snapshot(snapshot: &RoomSnapshot) -> StorageResult<String> {
    snapshot
        .to_json()
        .map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Create a platform-appropriate storage backend.
#[cfg(not(target_arch = "wasm32"))]
pub fn create_default_storage() -> StorageResult<FileStorage> {
    FileStorage::default_location()
}

#[cfg(target_arch = "wasm32")]
pub fn create_default_storage() -> StorageResult<LocalStorage> {
    LocalStorage::new()
}
