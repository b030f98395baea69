//! Browser `localStorage` implementation for WebAssembly.

use super::{
    SnapshotStore, StorageError, StorageResult, decode_snapshot, encode_snapshot, storage_key,
};
use crate::snapshot::RoomSnapshot;
use web_sys::Storage;

/// `localStorage`-backed snapshot storage.
///
/// Keys are `canvas-<room>`, values the JSON shape array.
pub struct LocalStorage {
    storage: Storage,
}

impl LocalStorage {
    /// Open the window's local storage.
    pub fn new() -> StorageResult<Self> {
        let window =
            web_sys::window().ok_or_else(|| StorageError::Other("No window object".to_string()))?;
        let storage = window
            .local_storage()
            .map_err(|e| StorageError::Other(format!("localStorage error: {:?}", e)))?
            .ok_or_else(|| StorageError::Other("localStorage not available".to_string()))?;
        Ok(Self { storage })
    }
}

impl SnapshotStore for LocalStorage {
    fn load(&self, room_id: &str) -> StorageResult<RoomSnapshot> {
        let payload = self
            .storage
            .get_item(&storage_key(room_id))
            .map_err(|e| StorageError::Io(format!("getItem failed: {:?}", e)))?
            .ok_or_else(|| StorageError::NotFound(room_id.to_string()))?;
        decode_snapshot(room_id, &payload)
    }

    fn save(&self, room_id: &str, snapshot: &RoomSnapshot) -> StorageResult<()> {
        let payload = encode_snapshot(snapshot)?;
        // setItem only throws on quota exhaustion (or disabled storage)
        self.storage
            .set_item(&storage_key(room_id), &payload)
            .map_err(|e| StorageError::QuotaExceeded(format!("{:?}", e)))
    }

    fn clear(&self, room_id: &str) -> StorageResult<()> {
        self.storage
            .remove_item(&storage_key(room_id))
            .map_err(|e| StorageError::Io(format!("removeItem failed: {:?}", e)))
    }

    fn exists(&self, room_id: &str) -> StorageResult<bool> {
        self.storage
            .get_item(&storage_key(room_id))
            .map(|item| item.is_some())
            .map_err(|e| StorageError::Io(format!("getItem failed: {:?}", e)))
    }

    fn list(&self) -> StorageResult<Vec<String>> {
        let len = self
            .storage
            .length()
            .map_err(|e| StorageError::Io(format!("length failed: {:?}", e)))?;
        let mut rooms = Vec::new();
        for i in 0..len {
            if let Ok(Some(key)) = self.storage.key(i) {
                if let Some(room) = key.strip_prefix("canvas-") {
                    rooms.push(room.to_string());
                }
            }
        }
        Ok(rooms)
    }
}
