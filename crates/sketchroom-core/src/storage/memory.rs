//! In-memory storage implementation.

use super::{
    SnapshotStore, StorageError, StorageResult, decode_snapshot, encode_snapshot, storage_key,
};
use crate::snapshot::RoomSnapshot;
use std::cell::RefCell;
use std::collections::HashMap;

/// In-memory storage for testing and ephemeral use.
///
/// Payloads are kept serialized, the same way a browser's `localStorage`
/// keeps them, so corrupt entries and quota limits behave like the real
/// backends.
#[derive(Default)]
pub struct MemoryStorage {
    entries: RefCell<HashMap<String, String>>,
    /// Maximum total payload size in bytes (None = unlimited).
    quota: Option<usize>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory storage that refuses writes past `bytes` of payload.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
            quota: Some(bytes),
        }
    }

    /// Store a raw payload for a room, bypassing serialization.
    pub fn insert_raw(&self, room_id: &str, payload: impl Into<String>) {
        self.entries
            .borrow_mut()
            .insert(storage_key(room_id), payload.into());
    }

    /// Raw payload stored for a room.
    pub fn raw(&self, room_id: &str) -> Option<String> {
        self.entries.borrow().get(&storage_key(room_id)).cloned()
    }

    fn used_bytes_except(&self, key: &str) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(_, v)| v.len())
            .sum()
    }
}

impl SnapshotStore for MemoryStorage {
    fn load(&self, room_id: &str) -> StorageResult<RoomSnapshot> {
        let entries = self.entries.borrow();
        let payload = entries
            .get(&storage_key(room_id))
            .ok_or_else(|| StorageError::NotFound(room_id.to_string()))?;
        decode_snapshot(room_id, payload)
    }

    fn save(&self, room_id: &str, snapshot: &RoomSnapshot) -> StorageResult<()> {
        let key = storage_key(room_id);
        let payload = encode_snapshot(snapshot)?;
        if let Some(quota) = self.quota {
            let needed = self.used_bytes_except(&key) + payload.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded(format!(
                    "{} bytes needed, {} allowed",
                    needed, quota
                )));
            }
        }
        self.entries.borrow_mut().insert(key, payload);
        Ok(())
    }

    fn clear(&self, room_id: &str) -> StorageResult<()> {
        self.entries.borrow_mut().remove(&storage_key(room_id));
        Ok(())
    }

    fn exists(&self, room_id: &str) -> StorageResult<bool> {
        Ok(self.entries.borrow().contains_key(&storage_key(room_id)))
    }

    fn list(&self) -> StorageResult<Vec<String>> {
        Ok(self
            .entries
            .borrow()
            .keys()
            .filter_map(|k| k.strip_prefix("canvas-").map(str::to_string))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Circle, Rectangle, Shape};
    use kurbo::Point;

    fn sample() -> RoomSnapshot {
        RoomSnapshot::from_shapes(vec![
            Shape::from(Rectangle::new(10.0, 10.0, 40.0, 30.0)),
            Shape::from(Circle::new(Point::new(20.0, 20.0), 20.0)),
        ])
    }

    #[test]
    fn test_save_and_load() {
        let storage = MemoryStorage::new();
        let snapshot = sample();

        storage.save("room-1", &snapshot).unwrap();
        let loaded = storage.load("room-1").unwrap();

        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn test_not_found() {
        let storage = MemoryStorage::new();
        let result = storage.load("nonexistent");

        assert!(matches!(result, Err(StorageError::NotFound(_))));
        assert!(storage.load_snapshot("nonexistent").is_none());
    }

    #[test]
    fn test_corrupt_payload_is_no_data() {
        let storage = MemoryStorage::new();
        storage.insert_raw("room-1", "{not json");
        assert!(matches!(storage.load("room-1"), Err(StorageError::Serialization(_))));
        assert!(storage.load_snapshot("room-1").is_none());

        storage.insert_raw("room-2", r#"[{"type":"hexagon"}]"#);
        assert!(storage.load_snapshot("room-2").is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let storage = MemoryStorage::new();
        storage.save("room-1", &sample()).unwrap();
        storage.save("room-1", &RoomSnapshot::new()).unwrap();
        assert!(storage.load("room-1").unwrap().is_empty());
    }

    #[test]
    fn test_clear_and_exists() {
        let storage = MemoryStorage::new();

        assert!(!storage.exists("room-1").unwrap());
        storage.save("room-1", &sample()).unwrap();
        assert!(storage.exists("room-1").unwrap());
        storage.clear("room-1").unwrap();
        assert!(!storage.exists("room-1").unwrap());
        storage.clear("room-1").unwrap();
    }

    #[test]
    fn test_list() {
        let storage = MemoryStorage::new();
        storage.save("a", &sample()).unwrap();
        storage.save("b", &sample()).unwrap();

        let mut list = storage.list().unwrap();
        list.sort();
        assert_eq!(list, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_quota_exceeded() {
        let storage = MemoryStorage::with_quota(64);
        storage.save("room-1", &RoomSnapshot::new()).unwrap();

        let result = storage.save("room-1", &sample());
        assert!(matches!(result, Err(StorageError::QuotaExceeded(_))));
        // The previous payload survives a rejected write.
        assert_eq!(storage.raw("room-1").as_deref(), Some("[]"));
    }

    #[test]
    fn test_stored_under_canvas_key() {
        let storage = MemoryStorage::new();
        storage.save("abc", &RoomSnapshot::new()).unwrap();
        assert_eq!(storage.list().unwrap(), vec!["abc".to_string()]);
        assert_eq!(storage_key("abc"), "canvas-abc");
    }
}
