//! File-based storage implementation for native platforms.

use super::{
    SnapshotStore, StorageError, StorageResult, decode_snapshot, encode_snapshot, storage_key,
};
use url::form_urlencoded;
use crate::snapshot::RoomSnapshot;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File-based storage for native platforms.
///
/// Stores each room as `canvas-<room>.json` in a base directory, with the
/// room id percent-encoded so distinct ids never share a file.
pub struct FileStorage {
    /// Base directory for snapshot files.
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new file storage with the given base directory.
    ///
    /// Creates the directory if it doesn't exist.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StorageError::Io(format!("Failed to create storage directory: {}", e))
            })?;
        }
        Ok(Self { base_path })
    }

    /// Create file storage in the default location.
    ///
    /// On Linux: `~/.local/share/sketchroom/rooms/`
    /// On Windows: `%LOCALAPPDATA%\sketchroom\rooms\`
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;

        Self::new(base.join("sketchroom").join("rooms"))
    }

    /// Get the file path for a room.
    fn snapshot_path(&self, room_id: &str) -> PathBuf {
        self.base_path
            .join(format!("{}.json", storage_key(&encode_room_id(room_id))))
    }

    /// Get the base path.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl SnapshotStore for FileStorage {
    fn load(&self, room_id: &str) -> StorageResult<RoomSnapshot> {
        let path = self.snapshot_path(room_id);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(room_id.to_string()));
            }
            Err(e) => {
                return Err(StorageError::Io(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        decode_snapshot(room_id, &json)
    }

    fn save(&self, room_id: &str, snapshot: &RoomSnapshot) -> StorageResult<()> {
        let path = self.snapshot_path(room_id);
        let json = encode_snapshot(snapshot)?;
        fs::write(&path, json).map_err(|e| {
            if e.kind() == ErrorKind::StorageFull {
                StorageError::QuotaExceeded(format!("{}: {}", path.display(), e))
            } else {
                StorageError::Io(format!("Failed to write {}: {}", path.display(), e))
            }
        })
    }

    fn clear(&self, room_id: &str) -> StorageResult<()> {
        let path = self.snapshot_path(room_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn exists(&self, room_id: &str) -> StorageResult<bool> {
        Ok(self.snapshot_path(room_id).exists())
    }

    fn list(&self) -> StorageResult<Vec<String>> {
        if !self.base_path.exists() {
            return Ok(vec![]);
        }

        let entries = fs::read_dir(&self.base_path)
            .map_err(|e| StorageError::Io(format!("Failed to read directory: {}", e)))?;

        let mut rooms = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            // Only include .json files
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Some(room) = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(|s| s.strip_prefix("canvas-"))
                {
                    rooms.push(decode_room_id(room));
                }
            }
        }
        Ok(rooms)
    }
}

/// File-name-safe, reversible form of a room id.
fn encode_room_id(room_id: &str) -> String {
    // `*` passes through form encoding but is not a valid Windows file name character
    form_urlencoded::byte_serialize(room_id.as_bytes())
        .collect::<String>()
        .replace('*', "%2A")
}

fn decode_room_id(encoded: &str) -> String {
    form_urlencoded::parse(encoded.as_bytes())
        .next()
        .map(|(room, _)| room.into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Pencil, Rectangle, Shape};
    use kurbo::Point;
    use tempfile::tempdir;

    fn sample() -> RoomSnapshot {
        RoomSnapshot::from_shapes(vec![
            Shape::from(Rectangle::new(0.0, 0.0, 0.0, 0.0)),
            Shape::from(Pencil::new(Point::new(1.0, 2.0), Point::new(3.0, 4.0))),
        ])
    }

    #[test]
    fn test_file_storage_save_load() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();

        storage.save("room-1", &sample()).unwrap();
        let loaded = storage.load("room-1").unwrap();

        assert_eq!(loaded, sample());
        assert!(dir.path().join("canvas-room-1.json").exists());
    }

    #[test]
    fn test_file_storage_not_found() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();

        let result = storage.load("nonexistent");
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_file_storage_corrupt_file() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        fs::write(dir.path().join("canvas-room-1.json"), "[{\"type\":").unwrap();

        assert!(matches!(storage.load("room-1"), Err(StorageError::Serialization(_))));
        assert!(storage.load_snapshot("room-1").is_none());
    }

    #[test]
    fn test_file_storage_list() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();

        storage.save("room1", &sample()).unwrap();
        storage.save("room2", &sample()).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let list = storage.list().unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.contains(&"room1".to_string()));
        assert!(list.contains(&"room2".to_string()));
    }

    #[test]
    fn test_file_storage_clear() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();

        storage.save("room", &sample()).unwrap();
        assert!(storage.exists("room").unwrap());

        storage.clear("room").unwrap();
        assert!(!storage.exists("room").unwrap());
        storage.clear("room").unwrap();
    }

    #[test]
    fn test_file_storage_special_characters_in_id() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();

        storage.save("team/room:with*special &=+%", &sample()).unwrap();

        let loaded = storage.load("team/room:with*special &=+%").unwrap();
        assert_eq!(loaded, sample());
        assert_eq!(storage.list().unwrap(), vec!["team/room:with*special &=+%".to_string()]);
    }

    #[test]
    fn test_file_storage_keeps_similar_ids_apart() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        let rect = RoomSnapshot::from_shapes(vec![Rectangle::new(1.0, 1.0, 1.0, 1.0).into()]);

        storage.save("team/alpha", &rect).unwrap();
        assert!(storage.load_snapshot("team_alpha").is_none());
        assert!(!storage.exists("team_alpha").unwrap());
        assert_eq!(storage.list().unwrap(), vec!["team/alpha".to_string()]);

        storage.clear("team_alpha").unwrap();
        assert!(storage.exists("team/alpha").unwrap());
        assert_eq!(storage.load_snapshot("team/alpha"), Some(rect));
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let storage = FileStorage::new(nested.clone()).unwrap();
        assert_eq!(storage.base_path(), nested.as_path());
        assert!(nested.is_dir());
    }
}
