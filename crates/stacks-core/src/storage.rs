//! String-keyed blob storage
//!
//! Everything the client persists (chat log, identity, logged-in profile) lives
//! behind [`KeyValueStore`]. The file-backed store keeps all keys in one JSON
//! object and rewrites the whole file on every change, the same way browser
//! local storage behaves for a single origin.

use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Key holding the serialized chat log
pub const CHAT_HISTORY_KEY: &str = "chatHistory";
/// Key holding the per-installation user id
pub const USER_ID_KEY: &str = "userId";
/// Key holding the locally logged-in profile
pub const CURRENT_USER_KEY: &str = "currentUser";

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

pub type SharedStore = Arc<dyn KeyValueStore>;

/// Single JSON file holding every key.
///
/// Reads go to disk each time so a second process sees our writes, but there is
/// no locking: two writers racing will drop one another's changes.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| anyhow!("Failed to read storage file {:?}: {}", self.path, e))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&content)
            .map_err(|e| anyhow!("Storage file {:?} is corrupt: {}", self.path, e))
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

/// In-process store, used for tests and throwaway runs
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Store whose every operation fails, standing in for inaccessible storage
    pub(crate) struct UnavailableStore;

    impl KeyValueStore for UnavailableStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(anyhow!("storage unavailable"))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(anyhow!("storage unavailable"))
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Err(anyhow!("storage unavailable"))
        }
    }

    #[test]
    fn test_file_store_missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("storage.json"));

        assert_eq!(store.get(USER_ID_KEY).unwrap(), None);
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        FileStore::new(&path).set(USER_ID_KEY, "abc").unwrap();
        FileStore::new(&path).set(CURRENT_USER_KEY, "{}").unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get(USER_ID_KEY).unwrap().as_deref(), Some("abc"));
        assert_eq!(reopened.get(CURRENT_USER_KEY).unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_file_store_remove() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("storage.json"));

        store.set(USER_ID_KEY, "abc").unwrap();
        store.remove(USER_ID_KEY).unwrap();
        store.remove("never-set").unwrap();

        assert_eq!(store.get(USER_ID_KEY).unwrap(), None);
    }

    #[test]
    fn test_file_store_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "not json").unwrap();

        assert!(FileStore::new(&path).get(USER_ID_KEY).is_err());
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }
}
