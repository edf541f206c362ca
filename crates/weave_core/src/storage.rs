//! Durable key-value storage backends for state snapshots
//!
//! The store talks to storage through the [`Storage`] trait, mirroring the
//! get/set/remove shape of browser local storage. Two backends ship:
//!
//! - [`MemoryStorage`] - shared in-process map; clones see the same data, so a
//!   test can build a second store over it to simulate a reload
//! - [`FileStorage`] - one JSON file per key under a directory

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::StorageError;

/// Key written and removed by [`Storage::is_available`]
const PROBE_KEY: &str = "__storage_test__";

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Synchronous key-value storage
pub trait Storage {
    /// Read a value; `Ok(None)` when the key is absent
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any existing one
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value; removing an absent key is not an error
    fn remove_item(&self, key: &str) -> Result<()>;

    /// Probe whether the backend accepts writes right now
    fn is_available(&self) -> bool {
        self.set_item(PROBE_KEY, PROBE_KEY).is_ok() && self.remove_item(PROBE_KEY).is_ok()
    }
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        (**self).remove_item(key)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    items: HashMap<String, String>,
    /// Maximum total bytes of keys and values
    quota: Option<usize>,
    unavailable: bool,
}

impl MemoryInner {
    fn usage_with(&self, key: &str, value: &str) -> usize {
        let others: usize = self
            .items
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum();
        others + key.len() + value.len()
    }
}

/// In-memory storage shared between clones
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage that rejects writes past `bytes` total
    pub fn with_quota(bytes: usize) -> Self {
        let storage = Self::default();
        storage.inner.borrow_mut().quota = Some(bytes);
        storage
    }

    /// Toggle availability; unavailable storage fails every operation
    pub fn set_available(&self, available: bool) {
        self.inner.borrow_mut().unavailable = !available;
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.inner.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<()> {
        if self.inner.borrow().unavailable {
            return Err(StorageError::Unavailable("memory storage disabled".to_string()));
        }
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        Ok(self.inner.borrow().items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.check_available()?;
        let mut inner = self.inner.borrow_mut();
        if let Some(quota) = inner.quota {
            let needed = inner.usage_with(key, value);
            if needed > quota {
                return Err(StorageError::QuotaExceeded { needed, quota });
            }
        }
        inner.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.check_available()?;
        self.inner.borrow_mut().items.remove(key);
        Ok(())
    }
}

/// File-backed storage, one `<key>.json` file per key
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open storage rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_clones_share_items() {
        let storage = MemoryStorage::new();
        let other = storage.clone();
        storage.set_item("k", "v").unwrap();
        assert_eq!(other.get_item("k").unwrap().as_deref(), Some("v"));
        other.remove_item("k").unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_memory_quota() {
        let storage = MemoryStorage::with_quota(8);
        storage.set_item("k", "1234").unwrap();
        let err = storage.set_item("k", "123456789").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { quota: 8, .. }));
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("1234"));
    }

    #[test]
    fn test_memory_unavailable() {
        let storage = MemoryStorage::new();
        assert!(storage.is_available());
        storage.set_available(false);
        assert!(!storage.is_available());
        assert!(matches!(
            storage.get_item("k"),
            Err(StorageError::Unavailable(_))
        ));
    }

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path().join("data")).unwrap();

        assert_eq!(storage.get_item("weave-todos").unwrap(), None);
        storage.set_item("weave-todos", "{\"a\":1}").unwrap();
        assert_eq!(
            storage.get_item("weave-todos").unwrap().as_deref(),
            Some("{\"a\":1}")
        );
        assert!(storage.path_for("weave-todos").exists());
        assert!(storage.is_available());

        storage.remove_item("weave-todos").unwrap();
        storage.remove_item("weave-todos").unwrap();
        assert_eq!(storage.get_item("weave-todos").unwrap(), None);
    }

    #[test]
    fn test_file_storage_sanitizes_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        assert_eq!(
            storage.path_for("../evil key"),
            dir.path().join("___evil_key.json")
        );
    }
}
