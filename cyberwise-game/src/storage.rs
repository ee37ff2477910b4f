//! Namespaced key/value persistence.
//!
//! The store is shaped after browser `localStorage`: string keys, JSON string
//! values. Backends only move strings around; [`PersistentStore`] owns the
//! namespace prefix and the JSON encoding, and turns every failure into a
//! logged `false`/`None` so callers never have to unwind.
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::constants::STORAGE_PREFIX;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded writing {key} ({needed} bytes, limit {limit})")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Raw string storage, the way a browser exposes `localStorage`.
///
/// Methods take `&self`; backends are handles onto shared storage.
pub trait StorageBackend {
    /// Read the raw value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is rejected (quota, IO).
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// All keys currently stored, namespaced or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// In-memory backend. Clones share the same underlying map, so a test can keep
/// one handle to inspect what the registry wrote through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    items: Rc<RefCell<BTreeMap<String, String>>>,
    quota: Option<usize>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes that would push the total stored bytes past `limit`.
    #[must_use]
    pub fn with_quota(limit: usize) -> Self {
        Self {
            items: Rc::default(),
            quota: Some(limit),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    fn used_bytes_excluding(&self, key: &str) -> usize {
        self.items
            .borrow()
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl StorageBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(limit) = self.quota {
            let needed = self.used_bytes_excluding(key) + key.len() + value.len();
            if needed > limit {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    limit,
                });
            }
        }
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.borrow_mut().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.items.borrow().keys().cloned().collect())
    }
}

/// Backend persisting every key into a single JSON document on disk.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Use (or later create) the document at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn write_all(&self, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(items)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.read_all()?;
        items.insert(key.to_string(), value.to_string());
        self.write_all(&items)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.read_all()?;
        if items.remove(key).is_some() {
            self.write_all(&items)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.read_all()?.into_keys().collect())
    }
}

/// JSON persistence scoped under a key prefix.
#[derive(Debug, Clone)]
pub struct PersistentStore<B> {
    backend: B,
    prefix: String,
}

impl<B: StorageBackend> PersistentStore<B> {
    /// Wrap `backend` using the game's default namespace.
    pub fn new(backend: B) -> Self {
        Self::with_prefix(backend, STORAGE_PREFIX)
    }

    pub fn with_prefix(backend: B, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    /// Serialize and store `value`.
    ///
    /// # Errors
    ///
    /// Returns the serialization or backend failure.
    pub fn try_save<T>(&self, key: &str, value: &T) -> Result<(), StorageError>
    where
        T: Serialize + ?Sized,
    {
        let json = serde_json::to_string(value)?;
        self.backend.set_item(&self.namespaced(key), &json)
    }

    /// Serialize and store `value`; `false` (with an error log) on failure.
    pub fn save<T>(&self, key: &str, value: &T) -> bool
    where
        T: Serialize + ?Sized,
    {
        match self.try_save(key, value) {
            Ok(()) => true,
            Err(err) => {
                log::error!("failed to save {key}: {err}");
                false
            }
        }
    }

    /// Load and decode the value under `key`.
    ///
    /// Missing keys, unreadable backends and corrupt JSON all read as `None`;
    /// the latter two are logged.
    pub fn load<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let raw = match self.backend.get_item(&self.namespaced(key)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                log::error!("failed to load {key}: {err}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                log::error!("discarding unreadable value for {key}: {err}");
                None
            }
        }
    }

    /// Remove `key`.
    ///
    /// # Errors
    ///
    /// Returns the backend failure.
    pub fn try_remove(&self, key: &str) -> Result<(), StorageError> {
        self.backend.remove_item(&self.namespaced(key))
    }

    /// Remove `key`; `false` (with an error log) on failure.
    pub fn remove(&self, key: &str) -> bool {
        match self.try_remove(key) {
            Ok(()) => true,
            Err(err) => {
                log::error!("failed to remove {key}: {err}");
                false
            }
        }
    }

    /// Remove every key under this store's prefix, leaving foreign keys alone.
    pub fn clear(&self) -> bool {
        let result = self.backend.keys().and_then(|keys| {
            keys.iter()
                .filter(|key| key.starts_with(&self.prefix))
                .try_for_each(|key| self.backend.remove_item(key))
        });
        match result {
            Ok(()) => true,
            Err(err) => {
                log::error!("failed to clear {} keys: {err}", self.prefix);
                false
            }
        }
    }
}
