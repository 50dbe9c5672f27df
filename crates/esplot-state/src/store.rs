//! Persisted key/value store
//!
//! A single JSON object on disk (`state.json`), loaded once and rewritten
//! in full on every change. Writes go to a temporary sibling first and are
//! renamed into place.
//!
//! All file access is synchronous. The file holds a few hundred entries
//! at most, so callers on an async task write it inline; bulk work such as
//! startup reconciliation belongs on a blocking thread.

use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the store inside the data directory
pub const STATE_FILE: &str = "state.json";

/// JSON object persisted to one file
#[derive(Debug)]
pub struct JsonStore {
    path: Option<PathBuf>,
    data: RwLock<Map<String, Value>>,
}

impl JsonStore {
    /// Open `<data_dir>/state.json`, creating the directory if needed
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] if the directory or file cannot be read
    pub fn open_in(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::io_error(data_dir, e))?;
        Self::open(data_dir.join(STATE_FILE))
    }

    /// Open a store file
    ///
    /// A missing file is an empty store. A file that is not a JSON object
    /// is moved aside to `<name>.corrupt` and the store starts empty.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] on read failures other than not-found
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let data = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    let aside = path.with_extension("json.corrupt");
                    warn!(
                        path = %path.display(),
                        "state file is not a JSON object, starting empty"
                    );
                    if let Err(e) = std::fs::rename(&path, &aside) {
                        warn!(error = %e, "could not move corrupt state file aside");
                    }
                    Map::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(StoreError::io_error(&path, e)),
        };
        debug!(path = %path.display(), keys = data.len(), "opened state store");

        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
        })
    }

    /// Store that is never written to disk
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: RwLock::new(Map::new()),
        }
    }

    /// Backing file, if any
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current value of `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.read().get(key).cloned()
    }

    /// Set `key` and persist, blocking until the file is renamed into place
    ///
    /// On a failed write the in-memory value is rolled back.
    ///
    /// # Errors
    /// Returns [`StoreError`] if the store cannot be written
    pub fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        let mut data = self.data.write();
        let previous = data.insert(key.to_string(), value);
        let result = self.persist(&data);
        if result.is_err() {
            match previous {
                Some(previous) => data.insert(key.to_string(), previous),
                None => data.remove(key),
            };
        }
        result
    }

    /// Remove `key` and persist, blocking like [`set`](Self::set)
    ///
    /// # Errors
    /// Returns [`StoreError`] if the store cannot be written
    pub fn delete(&self, key: &str) -> StoreResult<()> {
        let mut data = self.data.write();
        let Some(previous) = data.remove(key) else {
            return Ok(());
        };
        let result = self.persist(&data);
        if result.is_err() {
            data.insert(key.to_string(), previous);
        }
        result
    }

    fn persist(&self, data: &Map<String, Value>) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(data)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes).map_err(|e| StoreError::io_error(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| StoreError::io_error(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonStore::open_in(dir.path()).unwrap();
            store.set("openedFilePath", json!(["/a", "/b"])).unwrap();
        }
        let store = JsonStore::open_in(dir.path()).unwrap();
        assert_eq!(store.get("openedFilePath"), Some(json!(["/a", "/b"])));
    }

    #[test]
    fn corrupt_file_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STATE_FILE), "[not an object").unwrap();

        let store = JsonStore::open_in(dir.path()).unwrap();
        assert_eq!(store.get("anything"), None);
        assert!(dir.path().join("state.json.corrupt").is_file());
    }

    #[test]
    fn delete_missing_key_is_noop() {
        let store = JsonStore::in_memory();
        store.delete("nope").unwrap();
        store.set("k", json!(1)).unwrap();
        store.delete("k").unwrap();
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn failed_write_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("missing-dir").join(STATE_FILE)).unwrap();

        assert!(store.set("k", json!(1)).is_err());
        assert_eq!(store.get("k"), None);
    }
}
