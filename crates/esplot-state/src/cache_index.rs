//! Source path → cache directory index
//!
//! Persisted under the `cachedChannelFiles` key as an array of
//! `{path, cacheDir}` objects. Entries that do not have that shape are
//! ignored on read.

use crate::error::StoreResult;
use crate::store::JsonStore;
use esplot_model::CachedChannelFileState;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const KEY: &str = "cachedChannelFiles";

/// At most one cache entry per source path
#[derive(Debug, Clone)]
pub struct CacheIndex {
    store: Arc<JsonStore>,
}

impl CacheIndex {
    #[must_use]
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self { store }
    }

    /// Entry for `path`; absence is a normal result
    #[must_use]
    pub fn get(&self, path: &str) -> Option<CachedChannelFileState> {
        self.entries().into_iter().find(|entry| entry.path == path)
    }

    /// Insert or replace the entry for `entry.path`
    ///
    /// # Errors
    /// Returns [`StoreError`](crate::StoreError) if the index cannot be persisted
    pub fn set(&self, entry: CachedChannelFileState) -> StoreResult<()> {
        let mut entries = self.entries();
        entries.retain(|existing| existing.path != entry.path);
        debug!(path = %entry.path, cache_dir = %entry.cache_dir.display(), "cache index set");
        entries.push(entry);
        self.write(&entries)
    }

    /// Drop the entry for `path`, returning it when there was one
    ///
    /// # Errors
    /// Returns [`StoreError`](crate::StoreError) if the index cannot be persisted
    pub fn remove(&self, path: &str) -> StoreResult<Option<CachedChannelFileState>> {
        let mut entries = self.entries();
        let Some(position) = entries.iter().position(|entry| entry.path == path) else {
            return Ok(None);
        };
        let removed = entries.remove(position);
        self.write(&entries)?;
        debug!(path, "cache index removed");
        Ok(Some(removed))
    }

    /// All entries, in no particular order
    #[must_use]
    pub fn list(&self) -> Vec<CachedChannelFileState> {
        self.entries()
    }

    /// Reconcile entries with the cache directories under `cache_root`
    ///
    /// An entry whose stored directory is gone, but whose directory name
    /// exists under `cache_root`, is pointed there (the data directory was
    /// moved or is reached under another spelling). Entries found in
    /// neither place are dropped and returned.
    ///
    /// Probes the file system synchronously.
    ///
    /// # Errors
    /// Returns [`StoreError`](crate::StoreError) if the index cannot be persisted
    pub fn prune_missing(&self, cache_root: &Path) -> StoreResult<Vec<CachedChannelFileState>> {
        let mut kept = Vec::new();
        let mut pruned = Vec::new();
        let mut rebased = 0usize;
        for mut entry in self.entries() {
            if entry.cache_dir.is_dir() {
                kept.push(entry);
                continue;
            }
            match entry.cache_dir.file_name().map(|name| cache_root.join(name)) {
                Some(moved) if moved.is_dir() => {
                    debug!(path = %entry.path, cache_dir = %moved.display(), "cache index rebased");
                    entry.cache_dir = moved;
                    rebased += 1;
                    kept.push(entry);
                }
                _ => pruned.push(entry),
            }
        }
        if !pruned.is_empty() || rebased > 0 {
            self.write(&kept)?;
            info!(pruned = pruned.len(), rebased, "reconciled cache index entries");
        }
        Ok(pruned)
    }

    fn entries(&self) -> Vec<CachedChannelFileState> {
        match self.store.get(KEY) {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    fn write(&self, entries: &[CachedChannelFileState]) -> StoreResult<()> {
        self.store.set(KEY, serde_json::to_value(entries)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn index() -> CacheIndex {
        CacheIndex::new(Arc::new(JsonStore::in_memory()))
    }

    #[test]
    fn get_absent_is_none() {
        assert_eq!(index().get("/a.json"), None);
    }

    #[test]
    fn set_replaces_existing_entry() {
        let index = index();
        index.set(CachedChannelFileState::new("/a.json", "/c/1")).unwrap();
        index.set(CachedChannelFileState::new("/b.json", "/c/2")).unwrap();
        index.set(CachedChannelFileState::new("/a.json", "/c/3")).unwrap();

        assert_eq!(index.list().len(), 2);
        assert_eq!(
            index.get("/a.json"),
            Some(CachedChannelFileState::new("/a.json", "/c/3"))
        );
    }

    #[test]
    fn remove_is_idempotent() {
        let index = index();
        index.set(CachedChannelFileState::new("/a.json", "/c/1")).unwrap();

        assert!(index.remove("/a.json").unwrap().is_some());
        assert!(index.remove("/a.json").unwrap().is_none());
        assert!(index.list().is_empty());
    }

    #[test]
    fn malformed_entries_are_ignored() {
        let store = Arc::new(JsonStore::in_memory());
        store
            .set(
                KEY,
                json!([{"path": "/a.json", "cacheDir": "/c/1"}, {"path": 3}, "junk"]),
            )
            .unwrap();

        let index = CacheIndex::new(store);
        assert_eq!(index.list(), vec![CachedChannelFileState::new("/a.json", "/c/1")]);
    }

    #[test]
    fn prune_drops_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let index = index();
        index.set(CachedChannelFileState::new("/live.json", dir.path())).unwrap();
        index
            .set(CachedChannelFileState::new("/gone.json", dir.path().join("gone")))
            .unwrap();

        let pruned = index.prune_missing(dir.path()).unwrap();
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].path, "/gone.json");
        assert!(index.get("/live.json").is_some());
        assert!(index.get("/gone.json").is_none());
    }

    #[test]
    fn prune_rebases_entries_onto_the_current_root() {
        let old_root = tempfile::tempdir().unwrap();
        let new_root = tempfile::tempdir().unwrap();
        std::fs::create_dir(new_root.path().join("file-ab-7")).unwrap();
        let index = index();
        index
            .set(CachedChannelFileState::new(
                "/a.json",
                old_root.path().join("moved-away").join("file-ab-7"),
            ))
            .unwrap();

        let pruned = index.prune_missing(new_root.path()).unwrap();

        assert!(pruned.is_empty());
        assert_eq!(
            index.get("/a.json"),
            Some(CachedChannelFileState::new(
                "/a.json",
                new_root.path().join("file-ab-7")
            ))
        );
    }
}
