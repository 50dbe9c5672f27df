//! Ordered list of opened file paths
//!
//! Most recent first, no duplicates. The head of the list is the "last
//! opened" file; subscribers are told whenever the head changes.
//! Persisted under the `openedFilePath` key.

use crate::error::StoreResult;
use crate::store::JsonStore;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

const KEY: &str = "openedFilePath";

type Callback = Arc<dyn Fn(Option<&str>) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(u64, Callback)>>,
}

impl Subscribers {
    fn add(&self, callback: Callback) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks.lock().push((id, callback));
        id
    }

    fn remove(&self, id: u64) {
        self.callbacks.lock().retain(|(existing, _)| *existing != id);
    }

    fn snapshot(&self) -> Vec<Callback> {
        self.callbacks
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect()
    }
}

/// Handle returned by [`OpenedFilesState::on_last_opened_file_path_change`]
///
/// The callback stays registered until [`Subscription::unsubscribe`] is
/// called or the handle is dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    subscribers: Weak<Subscribers>,
}

impl Subscription {
    /// Stop receiving notifications
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.remove(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// `[new] ++ old.filter(p != new)`
#[must_use]
pub fn merge_opened(paths: &[String], new: &str) -> Vec<String> {
    std::iter::once(new.to_string())
        .chain(paths.iter().filter(|p| p.as_str() != new).cloned())
        .collect()
}

/// Opened-files list plus change subscriptions
#[derive(Clone)]
pub struct OpenedFilesState {
    store: Arc<JsonStore>,
    subscribers: Arc<Subscribers>,
}

impl fmt::Debug for OpenedFilesState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenedFilesState")
            .field("paths", &self.get_opened_file_paths())
            .field("subscribers", &self.subscribers.callbacks.lock().len())
            .finish()
    }
}

impl OpenedFilesState {
    #[must_use]
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self {
            store,
            subscribers: Arc::new(Subscribers::default()),
        }
    }

    /// Replace the list wholesale
    ///
    /// Duplicates are dropped, keeping the first occurrence. Subscribers
    /// are notified after the write when the head changed.
    ///
    /// # Errors
    /// Returns [`StoreError`](crate::StoreError) if the list cannot be persisted
    pub fn save_opened_file_paths(&self, paths: Vec<String>) -> StoreResult<()> {
        let mut deduped: Vec<String> = Vec::with_capacity(paths.len());
        for path in paths {
            if !deduped.contains(&path) {
                deduped.push(path);
            }
        }

        let before = self.get_last_opened_file_path();
        self.store.set(KEY, serde_json::to_value(&deduped)?)?;
        let after = deduped.into_iter().next();

        if before != after {
            debug!(last_opened = ?after, "last opened file changed");
            for callback in self.subscribers.snapshot() {
                if catch_unwind(AssertUnwindSafe(|| callback(after.as_deref()))).is_err() {
                    warn!(last_opened = ?after, "last opened subscriber panicked");
                }
            }
        }
        Ok(())
    }

    /// Opened paths, most recent first
    #[must_use]
    pub fn get_opened_file_paths(&self) -> Vec<String> {
        match self.store.get(KEY) {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(path) => Some(path),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Head of the list
    #[must_use]
    pub fn get_last_opened_file_path(&self) -> Option<String> {
        self.get_opened_file_paths().into_iter().next()
    }

    /// Move `path` to the front, inserting it if absent
    ///
    /// # Errors
    /// Returns [`StoreError`](crate::StoreError) if the list cannot be persisted
    pub fn push_front(&self, path: &str) -> StoreResult<()> {
        let merged = merge_opened(&self.get_opened_file_paths(), path);
        self.save_opened_file_paths(merged)
    }

    /// Remove `path` from the list; a no-op when it is not listed
    ///
    /// # Errors
    /// Returns [`StoreError`](crate::StoreError) if the list cannot be persisted
    pub fn remove(&self, path: &str) -> StoreResult<()> {
        let mut paths = self.get_opened_file_paths();
        let before = paths.len();
        paths.retain(|p| p != path);
        if paths.len() == before {
            return Ok(());
        }
        self.save_opened_file_paths(paths)
    }

    /// Call `callback` with the new head whenever it changes
    pub fn on_last_opened_file_path_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&str>) + Send + Sync + 'static,
    {
        let id = self.subscribers.add(Arc::new(callback));
        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }
}
