//! Best-effort fan-out of events to live surfaces
//!
//! Each attached surface owns a bounded queue of encoded events. A full
//! queue drops the event for that surface only; a closed queue detaches
//! the surface. Broadcasting never fails and never blocks the host.

use crate::events::Event;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace, warn};

/// Default per-surface queue depth
pub const DEFAULT_EVENT_BUFFER: usize = 1024;

/// Identifier of an attached surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

struct Inner {
    surfaces: DashMap<SurfaceId, mpsc::Sender<String>>,
    next_id: AtomicU64,
    buffer: usize,
}

/// Registry of live surfaces
#[derive(Clone)]
pub struct SurfaceRegistry {
    inner: Arc<Inner>,
}

impl fmt::Debug for SurfaceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceRegistry")
            .field("live", &self.live_count())
            .field("buffer", &self.inner.buffer)
            .finish()
    }
}

impl Default for SurfaceRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

impl SurfaceRegistry {
    /// Registry whose surfaces queue up to `buffer` events each
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                surfaces: DashMap::new(),
                next_id: AtomicU64::new(1),
                buffer: buffer.max(1),
            }),
        }
    }

    /// Attach a surface; events arrive on the returned receiver as JSON
    pub fn attach(&self) -> (SurfaceId, mpsc::Receiver<String>) {
        let id = SurfaceId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.inner.buffer);
        self.inner.surfaces.insert(id, tx);
        debug!(surface = %id, "surface attached");
        (id, rx)
    }

    /// Detach a surface; returns whether it was attached
    pub fn detach(&self, id: SurfaceId) -> bool {
        let removed = self.inner.surfaces.remove(&id).is_some();
        if removed {
            debug!(surface = %id, "surface detached");
        }
        removed
    }

    /// Number of attached surfaces
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.inner.surfaces.len()
    }

    /// Push `event` to every live surface
    ///
    /// Returns how many surfaces accepted it.
    pub fn broadcast(&self, event: &Event) -> usize {
        let raw = match event.to_json() {
            Ok(raw) => raw,
            Err(e) => {
                warn!(event = %event.kind(), error = %e, "dropping unencodable event");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for entry in self.inner.surfaces.iter() {
            match entry.value().try_send(raw.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        surface = %entry.key(),
                        event = %event.kind(),
                        "surface queue full, event dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }

        // Pruned after iterating, removing while holding a shard guard deadlocks
        for id in closed {
            self.inner.surfaces.remove(&id);
            debug!(surface = %id, "pruned closed surface");
        }

        trace!(event = %event.kind(), delivered, "event broadcast");
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LastOpenedFile;
    use pretty_assertions::assert_eq;

    fn event(path: &str) -> Event {
        Event::LastOpenedFileChanged(LastOpenedFile {
            path: path.to_string(),
        })
    }

    #[tokio::test]
    async fn every_live_surface_receives_the_event() {
        let registry = SurfaceRegistry::default();
        let (_, mut first) = registry.attach();
        let (_, mut second) = registry.attach();

        assert_eq!(registry.broadcast(&event("/a")), 2);

        for rx in [&mut first, &mut second] {
            let raw = rx.recv().await.unwrap();
            assert_eq!(Event::from_json(&raw).unwrap(), event("/a"));
        }
    }

    #[tokio::test]
    async fn closed_surfaces_are_pruned() {
        let registry = SurfaceRegistry::default();
        let (_, rx) = registry.attach();
        let (_, mut live) = registry.attach();
        drop(rx);

        assert_eq!(registry.broadcast(&event("/a")), 1);
        assert_eq!(registry.live_count(), 1);
        assert!(live.recv().await.is_some());
    }

    #[test]
    fn full_queue_drops_without_failing() {
        let registry = SurfaceRegistry::new(1);
        let (_, _rx) = registry.attach();

        assert_eq!(registry.broadcast(&event("/a")), 1);
        assert_eq!(registry.broadcast(&event("/b")), 0);
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn broadcast_without_surfaces_is_a_no_op() {
        assert_eq!(SurfaceRegistry::default().broadcast(&event("/a")), 0);
    }

    #[test]
    fn detach_is_idempotent() {
        let registry = SurfaceRegistry::default();
        let (id, _rx) = registry.attach();
        assert!(registry.detach(id));
        assert!(!registry.detach(id));
    }
}
