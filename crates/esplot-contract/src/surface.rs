//! Capability facade handed to a presentation surface
//!
//! A surface gets a [`SurfaceApi`] and nothing else: one method per
//! whitelisted channel plus typed event subscriptions. There is no
//! generic "send anything" entry point.

use crate::channels::{
    Channel, CloseChannelFile, GetChannelFilePreview, GetChannelFileSeries,
    GetLastOpenedChannelFile, GetOpenedChannelFiles, GetOpenedFilePaths, OpenChannelFile,
    PathArgs, RemoveOpenedFilePath, SeriesArgs,
};
use crate::error::{ContractError, ContractResult};
use crate::events::{on, Event, EventChannel, EventKind};
use crate::reply::Reply;
use async_trait::async_trait;
use esplot_model::{ChannelFilePreview, ChannelId, SeriesPrimitive};
use parking_lot::Mutex;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

/// Request transport from a surface to the host
///
/// Carries wire strings both ways; the host answers every request with
/// one reply.
#[async_trait]
pub trait HostLink: Send + Sync {
    /// Send an encoded request and wait for the encoded reply
    async fn invoke(&self, request: String) -> Result<String, ContractError>;
}

type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, EventKind, Listener)>>,
}

impl Listeners {
    fn add(&self, kind: EventKind, listener: Listener) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().push((id, kind, listener));
        id
    }

    fn remove(&self, id: u64) {
        self.entries.lock().retain(|(existing, _, _)| *existing != id);
    }

    fn emit(&self, event: &Event) {
        let kind = event.kind();
        let matching: Vec<Listener> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, listener)| Arc::clone(listener))
            .collect();
        trace!(event = %kind, listeners = matching.len(), "dispatching event");
        for listener in matching {
            // A panicking listener must not end the pump for the others
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!(event = %kind, "event listener panicked");
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Handle returned by [`SurfaceApi::on`]; unsubscribes on drop
#[must_use = "dropping an EventSubscription unsubscribes immediately"]
pub struct EventSubscription {
    id: u64,
    kind: EventKind,
    listeners: Weak<Listeners>,
}

impl EventSubscription {
    /// Stop receiving events
    pub fn unsubscribe(self) {}

    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.remove(self.id);
        }
    }
}

impl fmt::Debug for EventSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSubscription")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Whitelisted surface-side API
pub struct SurfaceApi {
    link: Arc<dyn HostLink>,
    listeners: Arc<Listeners>,
    pump: JoinHandle<()>,
}

impl fmt::Debug for SurfaceApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceApi")
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl Drop for SurfaceApi {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

impl SurfaceApi {
    /// Build the facade over a request link and an event queue
    ///
    /// Must be called from within a Tokio runtime; events are decoded and
    /// delivered to listeners on a background task.
    pub fn new(link: Arc<dyn HostLink>, mut events: mpsc::Receiver<String>) -> Self {
        let listeners = Arc::new(Listeners::default());
        let sink = Arc::clone(&listeners);
        let pump = tokio::spawn(async move {
            while let Some(raw) = events.recv().await {
                match Event::from_json(&raw) {
                    Ok(event) => sink.emit(&event),
                    Err(e) => warn!(error = %e, "ignoring undecodable event"),
                }
            }
        });
        Self {
            link,
            listeners,
            pump,
        }
    }

    async fn invoke<C: Channel>(&self, args: C::Args) -> ContractResult<C::Output> {
        let request = C::request(args).to_json()?;
        let raw = self.link.invoke(request).await?;
        match serde_json::from_str::<Reply>(&raw).map_err(ContractError::Decode)? {
            Reply::Ok(value) => serde_json::from_value(value).map_err(ContractError::Decode),
            Reply::Err(error) => Err(ContractError::Remote {
                channel: C::NAME,
                error,
            }),
        }
    }

    /// `openChannelFile`
    ///
    /// Completes once the host has parsed and cached the file. Every live
    /// surface also sees the outcome as a `channelFileOpened` or
    /// `fileOpenFailed` event.
    ///
    /// # Errors
    /// Returns [`ContractError::Remote`] naming the parse or cache failure
    pub async fn open_channel_file(&self, path: impl Into<String>) -> ContractResult<()> {
        self.invoke::<OpenChannelFile>(PathArgs::new(path)).await
    }

    /// `getChannelFileSeries`
    ///
    /// # Errors
    /// Returns [`ContractError::Remote`] with `series_not_found` when the
    /// file is not opened or has no such series
    pub async fn get_channel_file_series(
        &self,
        path: impl Into<String>,
        channel_id: ChannelId,
    ) -> ContractResult<SeriesPrimitive> {
        self.invoke::<GetChannelFileSeries>(SeriesArgs::new(path, channel_id))
            .await
    }

    /// `closeChannelFile`
    ///
    /// # Errors
    /// Returns [`ContractError`] if the cache cannot be removed
    pub async fn close_channel_file(&self, path: impl Into<String>) -> ContractResult<()> {
        self.invoke::<CloseChannelFile>(PathArgs::new(path)).await
    }

    /// `getChannelFilePreview`
    ///
    /// # Errors
    /// Returns [`ContractError`] if the host is unreachable
    pub async fn get_channel_file_preview(
        &self,
        path: impl Into<String>,
    ) -> ContractResult<Option<ChannelFilePreview>> {
        self.invoke::<GetChannelFilePreview>(PathArgs::new(path))
            .await
    }

    /// `getOpenedChannelFiles`
    ///
    /// # Errors
    /// Returns [`ContractError`] if the host is unreachable
    pub async fn get_opened_channel_files(&self) -> ContractResult<Vec<ChannelFilePreview>> {
        self.invoke::<GetOpenedChannelFiles>(()).await
    }

    /// `getLastOpenedChannelFile`
    ///
    /// # Errors
    /// Returns [`ContractError`] if the host is unreachable
    pub async fn get_last_opened_channel_file(
        &self,
    ) -> ContractResult<Option<ChannelFilePreview>> {
        self.invoke::<GetLastOpenedChannelFile>(()).await
    }

    /// `getOpenedFilePaths`
    ///
    /// # Errors
    /// Returns [`ContractError`] if the host is unreachable
    pub async fn get_opened_file_paths(&self) -> ContractResult<Vec<String>> {
        self.invoke::<GetOpenedFilePaths>(()).await
    }

    /// `removeOpenedFilePath`
    ///
    /// # Errors
    /// Returns [`ContractError`] if the opened list cannot be persisted
    pub async fn remove_opened_file_path(&self, path: impl Into<String>) -> ContractResult<()> {
        self.invoke::<RemoveOpenedFilePath>(PathArgs::new(path))
            .await
    }

    /// Subscribe to one event kind with a typed callback
    pub fn on<E, F>(&self, callback: F) -> EventSubscription
    where
        E: EventChannel,
        F: Fn(E::Payload) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(move |event: &Event| {
            if let Some(payload) = E::payload(event) {
                callback(payload);
            }
        });
        let id = self.listeners.add(E::KIND, listener);
        EventSubscription {
            id,
            kind: E::KIND,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// `onChannelFileOpened`: a file finished parsing and is cached
    pub fn on_channel_file_opened<F>(&self, callback: F) -> EventSubscription
    where
        F: Fn(ChannelFilePreview) + Send + Sync + 'static,
    {
        self.on::<on::ChannelFileOpened, _>(callback)
    }

    /// `onLastOpenedFileChanged`: the head of the opened list moved
    pub fn on_last_opened_file_changed<F>(&self, callback: F) -> EventSubscription
    where
        F: Fn(crate::events::LastOpenedFile) + Send + Sync + 'static,
    {
        self.on::<on::LastOpenedFileChanged, _>(callback)
    }

    /// `onLastOpenedFileParsedChanged`: the preview of the new head is readable
    pub fn on_last_opened_file_parsed_changed<F>(&self, callback: F) -> EventSubscription
    where
        F: Fn(ChannelFilePreview) + Send + Sync + 'static,
    {
        self.on::<on::LastOpenedFileParsedChanged, _>(callback)
    }

    /// `onFileOpenFailed`
    pub fn on_file_open_failed<F>(&self, callback: F) -> EventSubscription
    where
        F: Fn(crate::events::FileOpenFailed) + Send + Sync + 'static,
    {
        self.on::<on::FileOpenFailed, _>(callback)
    }

    /// Number of registered listeners
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}
