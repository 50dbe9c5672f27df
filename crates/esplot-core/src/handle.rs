//! Cloneable front of the host actor
//!
//! [`HostHandle`] is what the rest of the process talks to. It implements
//! [`RequestHandler`] for typed dispatch and [`HostLink`] so a
//! [`SurfaceApi`] can be connected in-process.

use crate::config::HostConfig;
use crate::error::{HostError, HostResult};
use crate::host::{HostActor, HostCommand};
use crate::observer::watch_last_opened;
use async_trait::async_trait;
use esplot_contract::{
    dispatch_json, ContractError, HostLink, PathArgs, RequestHandler, SeriesArgs, SurfaceApi,
    SurfaceRegistry,
};
use esplot_ingest::{Ingestor, SeriesCache};
use esplot_model::{ChannelFilePreview, ChannelId, SeriesPrimitive};
use esplot_state::{open_state, CacheIndex};
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Handle to a running host
#[derive(Debug, Clone)]
pub struct HostHandle {
    commands: mpsc::Sender<HostCommand>,
    registry: SurfaceRegistry,
}

impl HostHandle {
    /// Start a host with the default parsers
    ///
    /// # Errors
    /// - [`HostError::DataDir`] if the data directory cannot be created
    /// - [`HostError::Store`] if the persisted state cannot be opened
    pub async fn start(config: &HostConfig) -> HostResult<Self> {
        let ingestor = Ingestor::with_capacity(config.series_cache_capacity)
            .with_max_file_size(config.max_file_size);
        Self::start_with_ingestor(config, ingestor).await
    }

    /// Start a host around a preconfigured [`Ingestor`]
    ///
    /// Loads the persisted state, drops index entries whose cache
    /// directory is gone, sweeps cache directories no entry refers to and
    /// spawns the actor. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// See [`start`](Self::start)
    pub async fn start_with_ingestor(config: &HostConfig, ingestor: Ingestor) -> HostResult<Self> {
        let cache_root = config.cache_root();
        tokio::fs::create_dir_all(&cache_root)
            .await
            .map_err(|source| HostError::DataDir {
                path: cache_root.clone(),
                source,
            })?;

        let (index, opened) = open_state(&config.data_dir)?;
        let pruned = {
            let index = index.clone();
            let root = cache_root.clone();
            tokio::task::spawn_blocking(move || index.prune_missing(&root))
                .await
                .map_err(|e| HostError::DataDir {
                    path: cache_root.clone(),
                    source: std::io::Error::other(e),
                })??
        };
        if !pruned.is_empty() {
            info!(count = pruned.len(), "pruned cache entries without a directory");
        }
        sweep_orphans(&cache_root, &index, ingestor.cache()).await;

        let registry = SurfaceRegistry::new(config.event_buffer);
        let (tx, rx) = mpsc::channel(config.command_buffer.max(1));
        let observer = watch_last_opened(
            &opened,
            index.clone(),
            ingestor.cache().clone(),
            registry.clone(),
        );

        let actor = HostActor::new(
            Arc::new(ingestor),
            index,
            opened,
            registry.clone(),
            cache_root,
            first_ticket(),
            tx.downgrade(),
            observer,
        );
        tokio::spawn(actor.run(rx));

        Ok(Self {
            commands: tx,
            registry,
        })
    }

    /// Surfaces attached to this host
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &SurfaceRegistry {
        &self.registry
    }

    /// Attach an in-process surface and hand it its facade
    #[must_use]
    pub fn connect_surface(&self) -> SurfaceApi {
        let (id, events) = self.registry.attach();
        debug!(surface = %id, "in-process surface connected");
        SurfaceApi::new(Arc::new(self.clone()), events)
    }

    /// Stop the actor; later requests fail with [`HostError::Unavailable`]
    pub async fn shutdown(&self) {
        let _ = self.commands.send(HostCommand::Shutdown).await;
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<HostResult<T>>) -> HostCommand,
    ) -> HostResult<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| HostError::Unavailable)?;
        rx.await.map_err(|_| HostError::Unavailable)?
    }

    /// Parse `path`, cache it and move it to the front of the opened list
    ///
    /// Resolves once the parse has been committed or discarded. Failures
    /// are also broadcast as `fileOpenFailed`.
    ///
    /// # Errors
    /// - [`HostError::RelativePath`] unless `path` is absolute
    /// - the parse or cache failure, classified by [`HostError::kind`]
    pub async fn open_channel_file(&self, path: impl Into<String>) -> HostResult<()> {
        let path = absolute_only(path.into())?;
        self.request(|reply| HostCommand::Open { path, reply }).await
    }

    /// Axis plus one series of an opened file
    ///
    /// # Errors
    /// [`HostError::SeriesNotFound`] if the file is not cached or lacks the series
    pub async fn get_channel_file_series(
        &self,
        path: impl Into<String>,
        channel_id: ChannelId,
    ) -> HostResult<SeriesPrimitive> {
        let path = path.into();
        self.request(|reply| HostCommand::Series {
            path,
            channel_id,
            reply,
        })
        .await
    }

    /// Drop the cache entry and artifacts of `path`; idempotent
    ///
    /// # Errors
    /// [`HostError::RelativePath`] unless `path` is absolute, otherwise
    /// store or cache I/O failures
    pub async fn close_channel_file(&self, path: impl Into<String>) -> HostResult<()> {
        let path = absolute_only(path.into())?;
        self.request(|reply| HostCommand::Close { path, reply }).await
    }

    /// Cached preview of `path`
    ///
    /// # Errors
    /// [`HostError::Unavailable`] if the host has stopped
    pub async fn get_channel_file_preview(
        &self,
        path: impl Into<String>,
    ) -> HostResult<Option<ChannelFilePreview>> {
        let path = path.into();
        self.request(|reply| HostCommand::Preview { path, reply })
            .await
    }

    /// Previews of every opened, cached file, most recent first
    ///
    /// # Errors
    /// [`HostError::Unavailable`] if the host has stopped
    pub async fn get_opened_channel_files(&self) -> HostResult<Vec<ChannelFilePreview>> {
        self.request(|reply| HostCommand::OpenedFiles { reply })
            .await
    }

    /// Preview of the head of the opened list
    ///
    /// # Errors
    /// [`HostError::Unavailable`] if the host has stopped
    pub async fn get_last_opened_channel_file(&self) -> HostResult<Option<ChannelFilePreview>> {
        self.request(|reply| HostCommand::LastOpened { reply })
            .await
    }

    /// # Errors
    /// [`HostError::Unavailable`] if the host has stopped
    pub async fn get_opened_file_paths(&self) -> HostResult<Vec<String>> {
        self.request(|reply| HostCommand::OpenedPaths { reply })
            .await
    }

    /// # Errors
    /// [`HostError::Store`] if the opened list cannot be persisted
    pub async fn remove_opened_file_path(&self, path: impl Into<String>) -> HostResult<()> {
        let path = path.into();
        self.request(|reply| HostCommand::RemoveOpenedPath { path, reply })
            .await
    }
}

#[async_trait]
impl RequestHandler for HostHandle {
    type Error = HostError;

    async fn open_channel_file(&self, args: PathArgs) -> HostResult<()> {
        Self::open_channel_file(self, args.path).await
    }

    async fn get_channel_file_series(&self, args: SeriesArgs) -> HostResult<SeriesPrimitive> {
        Self::get_channel_file_series(self, args.path, args.channel_id).await
    }

    async fn close_channel_file(&self, args: PathArgs) -> HostResult<()> {
        Self::close_channel_file(self, args.path).await
    }

    async fn get_channel_file_preview(
        &self,
        args: PathArgs,
    ) -> HostResult<Option<ChannelFilePreview>> {
        Self::get_channel_file_preview(self, args.path).await
    }

    async fn get_opened_channel_files(&self) -> HostResult<Vec<ChannelFilePreview>> {
        Self::get_opened_channel_files(self).await
    }

    async fn get_last_opened_channel_file(&self) -> HostResult<Option<ChannelFilePreview>> {
        Self::get_last_opened_channel_file(self).await
    }

    async fn get_opened_file_paths(&self) -> HostResult<Vec<String>> {
        Self::get_opened_file_paths(self).await
    }

    async fn remove_opened_file_path(&self, args: PathArgs) -> HostResult<()> {
        Self::remove_opened_file_path(self, args.path).await
    }
}

#[async_trait]
impl HostLink for HostHandle {
    async fn invoke(&self, request: String) -> Result<String, ContractError> {
        Ok(dispatch_json(self, &request).await)
    }
}

fn absolute_only(path: String) -> HostResult<String> {
    if Path::new(&path).is_absolute() {
        Ok(path)
    } else {
        Err(HostError::RelativePath { path })
    }
}

/// Tickets start at the current time in milliseconds so cache directory
/// names never repeat those of an earlier run
fn first_ticket() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(1)
}

/// Remove directories under `cache_root` that no index entry refers to
///
/// Entries are matched by directory name, so the same data directory
/// reached through a symlink or a relative spelling keeps its caches.
async fn sweep_orphans(cache_root: &Path, index: &CacheIndex, cache: &SeriesCache) {
    let live: HashSet<OsString> = index
        .list()
        .into_iter()
        .filter_map(|e| e.cache_dir.file_name().map(OsStr::to_os_string))
        .collect();
    let mut entries = match tokio::fs::read_dir(cache_root).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(cache_root = %cache_root.display(), error = %e, "cannot list cache root");
            return;
        }
    };

    let mut swept = 0usize;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
        if !is_dir || live.contains(&entry.file_name()) {
            continue;
        }
        let dir = entry.path();
        match cache.remove_cache(&dir).await {
            Ok(()) => swept += 1,
            Err(e) => warn!(dir = %dir.display(), error = %e, "cannot remove orphaned cache"),
        }
    }
    if swept > 0 {
        info!(swept, "removed orphaned cache directories");
    }
}
