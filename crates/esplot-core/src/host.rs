//! Host actor - the single writer of host state
//!
//! All Cache Index and Opened-Files State mutations happen on the actor
//! task, one command at a time. Parsing and cache I/O run on spawned tasks
//! and report back with a command, so I/O overlaps while commits stay
//! serialised. Commits therefore follow parse completion order.
//!
//! Cache Index and Opened-Files State writes rewrite the small
//! `state.json` synchronously on the actor task; artifact I/O never does.
//!
//! ```text
//! HostHandle ──command──▶ HostActor ──spawn──▶ Ingestor / SeriesCache
//!                             ▲                        │
//!                             └──── ParseFinished ◀────┘
//! ```

use crate::error::{HostError, HostResult};
use crate::generation::GenerationLedger;
use esplot_contract::{Event, FileOpenFailed, SurfaceRegistry};
use esplot_ingest::{CacheError, IngestError, Ingestor, SeriesCache};
use esplot_model::{
    CachedChannelFileState, ChannelFilePreview, ChannelId, PathHash, SeriesPrimitive,
};
use esplot_state::{CacheIndex, OpenedFilesState, Subscription};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

type Reply<T> = oneshot::Sender<HostResult<T>>;

/// Messages handled by the host actor
#[derive(Debug)]
pub(crate) enum HostCommand {
    Open {
        path: String,
        reply: Reply<()>,
    },
    Close {
        path: String,
        reply: Reply<()>,
    },
    Series {
        path: String,
        channel_id: ChannelId,
        reply: Reply<SeriesPrimitive>,
    },
    Preview {
        path: String,
        reply: Reply<Option<ChannelFilePreview>>,
    },
    OpenedFiles {
        reply: Reply<Vec<ChannelFilePreview>>,
    },
    LastOpened {
        reply: Reply<Option<ChannelFilePreview>>,
    },
    OpenedPaths {
        reply: Reply<Vec<String>>,
    },
    RemoveOpenedPath {
        path: String,
        reply: Reply<()>,
    },
    /// A spawned parse finished
    ParseFinished(ParseOutcome),
    /// A cached preview turned out to be missing
    PreviewMissing {
        path: String,
        cache_dir: PathBuf,
    },
    Shutdown,
}

#[derive(Debug)]
pub(crate) struct ParseOutcome {
    path: String,
    ticket: u64,
    cache_dir: PathBuf,
    result: Result<ChannelFilePreview, IngestError>,
    reply: Reply<()>,
}

pub(crate) struct HostActor {
    ingestor: Arc<Ingestor>,
    index: CacheIndex,
    opened: OpenedFilesState,
    registry: SurfaceRegistry,
    cache_root: PathBuf,
    generations: GenerationLedger,
    commands: mpsc::WeakSender<HostCommand>,
    _observer: Subscription,
}

impl HostActor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        ingestor: Arc<Ingestor>,
        index: CacheIndex,
        opened: OpenedFilesState,
        registry: SurfaceRegistry,
        cache_root: PathBuf,
        first_ticket: u64,
        commands: mpsc::WeakSender<HostCommand>,
        observer: Subscription,
    ) -> Self {
        Self {
            ingestor,
            index,
            opened,
            registry,
            cache_root,
            generations: GenerationLedger::starting_at(first_ticket),
            commands,
            _observer: observer,
        }
    }

    pub(crate) async fn run(mut self, mut rx: mpsc::Receiver<HostCommand>) {
        info!(cache_root = %self.cache_root.display(), "host actor started");
        while let Some(command) = rx.recv().await {
            if matches!(command, HostCommand::Shutdown) {
                break;
            }
            self.handle(command);
        }
        info!("host actor stopped");
    }

    fn handle(&mut self, command: HostCommand) {
        match command {
            HostCommand::Open { path, reply } => self.open(path, reply),
            HostCommand::Close { path, reply } => self.close(&path, reply),
            HostCommand::Series {
                path,
                channel_id,
                reply,
            } => self.series(path, channel_id, reply),
            HostCommand::Preview { path, reply } => self.preview(&path, reply),
            HostCommand::OpenedFiles { reply } => self.opened_files(reply),
            HostCommand::LastOpened { reply } => match self.opened.get_last_opened_file_path() {
                Some(path) => self.preview(&path, reply),
                None => {
                    let _ = reply.send(Ok(None));
                }
            },
            HostCommand::OpenedPaths { reply } => {
                let _ = reply.send(Ok(self.opened.get_opened_file_paths()));
            }
            HostCommand::RemoveOpenedPath { path, reply } => {
                let _ = reply.send(self.opened.remove(&path).map_err(HostError::from));
            }
            HostCommand::ParseFinished(outcome) => self.finish_parse(outcome),
            HostCommand::PreviewMissing { path, cache_dir } => self.drop_stale(&path, &cache_dir),
            HostCommand::Shutdown => {}
        }
    }

    fn open(&mut self, path: String, reply: Reply<()>) {
        let Some(commands) = self.commands.upgrade() else {
            let _ = reply.send(Err(HostError::Unavailable));
            return;
        };
        let ticket = self.generations.issue();
        let cache_dir = self
            .cache_root
            .join(format!("file-{}-{ticket}", PathHash::of_path(&path).short()));
        debug!(path = %path, ticket, cache_dir = %cache_dir.display(), "open requested");

        let ingestor = Arc::clone(&self.ingestor);
        tokio::spawn(async move {
            let result = ingestor.parse(&path, &cache_dir).await;
            let outcome = ParseOutcome {
                path,
                ticket,
                cache_dir,
                result,
                reply,
            };
            // A closed queue drops the reply, which the caller sees as Unavailable
            let _ = commands.send(HostCommand::ParseFinished(outcome)).await;
        });
    }

    fn finish_parse(&mut self, outcome: ParseOutcome) {
        let ParseOutcome {
            path,
            ticket,
            cache_dir,
            result,
            reply,
        } = outcome;

        let committed = match result {
            Ok(_) if !self.generations.may_commit(&path, ticket) => {
                warn!(
                    path = %path,
                    ticket,
                    "discarding parse completion superseded by a later request"
                );
                self.discard_dir(cache_dir, Some(reply));
                return;
            }
            Ok(preview) => self.commit(&path, &cache_dir).map(|()| preview),
            Err(e) => Err(HostError::from(e)),
        };

        match committed {
            Ok(preview) => {
                self.generations.commit(&path, ticket);
                info!(path = %path, series = preview.content.series.len(), "channel file opened");
                self.registry.broadcast(&Event::ChannelFileOpened(preview));
                let _ = reply.send(Ok(()));
            }
            Err(err) => {
                warn!(path = %path, error = %err, "open failed");
                self.registry.broadcast(&Event::FileOpenFailed(FileOpenFailed {
                    path: path.clone(),
                    reason: err.failure_reason(),
                    message: err.to_string(),
                }));
                self.discard_dir(cache_dir, None);
                let _ = reply.send(Err(err));
            }
        }
    }

    /// Index first, then the opened list; the index is restored if the list write fails
    fn commit(&self, path: &str, cache_dir: &Path) -> HostResult<()> {
        let previous = self.index.get(path);
        self.index
            .set(CachedChannelFileState::new(path, cache_dir))?;

        if let Err(e) = self.opened.push_front(path) {
            let restored = match &previous {
                Some(entry) => self.index.set(entry.clone()),
                None => self.index.remove(path).map(|_| ()),
            };
            if let Err(restore) = restored {
                warn!(path, error = %restore, "cannot restore cache index entry");
            }
            return Err(e.into());
        }

        if let Some(old) = previous.filter(|old| old.cache_dir != cache_dir) {
            self.discard_dir(old.cache_dir, None);
        }
        Ok(())
    }

    fn close(&mut self, path: &str, reply: Reply<()>) {
        let ticket = self.generations.record_close(path);
        match self.index.remove(path) {
            Ok(Some(entry)) => {
                let cache = self.ingestor.cache().clone();
                let path = path.to_string();
                tokio::spawn(async move {
                    let result = cache.remove_cache(&entry.cache_dir).await;
                    if result.is_ok() {
                        info!(path = %path, ticket, "channel file closed");
                    }
                    let _ = reply.send(result.map_err(HostError::from));
                });
            }
            Ok(None) => {
                debug!(path, ticket, "close of an uncached path");
                let _ = reply.send(Ok(()));
            }
            Err(e) => {
                let _ = reply.send(Err(e.into()));
            }
        }
    }

    fn series(&self, path: String, channel_id: ChannelId, reply: Reply<SeriesPrimitive>) {
        let Some(entry) = self.index.get(&path) else {
            let _ = reply.send(Err(HostError::SeriesNotFound {
                path,
                channel_id: channel_id.to_string(),
            }));
            return;
        };

        let cache = self.ingestor.cache().clone();
        let commands = self.commands.clone();
        tokio::spawn(async move {
            let result = match cache
                .read_channel_series(&entry.cache_dir, &channel_id)
                .await
            {
                Ok(primitive) => Ok(primitive),
                Err(CacheError::SeriesNotFound { .. }) => Err(HostError::SeriesNotFound {
                    path,
                    channel_id: channel_id.to_string(),
                }),
                Err(CacheError::MissingPreview { .. }) => {
                    report_missing(&commands, &entry).await;
                    Err(HostError::SeriesNotFound {
                        path,
                        channel_id: channel_id.to_string(),
                    })
                }
                Err(e) => Err(e.into()),
            };
            let _ = reply.send(result);
        });
    }

    fn preview(&self, path: &str, reply: Reply<Option<ChannelFilePreview>>) {
        let Some(entry) = self.index.get(path) else {
            let _ = reply.send(Ok(None));
            return;
        };
        let cache = self.ingestor.cache().clone();
        let commands = self.commands.clone();
        tokio::spawn(async move {
            let preview = read_preview(&cache, &commands, entry).await;
            let _ = reply.send(Ok(preview));
        });
    }

    fn opened_files(&self, reply: Reply<Vec<ChannelFilePreview>>) {
        let entries: Vec<CachedChannelFileState> = self
            .opened
            .get_opened_file_paths()
            .iter()
            .filter_map(|path| self.index.get(path))
            .collect();
        let cache = self.ingestor.cache().clone();
        let commands = self.commands.clone();
        tokio::spawn(async move {
            let previews = join_all(
                entries
                    .into_iter()
                    .map(|entry| read_preview(&cache, &commands, entry)),
            )
            .await;
            let _ = reply.send(Ok(previews.into_iter().flatten().collect()));
        });
    }

    fn drop_stale(&self, path: &str, cache_dir: &Path) {
        if !self
            .index
            .get(path)
            .is_some_and(|entry| entry.cache_dir == cache_dir)
        {
            return;
        }
        match self.index.remove(path) {
            Ok(_) => warn!(path, "dropped cache index entry without a preview"),
            Err(e) => warn!(path, error = %e, "cannot drop stale cache index entry"),
        }
    }

    /// Remove a directory in the background, then answer `reply` with success
    fn discard_dir(&self, cache_dir: PathBuf, reply: Option<Reply<()>>) {
        let cache = self.ingestor.cache().clone();
        tokio::spawn(async move {
            if let Err(e) = cache.remove_cache(&cache_dir).await {
                warn!(
                    cache_dir = %cache_dir.display(),
                    error = %e,
                    "cannot remove cache directory"
                );
            }
            if let Some(reply) = reply {
                let _ = reply.send(Ok(()));
            }
        });
    }
}

async fn read_preview(
    cache: &SeriesCache,
    commands: &mpsc::WeakSender<HostCommand>,
    entry: CachedChannelFileState,
) -> Option<ChannelFilePreview> {
    let preview = cache.read_preview(&entry.cache_dir).await;
    if preview.is_none() {
        report_missing(commands, &entry).await;
    }
    preview
}

async fn report_missing(commands: &mpsc::WeakSender<HostCommand>, entry: &CachedChannelFileState) {
    if let Some(commands) = commands.upgrade() {
        let _ = commands
            .send(HostCommand::PreviewMissing {
                path: entry.path.clone(),
                cache_dir: entry.cache_dir.clone(),
            })
            .await;
    }
}
