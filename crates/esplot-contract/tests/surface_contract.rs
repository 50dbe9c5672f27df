//! Surface facade talking to an in-process handler over the wire format

use async_trait::async_trait;
use esplot_contract::{
    dispatch_json, ContractError, ErrorKind, ErrorPayload, Event, FailureReason, FileOpenFailed,
    HostLink, LastOpenedFile, PathArgs, RequestHandler, SeriesArgs, SurfaceApi, SurfaceRegistry,
};
use esplot_model::{ChannelFile, ChannelFilePreview, ChannelId, SeriesPrimitive};
use esplot_test_utils::sample_content;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Opens files instantly from sample content and reports through the registry
struct MiniHost {
    opened: Mutex<Vec<String>>,
    registry: SurfaceRegistry,
}

impl MiniHost {
    fn preview(path: &str) -> ChannelFilePreview {
        ChannelFile::new(path, sample_content(&["V1", "V2"], 4)).to_preview()
    }
}

#[async_trait]
impl RequestHandler for MiniHost {
    type Error = ErrorPayload;

    async fn open_channel_file(&self, args: PathArgs) -> Result<(), ErrorPayload> {
        if args.path.ends_with(".bad") {
            self.registry.broadcast(&Event::FileOpenFailed(FileOpenFailed {
                path: args.path,
                reason: FailureReason::MalformedRecord,
                message: "bad record".to_string(),
            }));
            return Ok(());
        }
        self.opened.lock().insert(0, args.path.clone());
        self.registry
            .broadcast(&Event::ChannelFileOpened(Self::preview(&args.path)));
        Ok(())
    }

    async fn get_channel_file_series(
        &self,
        args: SeriesArgs,
    ) -> Result<SeriesPrimitive, ErrorPayload> {
        let missing = || {
            ErrorPayload::new(
                ErrorKind::SeriesNotFound,
                format!("series not found: '{}'", args.channel_id),
            )
            .with_path(args.path.clone())
        };
        if !self.opened.lock().contains(&args.path) {
            return Err(missing());
        }
        let content = sample_content(&["V1", "V2"], 4);
        let channel = content.serie(&args.channel_id).ok_or_else(missing)?.clone();
        Ok(SeriesPrimitive {
            x: content.x().clone(),
            channel,
        })
    }

    async fn close_channel_file(&self, _args: PathArgs) -> Result<(), ErrorPayload> {
        Ok(())
    }

    async fn get_channel_file_preview(
        &self,
        args: PathArgs,
    ) -> Result<Option<ChannelFilePreview>, ErrorPayload> {
        Ok(self
            .opened
            .lock()
            .contains(&args.path)
            .then(|| Self::preview(&args.path)))
    }

    async fn get_opened_channel_files(&self) -> Result<Vec<ChannelFilePreview>, ErrorPayload> {
        Ok(self.opened.lock().iter().map(|p| Self::preview(p)).collect())
    }

    async fn get_last_opened_channel_file(
        &self,
    ) -> Result<Option<ChannelFilePreview>, ErrorPayload> {
        Ok(self.opened.lock().first().map(|p| Self::preview(p)))
    }

    async fn get_opened_file_paths(&self) -> Result<Vec<String>, ErrorPayload> {
        Ok(self.opened.lock().clone())
    }

    async fn remove_opened_file_path(&self, args: PathArgs) -> Result<(), ErrorPayload> {
        self.opened.lock().retain(|p| *p != args.path);
        Ok(())
    }
}

struct InProcess(Arc<MiniHost>);

#[async_trait]
impl HostLink for InProcess {
    async fn invoke(&self, request: String) -> Result<String, ContractError> {
        Ok(dispatch_json(self.0.as_ref(), &request).await)
    }
}

fn connect() -> (Arc<MiniHost>, SurfaceApi) {
    let host = Arc::new(MiniHost {
        opened: Mutex::new(Vec::new()),
        registry: SurfaceRegistry::default(),
    });
    let (_, events) = host.registry.attach();
    let api = SurfaceApi::new(Arc::new(InProcess(Arc::clone(&host))), events);
    (host, api)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn open_then_query_through_the_facade() {
    let (_host, api) = connect();
    let opened = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&opened);
    let _sub = api.on_channel_file_opened(move |preview| sink.lock().push(preview.path));

    api.open_channel_file("/data/a.json").await.unwrap();
    api.open_channel_file("/data/b.json").await.unwrap();
    settle().await;

    assert_eq!(
        *opened.lock(),
        vec!["/data/a.json".to_string(), "/data/b.json".to_string()]
    );
    assert_eq!(
        api.get_opened_file_paths().await.unwrap(),
        vec!["/data/b.json".to_string(), "/data/a.json".to_string()]
    );
    let last = api.get_last_opened_channel_file().await.unwrap().unwrap();
    assert_eq!(last.path, "/data/b.json");

    let primitive = api
        .get_channel_file_series("/data/a.json", ChannelId::new("V2").unwrap())
        .await
        .unwrap();
    assert_eq!(primitive.channel.id.as_str(), "V2");
    assert_eq!(primitive.x.values.len(), primitive.channel.values.len());
}

#[tokio::test]
async fn failures_arrive_as_events_not_replies() {
    let (_host, api) = connect();
    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&failures);
    let _sub = api.on_file_open_failed(move |failed| sink.lock().push(failed.reason));

    api.open_channel_file("/data/c.bad").await.unwrap();
    settle().await;

    assert_eq!(*failures.lock(), vec![FailureReason::MalformedRecord]);
    assert!(api.get_opened_file_paths().await.unwrap().is_empty());
}

#[tokio::test]
async fn series_of_unopened_file_is_series_not_found() {
    let (_host, api) = connect();
    let err = api
        .get_channel_file_series("/data/never.json", ChannelId::new("V1").unwrap())
        .await
        .unwrap_err();
    let remote = err.remote().unwrap();
    assert_eq!(remote.kind, ErrorKind::SeriesNotFound);
    assert_eq!(remote.path.as_deref(), Some("/data/never.json"));
}

#[tokio::test]
async fn preview_of_unknown_file_is_none() {
    let (_host, api) = connect();
    assert_eq!(api.get_channel_file_preview("/nope").await.unwrap(), None);
}

#[tokio::test]
async fn panicking_listener_does_not_starve_the_others() {
    let (host, api) = connect();
    let _bad = api.on_last_opened_file_changed(|_| panic!("listener failure"));
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&delivered);
    let _good = api.on_last_opened_file_changed(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let event = Event::LastOpenedFileChanged(LastOpenedFile {
        path: "/data/a.json".to_string(),
    });
    assert_eq!(host.registry.broadcast(&event), 1);
    settle().await;
    assert_eq!(host.registry.broadcast(&event), 1);
    settle().await;

    assert_eq!(delivered.load(Ordering::SeqCst), 2);
    assert_eq!(host.registry.live_count(), 1);
}
