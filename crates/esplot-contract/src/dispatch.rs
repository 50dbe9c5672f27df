//! Host-side dispatch
//!
//! [`RequestHandler`] has exactly one method per channel; [`dispatch`]
//! matches the catalog exhaustively, so adding a channel without a
//! handler does not compile.

use crate::channels::{
    Channel, CloseChannelFile, GetChannelFilePreview, GetChannelFileSeries,
    GetLastOpenedChannelFile, GetOpenedChannelFiles, GetOpenedFilePaths, OpenChannelFile,
    PathArgs, RemoveOpenedFilePath, Request, SeriesArgs,
};
use crate::reply::{ErrorPayload, Reply};
use async_trait::async_trait;
use esplot_model::{ChannelFilePreview, SeriesPrimitive};
use tracing::{debug, warn};

/// One typed handler per request channel
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Error type, reported to the surface as an [`ErrorPayload`]
    type Error: Into<ErrorPayload> + Send;

    async fn open_channel_file(&self, args: PathArgs) -> Result<(), Self::Error>;

    async fn get_channel_file_series(
        &self,
        args: SeriesArgs,
    ) -> Result<SeriesPrimitive, Self::Error>;

    async fn close_channel_file(&self, args: PathArgs) -> Result<(), Self::Error>;

    async fn get_channel_file_preview(
        &self,
        args: PathArgs,
    ) -> Result<Option<ChannelFilePreview>, Self::Error>;

    async fn get_opened_channel_files(&self) -> Result<Vec<ChannelFilePreview>, Self::Error>;

    async fn get_last_opened_channel_file(
        &self,
    ) -> Result<Option<ChannelFilePreview>, Self::Error>;

    async fn get_opened_file_paths(&self) -> Result<Vec<String>, Self::Error>;

    async fn remove_opened_file_path(&self, args: PathArgs) -> Result<(), Self::Error>;
}

fn reply<C: Channel, E: Into<ErrorPayload>>(result: Result<C::Output, E>) -> Reply {
    match result {
        Ok(output) => Reply::from_output(&output),
        Err(e) => {
            let payload = e.into();
            debug!(channel = C::NAME, error = %payload, "request failed");
            Reply::Err(payload)
        }
    }
}

/// Route a decoded request to its handler
pub async fn dispatch<H>(handler: &H, request: Request) -> Reply
where
    H: RequestHandler + ?Sized,
{
    match request {
        Request::OpenChannelFile(args) => {
            reply::<OpenChannelFile, _>(handler.open_channel_file(args).await)
        }
        Request::GetChannelFileSeries(args) => {
            reply::<GetChannelFileSeries, _>(handler.get_channel_file_series(args).await)
        }
        Request::CloseChannelFile(args) => {
            reply::<CloseChannelFile, _>(handler.close_channel_file(args).await)
        }
        Request::GetChannelFilePreview(args) => {
            reply::<GetChannelFilePreview, _>(handler.get_channel_file_preview(args).await)
        }
        Request::GetOpenedChannelFiles => {
            reply::<GetOpenedChannelFiles, _>(handler.get_opened_channel_files().await)
        }
        Request::GetLastOpenedChannelFile => {
            reply::<GetLastOpenedChannelFile, _>(handler.get_last_opened_channel_file().await)
        }
        Request::GetOpenedFilePaths => {
            reply::<GetOpenedFilePaths, _>(handler.get_opened_file_paths().await)
        }
        Request::RemoveOpenedFilePath(args) => {
            reply::<RemoveOpenedFilePath, _>(handler.remove_opened_file_path(args).await)
        }
    }
}

/// Decode a wire request, dispatch it and encode the reply
///
/// A malformed envelope becomes an `invalid_request` reply.
pub async fn dispatch_json<H>(handler: &H, raw: &str) -> String
where
    H: RequestHandler + ?Sized,
{
    let reply = match Request::from_json(raw) {
        Ok(request) => dispatch(handler, request).await,
        Err(e) => {
            warn!(error = %e, "rejected malformed request");
            Reply::Err(ErrorPayload::invalid_request(e.to_string()))
        }
    };
    reply.to_json()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::ErrorKind;
    use esplot_model::{ChannelFile, ChannelId};
    use esplot_test_utils::sample_content;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl RequestHandler for Recorder {
        type Error = ErrorPayload;

        async fn open_channel_file(&self, _args: PathArgs) -> Result<(), ErrorPayload> {
            self.calls.lock().push("open");
            Ok(())
        }

        async fn get_channel_file_series(
            &self,
            args: SeriesArgs,
        ) -> Result<SeriesPrimitive, ErrorPayload> {
            self.calls.lock().push("series");
            let content = sample_content(&["V1"], 3);
            match content.serie(&args.channel_id) {
                Some(channel) => Ok(SeriesPrimitive {
                    x: content.x().clone(),
                    channel: channel.clone(),
                }),
                None => Err(ErrorPayload::new(ErrorKind::SeriesNotFound, "no such series")
                    .with_path(args.path)),
            }
        }

        async fn close_channel_file(&self, _args: PathArgs) -> Result<(), ErrorPayload> {
            self.calls.lock().push("close");
            Ok(())
        }

        async fn get_channel_file_preview(
            &self,
            args: PathArgs,
        ) -> Result<Option<ChannelFilePreview>, ErrorPayload> {
            self.calls.lock().push("preview");
            Ok(Some(
                ChannelFile::new(args.path, sample_content(&["V1"], 3)).to_preview(),
            ))
        }

        async fn get_opened_channel_files(&self) -> Result<Vec<ChannelFilePreview>, ErrorPayload> {
            self.calls.lock().push("opened");
            Ok(Vec::new())
        }

        async fn get_last_opened_channel_file(
            &self,
        ) -> Result<Option<ChannelFilePreview>, ErrorPayload> {
            self.calls.lock().push("last");
            Ok(None)
        }

        async fn get_opened_file_paths(&self) -> Result<Vec<String>, ErrorPayload> {
            self.calls.lock().push("paths");
            Ok(vec!["/a".to_string()])
        }

        async fn remove_opened_file_path(&self, _args: PathArgs) -> Result<(), ErrorPayload> {
            self.calls.lock().push("remove");
            Ok(())
        }
    }

    #[tokio::test]
    async fn every_channel_reaches_its_handler() {
        let handler = Recorder::default();
        let requests = [
            Request::OpenChannelFile(PathArgs::new("/a")),
            Request::GetChannelFileSeries(SeriesArgs::new("/a", ChannelId::new("V1").unwrap())),
            Request::CloseChannelFile(PathArgs::new("/a")),
            Request::GetChannelFilePreview(PathArgs::new("/a")),
            Request::GetOpenedChannelFiles,
            Request::GetLastOpenedChannelFile,
            Request::GetOpenedFilePaths,
            Request::RemoveOpenedFilePath(PathArgs::new("/a")),
        ];
        for request in requests {
            assert!(matches!(dispatch(&handler, request).await, Reply::Ok(_)));
        }
        assert_eq!(
            *handler.calls.lock(),
            vec!["open", "series", "close", "preview", "opened", "last", "paths", "remove"]
        );
    }

    #[tokio::test]
    async fn unit_outputs_encode_as_null() {
        let raw = dispatch_json(
            &Recorder::default(),
            r#"{"channel":"openChannelFile","args":{"path":"/a"}}"#,
        )
        .await;
        assert_eq!(serde_json::from_str::<serde_json::Value>(&raw).unwrap(), json!({"ok": null}));
    }

    #[tokio::test]
    async fn handler_errors_become_err_replies() {
        let raw = dispatch_json(
            &Recorder::default(),
            r#"{"channel":"getChannelFileSeries","args":{"path":"/a","channelId":"V9"}}"#,
        )
        .await;
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["err"]["kind"], "series_not_found");
        assert_eq!(value["err"]["path"], "/a");
    }

    #[tokio::test]
    async fn malformed_envelope_is_invalid_request() {
        let handler = Recorder::default();
        for raw in ["not json", r#"{"channel":"deleteEverything"}"#, r#"{"args":{}}"#] {
            let reply: Reply = serde_json::from_str(&dispatch_json(&handler, raw).await).unwrap();
            assert!(matches!(
                reply,
                Reply::Err(ErrorPayload {
                    kind: ErrorKind::InvalidRequest,
                    ..
                })
            ));
        }
        assert!(handler.calls.lock().is_empty());
    }
}
