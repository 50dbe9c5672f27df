//! Turns opened-list head changes into surface events

use esplot_contract::{Event, LastOpenedFile, SurfaceRegistry};
use esplot_ingest::SeriesCache;
use esplot_state::{CacheIndex, OpenedFilesState, Subscription};
use tokio::runtime::Handle;
use tracing::debug;

/// Broadcast `lastOpenedFileChanged` on every head change, then
/// `lastOpenedFileParsedChanged` once the new head's preview is read back
///
/// The returned subscription keeps the observer installed.
pub(crate) fn watch_last_opened(
    opened: &OpenedFilesState,
    index: CacheIndex,
    cache: SeriesCache,
    registry: SurfaceRegistry,
) -> Subscription {
    opened.on_last_opened_file_path_change(move |head| {
        let Some(path) = head else {
            debug!("opened list is empty");
            return;
        };

        registry.broadcast(&Event::LastOpenedFileChanged(LastOpenedFile {
            path: path.to_string(),
        }));

        let Some(entry) = index.get(path) else {
            debug!(path, "last opened file is not cached");
            return;
        };
        let Ok(runtime) = Handle::try_current() else {
            debug!(path, "no runtime to read the last opened preview");
            return;
        };

        let cache = cache.clone();
        let registry = registry.clone();
        runtime.spawn(async move {
            if let Some(preview) = cache.read_preview(&entry.cache_dir).await {
                registry.broadcast(&Event::LastOpenedFileParsedChanged(preview));
            }
        });
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use esplot_ingest::Ingestor;
    use esplot_model::CachedChannelFileState;
    use esplot_state::JsonStore;
    use esplot_test_utils::Workspace;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn next_event(rx: &mut tokio::sync::mpsc::Receiver<String>) -> Event {
        let raw = timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        Event::from_json(&raw).unwrap()
    }

    #[tokio::test]
    async fn head_change_broadcasts_path_then_preview() {
        let ws = Workspace::new();
        let path = ws.channel_file("a.json", &["V1"], 4);
        let cache_dir = ws.data_dir().join("cache-a");
        let ingestor = Ingestor::new();
        let preview = ingestor.parse(&path, &cache_dir).await.unwrap();

        let store = Arc::new(JsonStore::in_memory());
        let index = CacheIndex::new(Arc::clone(&store));
        let opened = OpenedFilesState::new(store);
        index
            .set(CachedChannelFileState::new(path.clone(), cache_dir))
            .unwrap();

        let registry = SurfaceRegistry::default();
        let (_, mut rx) = registry.attach();
        let _observer = watch_last_opened(
            &opened,
            index,
            ingestor.cache().clone(),
            registry.clone(),
        );

        opened.push_front(&path).unwrap();

        assert_eq!(
            next_event(&mut rx).await,
            Event::LastOpenedFileChanged(LastOpenedFile { path: path.clone() })
        );
        assert_eq!(
            next_event(&mut rx).await,
            Event::LastOpenedFileParsedChanged(preview)
        );
    }

    #[tokio::test]
    async fn uncached_head_only_reports_the_path() {
        let store = Arc::new(JsonStore::in_memory());
        let index = CacheIndex::new(Arc::clone(&store));
        let opened = OpenedFilesState::new(store);
        let registry = SurfaceRegistry::default();
        let (_, mut rx) = registry.attach();
        let _observer =
            watch_last_opened(&opened, index, SeriesCache::default(), registry.clone());

        opened.push_front("/listed/only.json").unwrap();
        opened.remove("/listed/only.json").unwrap();

        assert_eq!(
            next_event(&mut rx).await,
            Event::LastOpenedFileChanged(LastOpenedFile {
                path: "/listed/only.json".to_string()
            })
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }
}
