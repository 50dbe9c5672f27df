//! On-disk series cache
//!
//! One directory per ingested file:
//!
//! ```text
//! <cache_dir>/preview.json        ChannelFilePreview
//! <cache_dir>/x.json              x values
//! <cache_dir>/series/<stem>.json  values of one series, see ChannelId::artifact_stem
//! ```
//!
//! Every artifact is written to a temporary sibling and renamed into place,
//! so readers see either the previous or the new file, never a partial one.
//! Reads go through a bounded moka cache keyed by directory and artifact.

use crate::error::CacheError;
use esplot_model::{
    ChannelFile, ChannelFileContentSerie, ChannelFilePreview, ChannelId, SeriesPrimitive,
};
use moka::future::Cache;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

const PREVIEW_FILE: &str = "preview.json";
const X_FILE: &str = "x.json";
const SERIES_DIR: &str = "series";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One numeric artifact inside a cache directory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Artifact {
    X,
    Serie(ChannelId),
}

type HotKey = (PathBuf, Artifact);

/// Disk-backed series store with an in-memory read cache
#[derive(Debug, Clone)]
pub struct SeriesCache {
    hot: Cache<HotKey, Arc<Vec<f64>>>,
}

impl SeriesCache {
    /// Create cache holding at most `hot_capacity` series in memory
    #[must_use]
    pub fn new(hot_capacity: u64) -> Self {
        Self {
            hot: Cache::builder()
                .max_capacity(hot_capacity)
                .support_invalidation_closures()
                .build(),
        }
    }

    /// Path of the preview artifact
    #[inline]
    #[must_use]
    pub fn preview_path(cache_dir: &Path) -> PathBuf {
        cache_dir.join(PREVIEW_FILE)
    }

    /// Path of the artifact holding one series
    #[must_use]
    pub fn serie_path(cache_dir: &Path, channel_id: &ChannelId) -> PathBuf {
        cache_dir
            .join(SERIES_DIR)
            .join(format!("{}.json", channel_id.artifact_stem()))
    }

    fn artifact_path(cache_dir: &Path, artifact: &Artifact) -> PathBuf {
        match artifact {
            Artifact::X => cache_dir.join(X_FILE),
            Artifact::Serie(id) => Self::serie_path(cache_dir, id),
        }
    }

    /// Write every artifact of `file` into `cache_dir`
    ///
    /// Numeric artifacts are written first and the preview last, so a
    /// readable preview implies a complete directory. Re-running with the
    /// same input overwrites each artifact with identical content.
    ///
    /// # Errors
    /// [`CacheError::Write`] if a directory or artifact cannot be written
    pub async fn write_artifacts(
        &self,
        cache_dir: &Path,
        file: &ChannelFile,
    ) -> Result<ChannelFilePreview, CacheError> {
        let series_dir = cache_dir.join(SERIES_DIR);
        tokio::fs::create_dir_all(&series_dir)
            .await
            .map_err(|e| CacheError::write(&series_dir, e))?;

        let content = file.content();
        let mut writes = Vec::with_capacity(content.series().len() + 1);
        writes.push(write_json(cache_dir.join(X_FILE), &content.x().values));
        for serie in content.series() {
            writes.push(write_json(
                Self::serie_path(cache_dir, &serie.id),
                &serie.values,
            ));
        }
        futures::future::try_join_all(writes).await?;

        let preview = file.to_preview();
        write_json(Self::preview_path(cache_dir), &preview).await?;

        self.invalidate_dir(cache_dir);
        debug!(
            cache_dir = %cache_dir.display(),
            series = content.series().len(),
            "wrote cache artifacts"
        );
        Ok(preview)
    }

    /// Read the cached preview, `None` when missing or unreadable
    pub async fn read_preview(&self, cache_dir: &Path) -> Option<ChannelFilePreview> {
        let path = Self::preview_path(cache_dir);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no cached preview");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(preview) => Some(preview),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cached preview is corrupt");
                None
            }
        }
    }

    /// Values of the independent axis
    ///
    /// # Errors
    /// [`CacheError::Read`] if `x.json` is missing or cannot be decoded
    pub async fn read_x(&self, cache_dir: &Path) -> Result<Arc<Vec<f64>>, CacheError> {
        self.read_values(cache_dir, Artifact::X).await
    }

    /// Values of one dependent series
    ///
    /// # Errors
    /// - [`CacheError::SeriesNotFound`] if no artifact exists for `channel_id`
    /// - [`CacheError::Read`] on IO or decode failure
    pub async fn read_series(
        &self,
        cache_dir: &Path,
        channel_id: &ChannelId,
    ) -> Result<Arc<Vec<f64>>, CacheError> {
        self.read_values(cache_dir, Artifact::Serie(channel_id.clone()))
            .await
    }

    /// The axis and one channel, with descriptors from the cached preview
    ///
    /// # Errors
    /// - [`CacheError::MissingPreview`] if the directory has no preview
    /// - [`CacheError::SeriesNotFound`] if the preview does not list `channel_id`
    /// - [`CacheError::Read`] on IO or decode failure
    pub async fn read_channel_series(
        &self,
        cache_dir: &Path,
        channel_id: &ChannelId,
    ) -> Result<SeriesPrimitive, CacheError> {
        let preview =
            self.read_preview(cache_dir)
                .await
                .ok_or_else(|| CacheError::MissingPreview {
                    cache_dir: cache_dir.to_path_buf(),
                })?;
        let descriptor = preview
            .content
            .descriptor(channel_id)
            .ok_or_else(|| CacheError::SeriesNotFound {
                channel_id: channel_id.to_string(),
            })?;

        let (x, channel) = tokio::try_join!(
            self.read_x(cache_dir),
            self.read_series(cache_dir, channel_id)
        )?;

        Ok(SeriesPrimitive {
            x: ChannelFileContentSerie::from_descriptor(&preview.content.x, x.as_ref().clone()),
            channel: ChannelFileContentSerie::from_descriptor(descriptor, channel.as_ref().clone()),
        })
    }

    /// Delete every artifact of `cache_dir`
    ///
    /// Removing a directory that does not exist is a no-op.
    ///
    /// # Errors
    /// [`CacheError::Write`] if the directory exists but cannot be removed
    pub async fn remove_cache(&self, cache_dir: &Path) -> Result<(), CacheError> {
        self.invalidate_dir(cache_dir);
        match tokio::fs::remove_dir_all(cache_dir).await {
            Ok(()) => {
                debug!(cache_dir = %cache_dir.display(), "removed cache directory");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::write(cache_dir, e)),
        }
    }

    /// Approximate number of series held in memory
    #[inline]
    #[must_use]
    pub fn hot_entry_count(&self) -> u64 {
        self.hot.entry_count()
    }

    async fn read_values(
        &self,
        cache_dir: &Path,
        artifact: Artifact,
    ) -> Result<Arc<Vec<f64>>, CacheError> {
        let key = (cache_dir.to_path_buf(), artifact);
        if let Some(values) = self.hot.get(&key).await {
            debug!(cache_dir = %cache_dir.display(), "hot cache hit");
            return Ok(values);
        }

        let path = Self::artifact_path(cache_dir, &key.1);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(match &key.1 {
                    Artifact::Serie(id) => CacheError::SeriesNotFound {
                        channel_id: id.to_string(),
                    },
                    Artifact::X => CacheError::read(path, e),
                });
            }
            Err(e) => return Err(CacheError::read(path, e)),
        };
        let values: Vec<f64> = serde_json::from_slice(&bytes)
            .map_err(|e| CacheError::read(&path, io::Error::new(io::ErrorKind::InvalidData, e)))?;

        let values = Arc::new(values);
        self.hot.insert(key, Arc::clone(&values)).await;
        Ok(values)
    }

    fn invalidate_dir(&self, cache_dir: &Path) {
        let target = cache_dir.to_path_buf();
        if let Err(e) = self
            .hot
            .invalidate_entries_if(move |(dir, _), _| *dir == target)
        {
            warn!(error = %e, "selective invalidation failed, clearing hot cache");
            self.hot.invalidate_all();
        }
    }
}

impl Default for SeriesCache {
    /// Cache with room for 256 hot series
    fn default() -> Self {
        Self::new(256)
    }
}

async fn write_json<T: Serialize + ?Sized>(path: PathBuf, value: &T) -> Result<(), CacheError> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| CacheError::write(&path, io::Error::new(io::ErrorKind::InvalidData, e)))?;
    write_atomic(&path, &bytes).await
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_extension(format!("json.{}.{n}.tmp", std::process::id()));

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| CacheError::write(&tmp, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(CacheError::write(path, e));
    }
    Ok(())
}
