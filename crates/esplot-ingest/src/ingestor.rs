//! Ingestor - the only component that reads source files
//!
//! ```text
//! source file → ParserRegistry → ChannelFile → SeriesCache → ChannelFilePreview
//! ```

use crate::error::{IngestError, ParseError, RecordHint};
use crate::parsers::{default_parsers, ParserRegistry, SourceFile};
use crate::series_cache::SeriesCache;
use chrono::{DateTime, Utc};
use esplot_model::{ChannelFile, ChannelFilePreview};
use std::path::Path;
use tracing::{debug, instrument};

/// Default upper bound on source file size (256 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 256 * 1024 * 1024;

/// Parser plus series cache
#[derive(Debug, Clone)]
pub struct Ingestor {
    parsers: ParserRegistry,
    cache: SeriesCache,
    max_file_size: u64,
}

impl Ingestor {
    /// Create ingestor with default parsers and cache
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create ingestor whose hot cache holds `cache_capacity` series
    #[inline]
    #[must_use]
    pub fn with_capacity(cache_capacity: u64) -> Self {
        Self {
            parsers: default_parsers(),
            cache: SeriesCache::new(cache_capacity),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Replace the parser registry
    #[must_use]
    pub fn with_parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = parsers;
        self
    }

    /// Set the largest accepted source file, in bytes
    #[must_use]
    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Parse `path` and write its artifacts into `cache_dir`
    ///
    /// Safe to repeat with the same arguments: artifacts are overwritten
    /// atomically with the same content.
    ///
    /// # Errors
    /// - [`IngestError::Parse`] for any [`ParseError`] kind
    /// - [`IngestError::Cache`] if artifacts cannot be written
    #[instrument(skip(self, cache_dir), fields(cache_dir = %cache_dir.display()))]
    pub async fn parse(
        &self,
        path: &str,
        cache_dir: &Path,
    ) -> Result<ChannelFilePreview, IngestError> {
        let file = self.read_file(path).await?;
        let preview = self.cache.write_artifacts(cache_dir, &file).await?;
        debug!(series = preview.content.series.len(), "parsed channel file");
        Ok(preview)
    }

    /// Read and parse `path` without touching any cache
    ///
    /// # Errors
    /// - `NotFound` / `Unreadable` if the file cannot be read
    /// - `MalformedRecord` for unknown extensions and oversized files
    /// - whatever the selected parser reports
    pub async fn read_file(&self, path: &str) -> Result<ChannelFile, ParseError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| ParseError::io_error(path, e))?;
        if metadata.is_dir() {
            return Err(ParseError::Unreadable {
                path: path.to_string(),
                source: std::io::Error::other("is a directory"),
            });
        }
        if metadata.len() > self.max_file_size {
            return Err(ParseError::malformed(
                path,
                RecordHint::Unspecified,
                format!(
                    "file too large: {} bytes (max: {})",
                    metadata.len(),
                    self.max_file_size
                ),
            ));
        }

        let parser = self.parsers.find_for_path(Path::new(path)).ok_or_else(|| {
            let extension = Path::new(path)
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default();
            ParseError::malformed(
                path,
                RecordHint::Unspecified,
                format!("unsupported extension '{extension}'"),
            )
        })?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ParseError::io_error(path, e))?;
        let mut source = SourceFile::new(path, bytes);
        if let Ok(modified) = metadata.modified() {
            source = source.with_modified(DateTime::<Utc>::from(modified));
        }

        debug!(parser = parser.name(), bytes = source.bytes.len(), "parsing");
        tokio::task::spawn_blocking(move || parser.parse(&source))
            .await
            .map_err(|e| {
                ParseError::malformed(path, RecordHint::Unspecified, format!("parser failed: {e}"))
            })?
    }

    /// Get cache reference
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &SeriesCache {
        &self.cache
    }

    /// Largest accepted source file, in bytes
    #[inline]
    #[must_use]
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }
}

impl Default for Ingestor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esplot_test_utils::{path_string, write_channel_file, write_text};

    #[test]
    fn ingestor_defaults() {
        let ingestor = Ingestor::default();
        assert_eq!(ingestor.max_file_size(), DEFAULT_MAX_FILE_SIZE);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = path_string(&dir.path().join("absent.json"));

        let err = Ingestor::new().read_file(&path).await.unwrap_err();
        assert!(matches!(err, ParseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = path_string(&write_text(dir.path(), "run.out", "binary"));

        let err = Ingestor::new().read_file(&path).await.unwrap_err();
        assert!(matches!(
            err,
            ParseError::MalformedRecord { ref message, .. }
                if message.contains("unsupported extension")
        ));
    }

    #[tokio::test]
    async fn oversized_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = path_string(&write_channel_file(dir.path(), "run.json", &["V1"], 8));

        let err = Ingestor::new()
            .with_max_file_size(16)
            .read_file(&path)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ParseError::MalformedRecord { ref message, .. } if message.contains("too large")
        ));
    }

    #[tokio::test]
    async fn parse_writes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let path = path_string(&write_channel_file(dir.path(), "run.json", &["V1", "V2"], 8));
        let cache_dir = dir.path().join("cache");

        let preview = Ingestor::new().parse(&path, &cache_dir).await.unwrap();
        assert_eq!(preview.path, path);
        assert_eq!(preview.content.series.len(), 2);
        assert!(cache_dir.join("series/V2.json").is_file());
    }
}
