//! Error types for the esplot host
//!
//! [`HostError`] is the single reported outcome of a failed request. Every
//! lower-level failure is folded into it at the actor boundary and then
//! turned into the wire-level [`ErrorPayload`].

use esplot_contract::{ContractError, ErrorKind, ErrorPayload, FailureReason};
use esplot_ingest::{CacheError, IngestError, ParseError};
use esplot_state::StoreError;
use std::path::PathBuf;

/// Main host error type
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Source file could not be parsed
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// Cache directory could not be read or written
    #[error("{0}")]
    Cache(#[from] CacheError),

    /// Path is not cached or its cache has no such series
    #[error("series not found: '{channel_id}' in {path}")]
    SeriesNotFound { path: String, channel_id: String },

    /// Source paths are identified by their absolute form
    #[error("path must be absolute: {path}")]
    RelativePath { path: String },

    /// Host state could not be persisted
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Wire-level failure
    #[error("{0}")]
    Contract(#[from] ContractError),

    /// Configuration could not be resolved
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Data directory could not be prepared
    #[error("cannot prepare {}: {source}", path.display())]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The host actor has shut down
    #[error("host is not running")]
    Unavailable,
}

impl From<IngestError> for HostError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Parse(e) => Self::Parse(e),
            IngestError::Cache(e) => Self::Cache(e),
        }
    }
}

impl HostError {
    /// Wire classification
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(ParseError::NotFound { .. }) => ErrorKind::NotFound,
            Self::Parse(ParseError::UnsupportedSchemaVersion { .. }) => {
                ErrorKind::UnsupportedSchemaVersion
            }
            Self::Parse(ParseError::Truncated { .. }) => ErrorKind::Truncated,
            Self::Parse(ParseError::MalformedRecord { .. }) => ErrorKind::MalformedRecord,
            Self::Parse(ParseError::Unreadable { .. }) => ErrorKind::Unreadable,
            Self::SeriesNotFound { .. }
            | Self::Cache(
                CacheError::SeriesNotFound { .. } | CacheError::MissingPreview { .. },
            ) => ErrorKind::SeriesNotFound,
            Self::Cache(CacheError::Read { .. }) => ErrorKind::CacheRead,
            Self::Cache(CacheError::Write { .. }) | Self::Store(StoreError::Io { .. }) => {
                ErrorKind::CacheWrite
            }
            Self::Contract(ContractError::Decode(_)) | Self::RelativePath { .. } => {
                ErrorKind::InvalidRequest
            }
            Self::Contract(ContractError::Remote { error, .. }) => error.kind,
            Self::Store(_)
            | Self::Contract(_)
            | Self::Config(_)
            | Self::DataDir { .. }
            | Self::Unavailable => ErrorKind::Internal,
        }
    }

    /// Reason reported in a `fileOpenFailed` event
    #[must_use]
    pub fn failure_reason(&self) -> FailureReason {
        match self.kind() {
            ErrorKind::NotFound => FailureReason::NotFound,
            ErrorKind::UnsupportedSchemaVersion => FailureReason::UnsupportedSchemaVersion,
            ErrorKind::Truncated => FailureReason::Truncated,
            ErrorKind::MalformedRecord => FailureReason::MalformedRecord,
            ErrorKind::Unreadable => FailureReason::Unreadable,
            ErrorKind::CacheWrite => FailureReason::CacheWrite,
            _ => FailureReason::Unknown,
        }
    }

    /// Cache I/O failures; the request may succeed as-is on retry
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Source path named by the failure, if any
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Parse(e) => Some(e.path()),
            Self::SeriesNotFound { path, .. } | Self::RelativePath { path } => Some(path),
            Self::Contract(ContractError::Remote { error, .. }) => error.path.as_deref(),
            _ => None,
        }
    }
}

impl From<HostError> for ErrorPayload {
    fn from(err: HostError) -> Self {
        let payload = ErrorPayload::new(err.kind(), err.to_string());
        match err.path() {
            Some(path) => payload.with_path(path),
            None => payload,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file exists but cannot be read
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for the expected keys
    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// No data directory given and the platform has none
    #[error("no data directory: pass --data-dir or set ESPLOTTER_USER_DATA_DIR")]
    NoDataDir,
}

/// Result type alias for host operations
pub type HostResult<T> = Result<T, HostError>;

#[cfg(test)]
mod tests {
    use super::*;
    use esplot_ingest::RecordHint;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_errors_name_the_file() {
        let err = HostError::from(ParseError::malformed(
            "/data/a.csv",
            RecordHint::Line(3),
            "expected 3 columns, found 2",
        ));
        assert_eq!(err.kind(), ErrorKind::MalformedRecord);
        assert_eq!(err.failure_reason(), FailureReason::MalformedRecord);
        assert!(!err.is_retryable());

        let payload = ErrorPayload::from(err);
        assert_eq!(payload.path.as_deref(), Some("/data/a.csv"));
        assert!(payload.message.contains("line 3"));
    }

    #[test]
    fn cache_io_is_retryable() {
        let err = HostError::from(IngestError::Cache(CacheError::write(
            "/cache/x.json",
            std::io::Error::other("disk full"),
        )));
        assert_eq!(err.kind(), ErrorKind::CacheWrite);
        assert_eq!(err.failure_reason(), FailureReason::CacheWrite);
        assert!(err.is_retryable());
    }

    #[test]
    fn series_not_found_is_a_caller_error() {
        let err = HostError::from(CacheError::SeriesNotFound {
            channel_id: "V1".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::SeriesNotFound);
        assert!(!err.is_retryable());
        assert_eq!(err.failure_reason(), FailureReason::Unknown);
    }

    #[test]
    fn host_series_not_found_names_the_file() {
        let payload = ErrorPayload::from(HostError::SeriesNotFound {
            path: "/data/never.json".to_string(),
            channel_id: "V1".to_string(),
        });
        assert_eq!(payload.kind, ErrorKind::SeriesNotFound);
        assert_eq!(payload.path.as_deref(), Some("/data/never.json"));
    }

    #[test]
    fn failed_state_write_is_a_cache_write() {
        let err = HostError::from(StoreError::io_error(
            "/data/state.json",
            std::io::Error::other("disk full"),
        ));
        assert_eq!(err.kind(), ErrorKind::CacheWrite);
        assert_eq!(err.failure_reason(), FailureReason::CacheWrite);
        assert!(err.is_retryable());
    }

    #[test]
    fn relative_path_is_an_invalid_request() {
        let payload = ErrorPayload::from(HostError::RelativePath {
            path: "data/a.json".to_string(),
        });
        assert_eq!(payload.kind, ErrorKind::InvalidRequest);
        assert_eq!(payload.path.as_deref(), Some("data/a.json"));
    }

    #[test]
    fn unavailable_is_internal() {
        let payload = ErrorPayload::from(HostError::Unavailable);
        assert_eq!(payload.kind, ErrorKind::Internal);
        assert_eq!(payload.path, None);
    }
}
