//! Error types for ingestion
//!
//! - [`ParseError`]: source file → [`esplot_model::ChannelFile`]
//! - [`CacheError`]: artifact reads and writes under a cache directory
//! - [`IngestError`]: either of the above, for the combined `parse` step

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

/// Where in the source a malformed record was detected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordHint {
    /// 1-based line and column
    Position { line: usize, column: usize },
    /// 1-based line
    Line(usize),
    /// Byte offset from the start of the file
    Offset(usize),
    /// Offending series id
    Series(String),
    /// Dotted path of the offending field, e.g. `series[2].values`
    Field(String),
    /// Nothing more precise is known
    Unspecified,
}

impl Display for RecordHint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position { line, column } => write!(f, "line {line}, column {column}"),
            Self::Line(line) => write!(f, "line {line}"),
            Self::Offset(offset) => write!(f, "byte {offset}"),
            Self::Series(id) => write!(f, "series '{id}'"),
            Self::Field(field) => write!(f, "field '{field}'"),
            Self::Unspecified => f.write_str("unknown location"),
        }
    }
}

/// Errors while turning a source file into channel data
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Source file does not exist
    #[error("file not found: {path}")]
    NotFound { path: String },

    /// Declared schema version cannot be read by this build
    #[error("unsupported schema version {version} in {path}")]
    UnsupportedSchemaVersion { path: String, version: i64 },

    /// Input ended before the document was complete
    #[error("truncated file {path}: {detail}")]
    Truncated { path: String, detail: String },

    /// Syntactically or structurally invalid content
    #[error("malformed record in {path} at {hint}: {message}")]
    MalformedRecord {
        path: String,
        hint: RecordHint,
        message: String,
    },

    /// IO error other than not-found while reading the source
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ParseError {
    /// Create truncated error for path
    pub fn truncated(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Truncated {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// Create malformed record error for path
    pub fn malformed(
        path: impl Into<String>,
        hint: RecordHint,
        message: impl Into<String>,
    ) -> Self {
        Self::MalformedRecord {
            path: path.into(),
            hint,
            message: message.into(),
        }
    }

    /// Classify an IO error on the source file
    pub fn io_error(path: impl Into<String>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Unreadable { path, source }
        }
    }

    /// Source path the error refers to
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::NotFound { path }
            | Self::UnsupportedSchemaVersion { path, .. }
            | Self::Truncated { path, .. }
            | Self::MalformedRecord { path, .. }
            | Self::Unreadable { path, .. } => path,
        }
    }
}

/// Errors from the on-disk series cache
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Channel id was never written to this cache directory
    #[error("series not found: '{channel_id}'")]
    SeriesNotFound { channel_id: String },

    /// The directory holds no readable preview
    #[error("no cached preview in {}", cache_dir.display())]
    MissingPreview { cache_dir: PathBuf },

    /// IO or decode failure reading an artifact
    #[error("cache read failed at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO or encode failure writing an artifact
    #[error("cache write failed at {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    /// Create read error for path
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Create write error for path
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}

/// Combined ingestion error
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Result type alias for ingestion operations
pub type IngestResult<T> = Result<T, IngestError>;
