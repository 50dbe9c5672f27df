//! Error types for the persisted state

use std::path::PathBuf;

/// Errors from the JSON store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// IO error reading or writing the store file
    #[error("state store io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Value could not be encoded
    #[error("state encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for state operations
pub type StoreResult<T> = Result<T, StoreError>;
