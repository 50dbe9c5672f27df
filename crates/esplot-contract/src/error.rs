//! Error types for the contract layer

use crate::reply::ErrorPayload;

/// Errors crossing the host/surface boundary
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// Incoming message is not a valid envelope
    #[error("malformed message: {0}")]
    Decode(#[source] serde_json::Error),

    /// Outgoing value could not be encoded
    #[error("cannot encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// The host side has shut down
    #[error("host unavailable")]
    HostUnavailable,

    /// The host handled the request and reported a failure
    #[error("{channel} failed: {error}")]
    Remote {
        channel: &'static str,
        error: ErrorPayload,
    },
}

impl ContractError {
    /// Failure reported by the host, if this is one
    #[must_use]
    pub fn remote(&self) -> Option<&ErrorPayload> {
        match self {
            Self::Remote { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Result type alias for contract operations
pub type ContractResult<T> = Result<T, ContractError>;
