//! Reply envelope and wire-level error description
//!
//! ```json
//! {"ok": <output>}
//! {"err": {"kind": "series_not_found", "message": "...", "path": "/data/a.json"}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};

/// What went wrong, in terms a surface can act on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    UnsupportedSchemaVersion,
    Truncated,
    MalformedRecord,
    Unreadable,
    SeriesNotFound,
    CacheRead,
    CacheWrite,
    InvalidRequest,
    Internal,
}

impl ErrorKind {
    /// Stable wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::UnsupportedSchemaVersion => "unsupported_schema_version",
            Self::Truncated => "truncated",
            Self::MalformedRecord => "malformed_record",
            Self::Unreadable => "unreadable",
            Self::SeriesNotFound => "series_not_found",
            Self::CacheRead => "cache_read",
            Self::CacheWrite => "cache_write",
            Self::InvalidRequest => "invalid_request",
            Self::Internal => "internal",
        }
    }

    /// I/O-level failures worth retrying as-is
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::CacheRead | Self::CacheWrite)
    }

    /// Failures caused by the source file's content
    #[must_use]
    pub const fn is_parse_failure(self) -> bool {
        matches!(
            self,
            Self::NotFound
                | Self::UnsupportedSchemaVersion
                | Self::Truncated
                | Self::MalformedRecord
                | Self::Unreadable
        )
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure description carried in an `err` reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
    /// Source file the failure names, when there is one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ErrorPayload {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            path: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Envelope could not be decoded
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl Display for ErrorPayload {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{} ({path}): {}", self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ErrorPayload {}

/// Outcome of one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reply {
    Ok(Value),
    Err(ErrorPayload),
}

impl Reply {
    /// Encode a successful output
    #[must_use]
    pub fn from_output<T: Serialize>(output: &T) -> Self {
        match serde_json::to_value(output) {
            Ok(value) => Self::Ok(value),
            Err(e) => Self::Err(ErrorPayload::internal(format!("cannot encode reply: {e}"))),
        }
    }

    /// Encode as the wire string
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"err":{{"kind":"internal","message":"cannot encode reply: {}"}}}}"#,
                e.to_string().replace('"', "'")
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn reply_wire_shape() {
        let ok = Reply::Ok(json!(null));
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({"ok": null}));

        let err = Reply::Err(
            ErrorPayload::new(ErrorKind::SeriesNotFound, "series not found: 'V1'")
                .with_path("/data/a.json"),
        );
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"err": {
                "kind": "series_not_found",
                "message": "series not found: 'V1'",
                "path": "/data/a.json"
            }})
        );
    }

    #[test]
    fn reply_roundtrip_through_string() {
        let reply = Reply::Err(ErrorPayload::invalid_request("missing field `channel`"));
        let back: Reply = serde_json::from_str(&reply.to_json()).unwrap();
        assert_eq!(back, reply);
    }

    #[test]
    fn retryable_kinds() {
        assert!(ErrorKind::CacheRead.is_retryable());
        assert!(ErrorKind::CacheWrite.is_retryable());
        assert!(!ErrorKind::MalformedRecord.is_retryable());
        assert!(!ErrorKind::SeriesNotFound.is_retryable());
        assert!(ErrorKind::Truncated.is_parse_failure());
    }

    #[test]
    fn kind_names_match_serde() {
        for kind in [
            ErrorKind::NotFound,
            ErrorKind::UnsupportedSchemaVersion,
            ErrorKind::CacheWrite,
            ErrorKind::InvalidRequest,
        ] {
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                json!(kind.as_str())
            );
        }
    }
}
