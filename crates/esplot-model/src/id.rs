//! Series identifiers
//!
//! [`ChannelId`] names one series inside a channel file. The same id is
//! used in the preview descriptor and as the key for on-demand reads, so it
//! also knows how to turn itself into a cache artifact file name.

use crate::error::ModelError;
use crate::hash::PathHash;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Identifier of a series, unique within one file
///
/// # Examples
/// - `"V1"` → artifact file `V1.json`
/// - `"BUS 101 [kV]"` → artifact file `id-<blake3 hex>.json`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelId(String);

impl ChannelId {
    /// Create a channel id
    ///
    /// # Errors
    /// Returns [`ModelError::InvalidChannelId`] for empty ids or ids
    /// containing control characters
    pub fn new(id: impl Into<String>) -> Result<Self, ModelError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ModelError::InvalidChannelId {
                id,
                reason: "empty",
            });
        }
        if id.chars().any(char::is_control) {
            return Err(ModelError::InvalidChannelId {
                id,
                reason: "contains control characters",
            });
        }
        Ok(Self(id))
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File stem of the cache artifact holding this series' values
    #[must_use]
    pub fn artifact_stem(&self) -> String {
        if is_safe_file_stem(&self.0) {
            self.0.clone()
        } else {
            format!("id-{}", PathHash::compute(self.0.as_bytes()))
        }
    }
}

fn is_safe_file_stem(s: &str) -> bool {
    !s.starts_with('.')
        && s.len() <= 128
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

impl Display for ChannelId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChannelId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ChannelId {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ChannelId> for String {
    fn from(id: ChannelId) -> Self {
        id.0
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty() {
        assert!(ChannelId::new("").is_err());
    }

    #[test]
    fn rejects_control_chars() {
        assert!(ChannelId::new("V1\n").is_err());
    }

    #[test]
    fn safe_ids_keep_their_name() {
        let id = ChannelId::new("channel_3").unwrap();
        assert_eq!(id.artifact_stem(), "channel_3");
    }

    #[test]
    fn unsafe_ids_are_hashed() {
        let id = ChannelId::new("BUS 101 [kV]").unwrap();
        let stem = id.artifact_stem();
        assert!(stem.starts_with("id-"));
        assert_eq!(stem.len(), 3 + 64);

        let dotted = ChannelId::new("..").unwrap();
        assert!(dotted.artifact_stem().starts_with("id-"));

        let traversal = ChannelId::new("../escape").unwrap();
        assert!(traversal.artifact_stem().starts_with("id-"));
    }

    #[test]
    fn serde_is_transparent_string() {
        let id = ChannelId::new("V1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"V1\"");
        let back: ChannelId = serde_json::from_str("\"V1\"").unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<ChannelId>("\"\"").is_err());
    }
}
