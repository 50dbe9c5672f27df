//! One-way events pushed from the host to every live surface
//!
//! ```json
//! {"event": "channelFileOpened", "payload": {"path": "/data/a.json", "content": {...}}}
//! ```

use crate::channels::private;
use crate::error::ContractError;
use esplot_model::ChannelFilePreview;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Why an open request failed, as reported to surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    NotFound,
    UnsupportedSchemaVersion,
    Truncated,
    MalformedRecord,
    Unreadable,
    CacheWrite,
    Unknown,
}

/// Payload of [`Event::FileOpenFailed`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOpenFailed {
    pub path: String,
    pub reason: FailureReason,
    pub message: String,
}

/// Payload of [`Event::LastOpenedFileChanged`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastOpenedFile {
    pub path: String,
}

/// Every event the host may push
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum Event {
    /// A file finished parsing and is cached
    ChannelFileOpened(ChannelFilePreview),
    /// The head of the opened list moved
    LastOpenedFileChanged(LastOpenedFile),
    /// The new head's preview is available
    LastOpenedFileParsedChanged(ChannelFilePreview),
    /// An open request failed
    FileOpenFailed(FileOpenFailed),
}

/// Event discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ChannelFileOpened,
    LastOpenedFileChanged,
    LastOpenedFileParsedChanged,
    FileOpenFailed,
}

impl EventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ChannelFileOpened => "channelFileOpened",
            Self::LastOpenedFileChanged => "lastOpenedFileChanged",
            Self::LastOpenedFileParsedChanged => "lastOpenedFileParsedChanged",
            Self::FileOpenFailed => "fileOpenFailed",
        }
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Event {
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::ChannelFileOpened(_) => EventKind::ChannelFileOpened,
            Self::LastOpenedFileChanged(_) => EventKind::LastOpenedFileChanged,
            Self::LastOpenedFileParsedChanged(_) => EventKind::LastOpenedFileParsedChanged,
            Self::FileOpenFailed(_) => EventKind::FileOpenFailed,
        }
    }

    /// Decode from the wire string
    ///
    /// # Errors
    /// Returns [`ContractError::Decode`] for unknown events or bad payloads
    pub fn from_json(raw: &str) -> Result<Self, ContractError> {
        serde_json::from_str(raw).map_err(ContractError::Decode)
    }

    /// Encode as the wire string
    ///
    /// # Errors
    /// Returns [`ContractError::Encode`] if the payload cannot be encoded
    pub fn to_json(&self) -> Result<String, ContractError> {
        serde_json::to_string(self).map_err(ContractError::Encode)
    }
}

/// A subscribable event of the catalog, bound to its payload type
pub trait EventChannel: private::Sealed + Send + Sync + 'static {
    const KIND: EventKind;
    type Payload: Serialize + DeserializeOwned + Clone + Send + 'static;

    /// Payload of `event` when it is of this kind
    fn payload(event: &Event) -> Option<Self::Payload>;
}

macro_rules! event_channel {
    ($(#[$doc:meta])* $marker:ident => $payload:ty) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $marker;

        impl private::Sealed for $marker {}

        impl EventChannel for $marker {
            const KIND: EventKind = EventKind::$marker;
            type Payload = $payload;

            fn payload(event: &Event) -> Option<Self::Payload> {
                match event {
                    Event::$marker(payload) => Some(payload.clone()),
                    _ => None,
                }
            }
        }
    };
}

/// Typed event markers for [`SurfaceApi::on`](crate::SurfaceApi::on)
pub mod on {
    use super::{private, Event, EventChannel, EventKind, LastOpenedFile};
    use super::FileOpenFailed as FileOpenFailedPayload;
    use esplot_model::ChannelFilePreview;

    event_channel!(
        /// `onChannelFileOpened`
        ChannelFileOpened => ChannelFilePreview
    );
    event_channel!(
        /// `onLastOpenedFileChanged`
        LastOpenedFileChanged => LastOpenedFile
    );
    event_channel!(
        /// `onLastOpenedFileParsedChanged`
        LastOpenedFileParsedChanged => ChannelFilePreview
    );
    event_channel!(
        /// `onFileOpenFailed`
        FileOpenFailed => FileOpenFailedPayload
    );
}
