//! Request channels
//!
//! Every channel is a marker type implementing the sealed [`Channel`]
//! trait, which binds its wire name, argument type and output type. The
//! [`Request`] enum is the closed catalog of everything a surface may ask:
//!
//! ```json
//! {"channel": "getChannelFileSeries", "args": {"path": "/data/a.json", "channelId": "V1"}}
//! ```

use crate::error::ContractError;
use esplot_model::{ChannelFilePreview, ChannelId, SeriesPrimitive};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub(crate) mod private {
    pub trait Sealed {}
}

/// A request/response channel of the catalog
///
/// Sealed: the catalog is closed.
pub trait Channel: private::Sealed + Send + Sync + 'static {
    /// Wire name
    const NAME: &'static str;
    /// Argument type
    type Args: Serialize + DeserializeOwned + Send + 'static;
    /// Result type
    type Output: Serialize + DeserializeOwned + Send + 'static;

    /// Wrap typed arguments into the catalog enum
    fn request(args: Self::Args) -> Request;
}

/// Arguments naming one source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathArgs {
    pub path: String,
}

impl PathArgs {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Arguments naming one series of one source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesArgs {
    pub path: String,
    pub channel_id: ChannelId,
}

impl SeriesArgs {
    #[must_use]
    pub fn new(path: impl Into<String>, channel_id: ChannelId) -> Self {
        Self {
            path: path.into(),
            channel_id,
        }
    }
}

/// Every request a surface may send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "args", rename_all = "camelCase")]
pub enum Request {
    OpenChannelFile(PathArgs),
    GetChannelFileSeries(SeriesArgs),
    CloseChannelFile(PathArgs),
    GetChannelFilePreview(PathArgs),
    GetOpenedChannelFiles,
    GetLastOpenedChannelFile,
    GetOpenedFilePaths,
    RemoveOpenedFilePath(PathArgs),
}

impl Request {
    /// Wire name of the channel
    #[must_use]
    pub const fn channel(&self) -> &'static str {
        match self {
            Self::OpenChannelFile(_) => OpenChannelFile::NAME,
            Self::GetChannelFileSeries(_) => GetChannelFileSeries::NAME,
            Self::CloseChannelFile(_) => CloseChannelFile::NAME,
            Self::GetChannelFilePreview(_) => GetChannelFilePreview::NAME,
            Self::GetOpenedChannelFiles => GetOpenedChannelFiles::NAME,
            Self::GetLastOpenedChannelFile => GetLastOpenedChannelFile::NAME,
            Self::GetOpenedFilePaths => GetOpenedFilePaths::NAME,
            Self::RemoveOpenedFilePath(_) => RemoveOpenedFilePath::NAME,
        }
    }

    /// Source path the request is about, if any
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::OpenChannelFile(args)
            | Self::CloseChannelFile(args)
            | Self::GetChannelFilePreview(args)
            | Self::RemoveOpenedFilePath(args) => Some(&args.path),
            Self::GetChannelFileSeries(args) => Some(&args.path),
            Self::GetOpenedChannelFiles
            | Self::GetLastOpenedChannelFile
            | Self::GetOpenedFilePaths => None,
        }
    }

    /// Decode from the wire string
    ///
    /// # Errors
    /// Returns [`ContractError::Decode`] for unknown channels or bad arguments
    pub fn from_json(raw: &str) -> Result<Self, ContractError> {
        serde_json::from_str(raw).map_err(ContractError::Decode)
    }

    /// Encode as the wire string
    ///
    /// # Errors
    /// Returns [`ContractError::Encode`] if the arguments cannot be encoded
    pub fn to_json(&self) -> Result<String, ContractError> {
        serde_json::to_string(self).map_err(ContractError::Encode)
    }
}

macro_rules! channel {
    ($(#[$doc:meta])* $marker:ident, $name:literal, $args:ty => $output:ty, |$a:ident| $request:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $marker;

        impl private::Sealed for $marker {}

        impl Channel for $marker {
            const NAME: &'static str = $name;
            type Args = $args;
            type Output = $output;

            #[allow(unused_variables)]
            fn request($a: Self::Args) -> Request {
                $request
            }
        }
    };
}

channel!(
    /// Parse a file, cache it and mark it as most recently opened
    OpenChannelFile, "openChannelFile", PathArgs => (),
    |args| Request::OpenChannelFile(args)
);
channel!(
    /// Axis plus one series of an opened file
    GetChannelFileSeries, "getChannelFileSeries", SeriesArgs => SeriesPrimitive,
    |args| Request::GetChannelFileSeries(args)
);
channel!(
    /// Drop the cached artifacts of a file
    CloseChannelFile, "closeChannelFile", PathArgs => (),
    |args| Request::CloseChannelFile(args)
);
channel!(
    /// Cached preview of a file, `null` when not cached
    GetChannelFilePreview, "getChannelFilePreview", PathArgs => Option<ChannelFilePreview>,
    |args| Request::GetChannelFilePreview(args)
);
channel!(
    /// Previews of every opened, cached file, most recent first
    GetOpenedChannelFiles, "getOpenedChannelFiles", () => Vec<ChannelFilePreview>,
    |args| Request::GetOpenedChannelFiles
);
channel!(
    /// Preview of the most recently opened file
    GetLastOpenedChannelFile, "getLastOpenedChannelFile", () => Option<ChannelFilePreview>,
    |args| Request::GetLastOpenedChannelFile
);
channel!(
    /// Opened paths, most recent first
    GetOpenedFilePaths, "getOpenedFilePaths", () => Vec<String>,
    |args| Request::GetOpenedFilePaths
);
channel!(
    /// Remove a path from the opened list
    RemoveOpenedFilePath, "removeOpenedFilePath", PathArgs => (),
    |args| Request::RemoveOpenedFilePath(args)
);

/// Wire names of every channel, in catalog order
pub const CHANNEL_NAMES: &[&str] = &[
    OpenChannelFile::NAME,
    GetChannelFileSeries::NAME,
    CloseChannelFile::NAME,
    GetChannelFilePreview::NAME,
    GetOpenedChannelFiles::NAME,
    GetLastOpenedChannelFile::NAME,
    GetOpenedFilePaths::NAME,
    RemoveOpenedFilePath::NAME,
];
