//! ESPlot data model
//!
//! Value objects shared by every layer of the ingestion pipeline and by
//! the presentation surfaces.
//!
//! # Core Concepts
//!
//! - [`ChannelFile`]: a parsed file identified by its absolute path
//! - [`ChannelFileContent`]: validated content, every series aligned with `x`
//! - [`ChannelFileContentPreview`]: the same shape with descriptors only
//! - [`ChannelId`]: series identifier, stable between preview and full read
//! - [`CachedChannelFileState`]: source path → cache directory
//! - [`PathHash`]: Blake3 digest used to name on-disk artifacts
//!
//! # Example
//!
//! ```rust
//! use esplot_model::{ChannelFileContent, ChannelFileContentSerie, ChannelFileMetadata, ChannelId};
//!
//! let x = ChannelFileContentSerie::new(ChannelId::new("time").unwrap(), "Time", "s", vec![0.0, 0.1]);
//! let v = ChannelFileContentSerie::new(ChannelId::new("V1").unwrap(), "Voltage", "pu", vec![1.0, 0.98]);
//! let content = ChannelFileContent::new(1, ChannelFileMetadata::new("2024-01-01T00:00:00Z"), x, vec![v]).unwrap();
//!
//! let preview = content.preview();
//! assert_eq!(preview.series[0].id.as_str(), "V1");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod channel_file;
mod error;
mod hash;
mod id;

pub use channel_file::{
    CachedChannelFileState, ChannelFile, ChannelFileContent, ChannelFileContentPreview,
    ChannelFileContentSerie, ChannelFileMetadata, ChannelFilePreview, MetadataValue,
    SerieDescriptor, SeriesPrimitive,
};
pub use error::ModelError;
pub use hash::PathHash;
pub use id::ChannelId;

/// Schema versions this build can read
pub const SUPPORTED_SCHEMA_VERSIONS: &[u32] = &[1];

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Whether a declared schema version can be parsed
#[inline]
#[must_use]
pub fn is_supported_schema_version(version: u32) -> bool {
    SUPPORTED_SCHEMA_VERSIONS.contains(&version)
}
