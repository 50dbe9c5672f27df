//! ESPlot Host
//!
//! Coordinates ingestion, cached state and surface events for one local
//! machine.
//!
//! # Core Operations
//!
//! - **Open**: parse a source file into a fresh cache directory, record it
//!   in the Cache Index and move it to the front of the opened list
//! - **Read**: answer preview and series requests from the cache without
//!   re-parsing
//! - **Close**: drop the Cache Index entry and the artifacts of a file
//!
//! # Architecture
//!
//! ```text
//! SurfaceApi ─json─▶ HostHandle ─▶ HostActor (single writer) ─▶ CacheIndex / OpenedFilesState
//!     ▲                                 │                                 │
//!     └──────── SurfaceRegistry ◀───────┴──── events ◀──── observer ◀─────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use esplot_core::{HostConfig, HostHandle};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let host = HostHandle::start(&HostConfig::new("/tmp/esplot")).await?;
//! let surface = host.connect_surface();
//! surface.open_channel_file("/data/run.json").await?;
//! let paths = surface.get_opened_file_paths().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod error;
mod generation;
mod handle;
mod host;
mod observer;

pub use config::{HostConfig, DATA_DIR_ENV, IMPORT_CACHE_DIR};
pub use error::{ConfigError, HostError, HostResult};
pub use handle::HostHandle;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
