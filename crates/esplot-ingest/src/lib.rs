//! ESPlot ingestion
//!
//! The boundary between source files on disk and the channel-file model.
//!
//! # Core Operations
//!
//! - **Parse**: read a source file, pick a parser by extension, validate
//!   the content and write per-series artifacts into a cache directory
//! - **Read**: fetch the preview or a single series back from a cache
//!   directory without re-parsing
//! - **Remove**: delete a cache directory, idempotently
//!
//! # Architecture
//!
//! ```text
//! File System → Ingestor → ParserRegistry → ChannelFile → SeriesCache → File System
//!                                                              ↑___↓
//!                                                        hot series (moka)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use esplot_ingest::Ingestor;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ingestor = Ingestor::new();
//! let preview = ingestor.parse("/data/run.json", cache_dir).await?;
//! let v1 = ingestor.cache().read_series(cache_dir, &preview.content.series[0].id).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod ingestor;
pub mod parsers;
pub mod series_cache;

pub use error::{CacheError, IngestError, IngestResult, ParseError, RecordHint};
pub use ingestor::{Ingestor, DEFAULT_MAX_FILE_SIZE};
pub use parsers::{default_parsers, ChannelFileParser, ParserRegistry, SourceFile};
pub use series_cache::SeriesCache;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
