//! Channel-file parsers for the supported source formats
//!
//! - JSON channel files (`.json`), versioned by `schemaVersion`
//! - Comma-separated tables (`.csv`, `.txt`) with a header row
//!
//! Parsers are pure: they receive the bytes already read by the
//! [`Ingestor`](crate::Ingestor) and never touch the file system.

use crate::error::ParseError;
use chrono::{DateTime, Utc};
use esplot_model::ChannelFile;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

mod csv;
mod json;

pub use csv::CsvTableParser;
pub use json::JsonChannelFileParser;

/// Raw source handed to a parser
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Absolute path, the identity of the resulting channel file
    pub path: String,
    /// Full file contents
    pub bytes: Vec<u8>,
    /// Last modification time, when the file system reports one
    pub modified: Option<DateTime<Utc>>,
}

impl SourceFile {
    #[must_use]
    pub fn new(path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
            modified: None,
        }
    }

    #[must_use]
    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }
}

/// Parser trait for converting source bytes into a channel file
///
/// Implement this trait to add support for new file formats.
pub trait ChannelFileParser: Send + Sync + 'static {
    /// Short format name used in logs
    fn name(&self) -> &'static str;

    /// Parse a whole source file
    ///
    /// # Errors
    /// Any [`ParseError`] kind except `NotFound` / `Unreadable`, which are
    /// raised before a parser runs.
    fn parse(&self, source: &SourceFile) -> Result<ChannelFile, ParseError>;

    /// Supported file extensions (lowercase, without dot)
    fn extensions(&self) -> &[&str];

    /// Check if this parser can handle the given path
    fn can_parse(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.extensions()
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }

    /// Parser priority (higher = tried first when multiple parsers match)
    fn priority(&self) -> i32 {
        0
    }
}

/// Extension-keyed parser lookup
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: Vec<Arc<dyn ChannelFileParser>>,
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("parser_count", &self.parsers.len())
            .field("extensions", &self.all_extensions())
            .finish()
    }
}

impl ParserRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    /// Register a parser
    pub fn register<P: ChannelFileParser>(&mut self, parser: P) {
        self.parsers.push(Arc::new(parser));
        self.parsers.sort_by_key(|p| std::cmp::Reverse(p.priority()));
    }

    /// Find parser for path
    #[must_use]
    pub fn find_for_path(&self, path: &Path) -> Option<Arc<dyn ChannelFileParser>> {
        self.parsers.iter().find(|p| p.can_parse(path)).cloned()
    }

    /// Get all registered extensions
    #[must_use]
    pub fn all_extensions(&self) -> Vec<&str> {
        self.parsers
            .iter()
            .flat_map(|p| p.extensions())
            .copied()
            .collect()
    }
}

/// Create default parser registry with built-in parsers
#[inline]
#[must_use]
pub fn default_parsers() -> ParserRegistry {
    let mut registry = ParserRegistry::new();
    registry.register(JsonChannelFileParser);
    registry.register(CsvTableParser);
    registry
}
