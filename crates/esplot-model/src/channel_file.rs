//! Channel file value objects
//!
//! A channel file holds one independent axis (`x`) and an ordered list of
//! dependent series sharing its value count. Content is validated on
//! construction and never mutated afterwards: a re-parse produces a new
//! value that replaces the old one.
//!
//! The serde representation (camelCase) is the one written to the cache
//! directory and carried across the host/surface boundary.

use crate::error::ModelError;
use crate::id::ChannelId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Scalar metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// `true` / `false`
    Bool(bool),
    /// Any JSON number
    Number(f64),
    /// Free text
    Text(String),
}

/// Header metadata: a timestamp plus open-ended key/value pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelFileMetadata {
    /// When the simulation output was produced (or imported)
    pub timestamp: String,
    /// Everything else, in file order
    #[serde(flatten)]
    pub extra: IndexMap<String, MetadataValue>,
}

impl ChannelFileMetadata {
    /// Metadata with only a timestamp
    #[inline]
    #[must_use]
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            extra: IndexMap::new(),
        }
    }

    /// Add a key/value pair
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Lookup by key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.extra.get(key)
    }
}

/// Series descriptor: everything but the values
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SerieDescriptor {
    pub id: ChannelId,
    pub label: String,
    pub unit: String,
}

/// A named, unit-tagged numeric sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelFileContentSerie {
    pub id: ChannelId,
    pub label: String,
    pub unit: String,
    pub values: Vec<f64>,
}

impl ChannelFileContentSerie {
    /// Create a series
    #[must_use]
    pub fn new(
        id: ChannelId,
        label: impl Into<String>,
        unit: impl Into<String>,
        values: Vec<f64>,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            unit: unit.into(),
            values,
        }
    }

    /// Rebuild a series from its descriptor and values read back from cache
    #[must_use]
    pub fn from_descriptor(descriptor: &SerieDescriptor, values: Vec<f64>) -> Self {
        Self {
            id: descriptor.id.clone(),
            label: descriptor.label.clone(),
            unit: descriptor.unit.clone(),
            values,
        }
    }

    /// Project onto a descriptor
    #[must_use]
    pub fn descriptor(&self) -> SerieDescriptor {
        SerieDescriptor {
            id: self.id.clone(),
            label: self.label.clone(),
            unit: self.unit.clone(),
        }
    }

    /// Number of values
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the series has no values
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn ensure_finite(&self) -> Result<(), ModelError> {
        match self.values.iter().position(|v| !v.is_finite()) {
            Some(index) => Err(ModelError::NonFiniteValue {
                series: self.id.to_string(),
                index,
            }),
            None => Ok(()),
        }
    }
}

/// Full parsed content of a channel file
///
/// # Invariants
/// - every series has exactly `x.len()` values
/// - series ids are unique
/// - all values are finite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawContent")]
pub struct ChannelFileContent {
    schema_version: u32,
    metadata: ChannelFileMetadata,
    x: ChannelFileContentSerie,
    series: Vec<ChannelFileContentSerie>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContent {
    schema_version: u32,
    metadata: ChannelFileMetadata,
    x: ChannelFileContentSerie,
    series: Vec<ChannelFileContentSerie>,
}

impl TryFrom<RawContent> for ChannelFileContent {
    type Error = ModelError;

    fn try_from(raw: RawContent) -> Result<Self, Self::Error> {
        Self::new(raw.schema_version, raw.metadata, raw.x, raw.series)
    }
}

impl ChannelFileContent {
    /// Build validated content
    ///
    /// # Errors
    /// - [`ModelError::MisalignedSeries`] if a series length differs from `x`
    /// - [`ModelError::DuplicateSeriesId`] if two series share an id
    /// - [`ModelError::NonFiniteValue`] for NaN / infinite values
    pub fn new(
        schema_version: u32,
        metadata: ChannelFileMetadata,
        x: ChannelFileContentSerie,
        series: Vec<ChannelFileContentSerie>,
    ) -> Result<Self, ModelError> {
        x.ensure_finite()?;

        let mut seen = HashSet::with_capacity(series.len());
        for serie in &series {
            if !seen.insert(&serie.id) {
                return Err(ModelError::DuplicateSeriesId(serie.id.to_string()));
            }
            if serie.len() != x.len() {
                return Err(ModelError::MisalignedSeries {
                    series: serie.id.to_string(),
                    expected: x.len(),
                    actual: serie.len(),
                });
            }
            serie.ensure_finite()?;
        }

        Ok(Self {
            schema_version,
            metadata,
            x,
            series,
        })
    }

    #[inline]
    #[must_use]
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &ChannelFileMetadata {
        &self.metadata
    }

    /// The shared independent axis
    #[inline]
    #[must_use]
    pub fn x(&self) -> &ChannelFileContentSerie {
        &self.x
    }

    /// Dependent series in file order
    #[inline]
    #[must_use]
    pub fn series(&self) -> &[ChannelFileContentSerie] {
        &self.series
    }

    /// Find a dependent series by id
    #[must_use]
    pub fn serie(&self, id: &ChannelId) -> Option<&ChannelFileContentSerie> {
        self.series.iter().find(|s| &s.id == id)
    }

    /// Lightweight projection without numeric values
    #[must_use]
    pub fn preview(&self) -> ChannelFileContentPreview {
        ChannelFileContentPreview {
            schema_version: self.schema_version,
            metadata: self.metadata.clone(),
            x: self.x.descriptor(),
            series: self.series.iter().map(ChannelFileContentSerie::descriptor).collect(),
        }
    }
}

/// Content shape with descriptors in place of series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelFileContentPreview {
    pub schema_version: u32,
    pub metadata: ChannelFileMetadata,
    pub x: SerieDescriptor,
    pub series: Vec<SerieDescriptor>,
}

impl ChannelFileContentPreview {
    /// Descriptor of a dependent series
    #[must_use]
    pub fn descriptor(&self, id: &ChannelId) -> Option<&SerieDescriptor> {
        self.series.iter().find(|s| &s.id == id)
    }
}

/// A parsed channel file, identified by its absolute path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelFile {
    path: String,
    content: ChannelFileContent,
}

impl ChannelFile {
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<String>, content: ChannelFileContent) -> Self {
        Self {
            path: path.into(),
            content,
        }
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    #[must_use]
    pub fn content(&self) -> &ChannelFileContent {
        &self.content
    }

    /// Consume into content
    #[inline]
    #[must_use]
    pub fn into_content(self) -> ChannelFileContent {
        self.content
    }

    /// Path plus preview content
    #[must_use]
    pub fn to_preview(&self) -> ChannelFilePreview {
        ChannelFilePreview {
            path: self.path.clone(),
            content: self.content.preview(),
        }
    }
}

/// Path plus preview content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelFilePreview {
    pub path: String,
    pub content: ChannelFileContentPreview,
}

/// Result of an on-demand series read: the axis and one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPrimitive {
    pub x: ChannelFileContentSerie,
    pub channel: ChannelFileContentSerie,
}

/// Where the cached artifacts of a source path live
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedChannelFileState {
    pub path: String,
    pub cache_dir: PathBuf,
}

impl CachedChannelFileState {
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache_dir: cache_dir.into(),
        }
    }
}
