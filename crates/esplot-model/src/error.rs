//! Error types for the data model

/// Content invariant violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// A series does not share the independent axis' value count
    #[error("series '{series}' has {actual} values, x has {expected}")]
    MisalignedSeries {
        series: String,
        expected: usize,
        actual: usize,
    },

    /// Two series share an id
    #[error("duplicate series id '{0}'")]
    DuplicateSeriesId(String),

    /// Channel id rejected
    #[error("invalid channel id '{id}': {reason}")]
    InvalidChannelId { id: String, reason: &'static str },

    /// A value is NaN or infinite
    #[error("series '{series}' has a non-finite value at index {index}")]
    NonFiniteValue { series: String, index: usize },
}

impl ModelError {
    /// Id of the offending series, when there is one
    #[must_use]
    pub fn series_hint(&self) -> Option<&str> {
        match self {
            Self::MisalignedSeries { series, .. } | Self::NonFiniteValue { series, .. } => {
                Some(series)
            }
            Self::DuplicateSeriesId(id) | Self::InvalidChannelId { id, .. } => Some(id),
        }
    }
}
