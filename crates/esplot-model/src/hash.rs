//! Path hashing primitives
//!
//! Provides [`PathHash`], a 32-byte Blake3 digest used to derive stable,
//! file-system-safe names from arbitrary strings (source paths, series ids).

use std::fmt::{self, Display, Formatter};

/// A 32-byte Blake3 digest
///
/// Cheap to copy. The hex form is what ends up in cache directory and
/// artifact file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathHash([u8; 32]);

impl PathHash {
    /// Compute Blake3 hash of arbitrary data
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Hash of a source path string
    #[inline]
    #[must_use]
    pub fn of_path(path: &str) -> Self {
        Self::compute(path.as_bytes())
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for PathHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_is_deterministic() {
        let a = PathHash::of_path("/data/run1.json");
        let b = PathHash::of_path("/data/run1.json");
        assert_eq!(a, b);
        assert_ne!(a, PathHash::of_path("/data/run2.json"));
    }

    #[test]
    fn short_is_a_prefix_of_the_full_hex() {
        let hash = PathHash::compute(b"anything");
        assert_eq!(hash.short().len(), 16);
        assert_eq!(hash.to_string().len(), 64);
        assert!(hash.to_string().starts_with(&hash.short()));
    }
}
