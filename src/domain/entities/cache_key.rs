//! Content-addressed cache keys.

use super::{Size, SourceDescriptor};
use crate::domain::ports::Transformation;

/// Key identifying one (source, target size, transformation chain) variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the cache key for a request.
    ///
    /// Returns `None` when the descriptor has no key base, which disables both
    /// cache tiers for the request. Without size and transformation the base
    /// key is returned unchanged so full-size results are shared.
    #[must_use]
    pub fn build(
        descriptor: &SourceDescriptor,
        size: Option<Size>,
        transformation: Option<&dyn Transformation>,
    ) -> Option<Self> {
        let base = descriptor.key()?;
        let mut key = String::from(base);
        if let Some(size) = size {
            key.push_str("_size_");
            key.push_str(&size.to_string());
        }
        if let Some(transformation) = transformation {
            key.push_str(&transformation.key());
        }
        Some(Self(key))
    }

    /// Wraps a raw key string.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
