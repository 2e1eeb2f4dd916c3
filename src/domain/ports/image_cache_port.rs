//! Port definition for image cache tiers.

use std::sync::Arc;

use image::DynamicImage;

use crate::domain::entities::CacheKey;

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Errors that can occur during cache operations.
///
/// Cache failures never fail a request; the engine logs and drops them.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CacheError {
    /// I/O error during cache operation.
    #[error("IO error: {0}")]
    IoError(String),
    /// Failed to encode an image for storage.
    #[error("Encode error: {0}")]
    EncodeError(String),
    /// Stored entry could not be decoded.
    #[error("Decode error: {0}")]
    DecodeError(String),
}

/// A key to image store with its own eviction policy.
///
/// Implementations must be thread-safe: every method may be called
/// concurrently from the load and cache-write pools.
pub trait ImageCachePort: Send + Sync {
    /// Returns the cached image, or `None` on a miss.
    fn get(&self, key: &CacheKey) -> Option<Arc<DynamicImage>>;

    /// Stores an image, replacing any existing entry for the key.
    ///
    /// A bounded tier may drop the entry without reporting an error.
    ///
    /// # Errors
    /// Returns error if the entry could not be written.
    fn put(&self, key: &CacheKey, image: Arc<DynamicImage>) -> CacheResult<()>;

    /// Removes an entry. Absent keys are ignored.
    fn remove(&self, key: &CacheKey);

    /// Drops all entries.
    fn clear(&self);

    /// Returns the current number of cached images.
    fn len(&self) -> usize;

    /// Returns true if the cache is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the bytes held by the tier, or 0 if it does not track size.
    fn size_bytes(&self) -> u64 {
        0
    }

    /// Shrinks the tier to at most `max_bytes`. Tiers without a byte budget ignore it.
    fn trim_to(&self, _max_bytes: u64) {}
}
