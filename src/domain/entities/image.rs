//! Domain types for decoded images and request sizing.

use std::sync::Arc;

use image::DynamicImage;

use super::CacheKey;
use crate::domain::errors::RequestError;

/// Target dimensions a decoder should fit the image into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    width: u32,
    height: u32,
}

impl Size {
    /// Creates a new size.
    ///
    /// # Errors
    /// Returns [`RequestError::InvalidSize`] if either dimension is zero.
    pub const fn new(width: u32, height: u32) -> Result<Self, RequestError> {
        if width == 0 || height == 0 {
            return Err(RequestError::InvalidSize { width, height });
        }
        Ok(Self { width, height })
    }

    /// Returns the width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Returns true if an image of the given dimensions already fits.
    #[must_use]
    pub const fn contains(&self, width: u32, height: u32) -> bool {
        width <= self.width && height <= self.height
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Where an image was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Loaded from the in-memory LRU tier.
    MemoryCache,
    /// Loaded from the persistent storage tier.
    StorageCache,
    /// Produced by the decoder and transformation pipeline.
    Decoder,
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MemoryCache => write!(f, "memory"),
            Self::StorageCache => write!(f, "storage"),
            Self::Decoder => write!(f, "decoder"),
        }
    }
}

/// A successfully loaded image with its origin.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// Cache key the image is stored under, if the source is cacheable.
    pub key: Option<CacheKey>,
    /// The decoded image, shared between the caches and every receiver.
    pub image: Arc<DynamicImage>,
    /// Which stage produced the image.
    pub source: ImageSource,
}

impl LoadedImage {
    /// Creates a new loaded image.
    #[must_use]
    pub const fn new(key: Option<CacheKey>, image: Arc<DynamicImage>, source: ImageSource) -> Self {
        Self { key, image, source }
    }

    /// Returns the approximate size of the pixel buffer in bytes.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.image.as_bytes().len()
    }
}
