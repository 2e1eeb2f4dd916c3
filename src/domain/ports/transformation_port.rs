//! Port definition for image transformations.

use image::DynamicImage;

use crate::domain::errors::LoadError;

/// A deterministic image to image function with a stable cache identity.
///
/// The input is taken by value: a step either returns it untouched or drops
/// it once the output exists, so only one buffer per step survives.
pub trait Transformation: Send + Sync {
    /// Fragment appended to the cache key. Equal fragments must mean equal output.
    fn key(&self) -> String;

    /// Applies the transformation.
    ///
    /// # Errors
    /// Returns error if the image cannot be transformed; the request then fails.
    fn transform(&self, image: DynamicImage) -> Result<DynamicImage, LoadError>;
}
