//! Port definitions for turning source data into pixels.

use image::DynamicImage;

use crate::domain::entities::{Size, SourceData, SourceDescriptor};
use crate::domain::errors::LoadError;

/// Decode capability for one source type.
///
/// Called on a load worker thread. Implementations must eventually return
/// (for example by applying a request timeout) since in-flight decodes are
/// never interrupted.
#[cfg_attr(test, mockall::automock)]
pub trait ImageDecoderPort: Send + Sync {
    /// Decodes the source, fitting it into `size` when one is given.
    ///
    /// # Errors
    /// Returns error on I/O failure, malformed data or unsupported input.
    fn decode(&self, data: &SourceData, size: Option<Size>) -> Result<DynamicImage, LoadError>;
}

/// Builds a descriptor (cache identity and flags) from caller-supplied data.
pub trait DescriptorFactory: Send + Sync {
    /// Describes the source.
    fn describe(&self, data: SourceData) -> SourceDescriptor;
}

impl<F> DescriptorFactory for F
where
    F: Fn(SourceData) -> SourceDescriptor + Send + Sync,
{
    fn describe(&self, data: SourceData) -> SourceDescriptor {
        self(data)
    }
}
