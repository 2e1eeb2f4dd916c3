//! Domain layer with core entities, errors and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{CacheKey, ImageSource, LoadedImage, Size, SourceData, SourceDescriptor};
pub use errors::{LoadError, RequestError};
pub use ports::{DisplayTarget, ImageCachePort, ImageDecoderPort, Transformation};
