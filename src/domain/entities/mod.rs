//! Domain entity definitions.

mod cache_key;
mod image;
mod source;
mod target;

pub use cache_key::CacheKey;
pub use image::{ImageSource, LoadedImage, Size};
pub use source::{SourceData, SourceDescriptor, SourceKind, hash_key_base};
pub use target::TargetId;
