mod display_target_port;
mod image_cache_port;
mod image_decoder_port;
mod transformation_port;

pub use display_target_port::DisplayTarget;
pub use image_cache_port::{CacheError, CacheResult, ImageCachePort};
pub use image_decoder_port::{DescriptorFactory, ImageDecoderPort};
pub use transformation_port::Transformation;

#[cfg(test)]
pub mod mocks {
    pub use super::image_cache_port::mock::MockImageCache;
    pub use super::image_decoder_port::MockImageDecoderPort;
}
