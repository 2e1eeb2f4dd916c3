//! Image handling infrastructure.
//!
//! This module provides:
//! - Memory caching with LRU eviction
//! - Disk caching for persistence
//! - Reference decoders, descriptor factories and transformations
//! - Loader assembly from configuration

pub mod builder;
pub mod decoders;
pub mod descriptors;
pub mod disk_cache;
pub mod memory_cache;
pub mod transformations;

pub use builder::ImageLoaderBuilder;
pub use decoders::{BytesDecoder, FileDecoder, HttpDecoder, decode_bytes, fit};
pub use descriptors::{BytesDescriptorFactory, FileDescriptorFactory, UriDescriptorFactory};
pub use disk_cache::{DEFAULT_MAX_CACHE_SIZE, DiskImageCache, default_cache_dir};
pub use memory_cache::{CacheStats, DEFAULT_MEMORY_BUDGET, MemoryImageCache};
pub use transformations::{Blur, CenterCrop, Grayscale, Resize};
