//! Infrastructure layer with concrete adapters.

/// Application configuration.
pub mod config;
/// Image caches, decoders and loader assembly.
pub mod image;

pub use config::{AppConfig, CliArgs, ImageLoaderConfig, LogLevel, StorageManager};
pub use image::{DiskImageCache, ImageLoaderBuilder, MemoryImageCache};
