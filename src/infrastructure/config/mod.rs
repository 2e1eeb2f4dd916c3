//! Application configuration.

pub mod app_config;
pub mod args;
pub mod storage;

pub use app_config::{AppConfig, ImageLoaderConfig, LogLevel};
pub use args::CliArgs;
pub use storage::{ConfigError, StorageManager};
