//! Application configuration.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use super::args::CliArgs;
use crate::application::services::{DEFAULT_MAX_LOAD_THREADS, PoolConfig};
use crate::infrastructure::image::{DEFAULT_MAX_CACHE_SIZE, DEFAULT_MEMORY_BUDGET, default_cache_dir};

const APP_NAME: &str = "oxiload";
const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "oxiload";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Converts to tracing level.
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration, loaded from TOML and overridden by CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path. Logs go to stderr when unset.
    #[serde(skip)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Image loader configuration.
    #[serde(default)]
    pub loader: ImageLoaderConfig,
}

/// Image loader configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageLoaderConfig {
    /// Memory tier budget in decoded bytes.
    #[serde(default = "default_memory_cache_bytes")]
    pub memory_cache_bytes: u64,

    /// Storage tier budget in bytes on disk.
    #[serde(default = "default_disk_cache_bytes")]
    pub disk_cache_bytes: u64,

    /// Storage tier directory. Defaults to the platform cache directory.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Enable the memory tier.
    #[serde(default = "default_true")]
    pub memory_cache: bool,

    /// Enable the storage tier.
    #[serde(default = "default_true")]
    pub storage_cache: bool,

    /// Upper bound on load threads.
    #[serde(default = "default_max_load_threads")]
    pub max_load_threads: usize,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ImageLoaderConfig {
    /// Returns the storage tier directory to use.
    #[must_use]
    pub fn effective_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }

    /// Returns the HTTP request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Returns worker pool sizes for this machine.
    #[must_use]
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::detect(self.max_load_threads)
    }
}

impl Default for ImageLoaderConfig {
    fn default() -> Self {
        Self {
            memory_cache_bytes: default_memory_cache_bytes(),
            disk_cache_bytes: default_disk_cache_bytes(),
            cache_dir: None,
            memory_cache: true,
            storage_cache: true,
            max_load_threads: default_max_load_threads(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_memory_cache_bytes() -> u64 {
    DEFAULT_MEMORY_BUDGET
}

const fn default_disk_cache_bytes() -> u64 {
    DEFAULT_MAX_CACHE_SIZE
}

const fn default_max_load_threads() -> usize {
    DEFAULT_MAX_LOAD_THREADS
}

const fn default_request_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(config_path) = &args.config {
            self.config = Some(config_path.clone());
        }
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(cache_dir) = &args.cache_dir {
            self.loader.cache_dir = Some(cache_dir.clone());
        }
        if let Some(threads) = args.max_load_threads {
            self.loader.max_load_threads = threads;
        }
        if let Some(timeout) = args.timeout {
            self.loader.request_timeout_secs = timeout;
        }
        if args.no_memory_cache {
            self.loader.memory_cache = false;
        }
        if args.no_storage_cache {
            self.loader.storage_cache = false;
        }
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default config file path.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Returns effective config path.
    #[must_use]
    pub fn effective_config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(Self::default_config_path)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config: None,
            log_path: None,
            log_level: LogLevel::Info,
            loader: ImageLoaderConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_partial_loader_section() {
        let toml_content = r#"
            log_level = "debug"

            [loader]
            memory_cache_bytes = 1048576
            storage_cache = false
        "#;

        let config: AppConfig = toml::from_str(toml_content).expect("Failed to parse config");

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.loader.memory_cache_bytes, 1_048_576);
        assert!(!config.loader.storage_cache);
        assert!(config.loader.memory_cache);
        assert_eq!(config.loader.max_load_threads, DEFAULT_MAX_LOAD_THREADS);
        assert_eq!(config.loader.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.loader, ImageLoaderConfig::default());
        assert!(config.loader.cache_dir.is_none());
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let content = toml::to_string_pretty(&AppConfig::default()).unwrap();
        let parsed: AppConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed.loader, ImageLoaderConfig::default());
    }

    #[test]
    fn test_merge_with_args() {
        let args = CliArgs::parse_from([
            "oxiload",
            "--log-level",
            "trace",
            "--no-storage-cache",
            "--max-load-threads",
            "2",
            "--cache-dir",
            "/tmp/oxiload-test",
            "image.png",
        ]);
        let mut config = AppConfig::default();
        config.merge_with_args(&args);

        assert_eq!(config.log_level, LogLevel::Trace);
        assert!(!config.loader.storage_cache);
        assert!(config.loader.memory_cache);
        assert_eq!(config.loader.max_load_threads, 2);
        assert_eq!(
            config.loader.effective_cache_dir(),
            PathBuf::from("/tmp/oxiload-test")
        );
    }
}
