//! Request and engine construction errors.

use thiserror::Error;

use crate::domain::entities::SourceKind;
use crate::domain::ports::CacheError;

/// Programmer errors reported synchronously when a request is built or submitted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    /// Target size with a zero dimension.
    #[error("invalid target size {width}x{height}: dimensions must be positive")]
    InvalidSize {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// No descriptor factory or decoder registered for the source type.
    #[error("no decoder registered for source kind '{0}'")]
    UnregisteredSource(SourceKind),

    /// The loader has been shut down.
    #[error("image loader has been shut down")]
    ShutDown,
}

/// Errors raised while assembling an image loader.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A worker pool could not be started.
    #[error("failed to build worker pool: {0}")]
    PoolBuild(String),

    /// A cache tier could not be opened.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<rayon::ThreadPoolBuildError> for EngineError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Self::PoolBuild(err.to_string())
    }
}
