//! Load failure types.

use thiserror::Error;

/// Failure of a decode or transformation step.
///
/// Failures are reported once through the error callback and never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum LoadError {
    #[error("i/o error: {message}")]
    Io { message: String },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("timed out: {message}")]
    Timeout { message: String },

    #[error("malformed image data: {message}")]
    Decode { message: String },

    #[error("unsupported source: {message}")]
    Unsupported { message: String },

    #[error("decoder produced no image")]
    EmptyResult,

    #[error("transformation failed: {message}")]
    Transform { message: String },
}

impl LoadError {
    /// Creates I/O error.
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Creates decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates unsupported source error.
    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Creates transformation error.
    #[must_use]
    pub fn transform(message: impl Into<String>) -> Self {
        Self::Transform {
            message: message.into(),
        }
    }

    /// Returns whether the failure came from fetching rather than pixels.
    #[must_use]
    pub const fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Network { .. } | Self::Timeout { .. }
        )
    }
}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::TimedOut {
            Self::timeout(err.to_string())
        } else {
            Self::io(err.to_string())
        }
    }
}

impl From<image::ImageError> for LoadError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Unsupported(e) => Self::unsupported(e.to_string()),
            image::ImageError::IoError(e) => e.into(),
            other => Self::decode(other.to_string()),
        }
    }
}
