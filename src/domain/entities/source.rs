//! Source identity: what to load and whether it may be cached.

use std::path::PathBuf;

use bytes::Bytes;
use sha2::{Digest, Sha256};

/// Type tag used to pick a descriptor factory and decoder for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Remote or local URI.
    Uri,
    /// File on the local filesystem.
    File,
    /// Encoded image bytes held in memory.
    Bytes,
    /// Application-defined source type.
    Custom(&'static str),
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uri => write!(f, "uri"),
            Self::File => write!(f, "file"),
            Self::Bytes => write!(f, "bytes"),
            Self::Custom(kind) => write!(f, "custom:{kind}"),
        }
    }
}

/// Caller-supplied data identifying an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceData {
    /// A URI such as `https://example.com/a.png`.
    Uri(String),
    /// A path to an encoded image file.
    File(PathBuf),
    /// Encoded image bytes.
    Bytes(Bytes),
    /// An application-defined source, resolved by a registered decoder.
    Custom {
        /// Registry tag.
        kind: &'static str,
        /// Identifier understood by the registered decoder.
        id: String,
    },
}

impl SourceData {
    /// Returns the registry tag for this source.
    #[must_use]
    pub const fn kind(&self) -> SourceKind {
        match self {
            Self::Uri(_) => SourceKind::Uri,
            Self::File(_) => SourceKind::File,
            Self::Bytes(_) => SourceKind::Bytes,
            Self::Custom { kind, .. } => SourceKind::Custom(*kind),
        }
    }
}

impl From<&str> for SourceData {
    fn from(uri: &str) -> Self {
        Self::Uri(uri.to_string())
    }
}

impl From<PathBuf> for SourceData {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl From<Bytes> for SourceData {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

/// Immutable identity of a load request.
///
/// The key is derived once at construction; anonymous descriptors have no key
/// and bypass both cache tiers.
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    data: SourceData,
    key: Option<String>,
    memory_cacheable: bool,
    storage_cacheable: bool,
}

impl SourceDescriptor {
    /// Creates a descriptor whose key is a hash of `key_base`.
    #[must_use]
    pub fn identified(data: SourceData, key_base: &str) -> Self {
        Self::with_key(data, hash_key_base(key_base.as_bytes()))
    }

    /// Creates a descriptor with an already stable key, used verbatim.
    #[must_use]
    pub fn with_key(data: SourceData, key: impl Into<String>) -> Self {
        Self {
            data,
            key: Some(key.into()),
            memory_cacheable: true,
            storage_cacheable: true,
        }
    }

    /// Creates a descriptor that cannot be cached.
    #[must_use]
    pub const fn anonymous(data: SourceData) -> Self {
        Self {
            data,
            key: None,
            memory_cacheable: false,
            storage_cacheable: false,
        }
    }

    /// Disables the memory tier for this source.
    #[must_use]
    pub const fn without_memory_cache(mut self) -> Self {
        self.memory_cacheable = false;
        self
    }

    /// Disables the storage tier for this source.
    #[must_use]
    pub const fn without_storage_cache(mut self) -> Self {
        self.storage_cacheable = false;
        self
    }

    /// Returns the source data.
    #[must_use]
    pub const fn data(&self) -> &SourceData {
        &self.data
    }

    /// Returns the hashed key base, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Returns true if results may be stored in the memory tier.
    #[must_use]
    pub const fn is_memory_cacheable(&self) -> bool {
        self.memory_cacheable && self.key.is_some()
    }

    /// Returns true if results may be stored in the storage tier.
    #[must_use]
    pub const fn is_storage_cacheable(&self) -> bool {
        self.storage_cacheable && self.key.is_some()
    }
}

/// Hashes arbitrary identity bytes into a compact hex key.
#[must_use]
pub fn hash_key_base(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    hex::encode(&result[..16])
}
