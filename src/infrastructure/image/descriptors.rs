//! Descriptor factories for the built-in source kinds.

use std::fs;
use std::time::UNIX_EPOCH;

use tracing::debug;

use crate::domain::entities::{SourceData, SourceDescriptor, hash_key_base};
use crate::domain::ports::DescriptorFactory;

/// Keys URIs by the URI string.
#[derive(Debug, Clone, Copy, Default)]
pub struct UriDescriptorFactory;

impl DescriptorFactory for UriDescriptorFactory {
    fn describe(&self, data: SourceData) -> SourceDescriptor {
        match &data {
            SourceData::Uri(uri) => {
                let key_base = uri.clone();
                SourceDescriptor::identified(data, &key_base)
            }
            _ => SourceDescriptor::anonymous(data),
        }
    }
}

/// Keys files by path, length and modification time.
///
/// Editing a file therefore yields a new key. Files whose metadata cannot be
/// read are anonymous; the decoder reports the actual failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileDescriptorFactory;

impl DescriptorFactory for FileDescriptorFactory {
    fn describe(&self, data: SourceData) -> SourceDescriptor {
        let SourceData::File(path) = &data else {
            return SourceDescriptor::anonymous(data);
        };
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No metadata, source is uncacheable");
                return SourceDescriptor::anonymous(data);
            }
        };
        let modified = metadata
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |since| since.as_nanos());
        let key_base = format!("{}|{}|{modified}", path.display(), metadata.len());
        SourceDescriptor::identified(data, &key_base)
    }
}

/// Keys in-memory bytes by a hash of their content.
///
/// Bytes are never written to the storage tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesDescriptorFactory;

impl DescriptorFactory for BytesDescriptorFactory {
    fn describe(&self, data: SourceData) -> SourceDescriptor {
        match &data {
            SourceData::Bytes(bytes) => {
                let key = hash_key_base(bytes);
                SourceDescriptor::with_key(data, key).without_storage_cache()
            }
            _ => SourceDescriptor::anonymous(data),
        }
    }
}
