//! Disk-based image cache for persistence across sessions.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::SystemTime;

use image::{DynamicImage, ImageFormat};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, trace, warn};

use crate::domain::entities::CacheKey;
use crate::domain::ports::{CacheError, CacheResult, ImageCachePort};

/// Maximum disk cache size in bytes (200 MB default).
pub const DEFAULT_MAX_CACHE_SIZE: u64 = 200 * 1024 * 1024;

const ENTRY_EXTENSION: &str = "img";

/// Disk-based image cache storing one PNG-encoded file per key.
///
/// Files are written to a temporary file and renamed into place, so a reader
/// never observes a partial entry.
pub struct DiskImageCache {
    cache_dir: PathBuf,
    max_size: u64,
    current_size: AtomicU64,
    item_count: AtomicUsize,
    write_lock: Mutex<()>,
}

impl DiskImageCache {
    /// Opens (or creates) a disk cache in the specified directory.
    ///
    /// # Errors
    /// Returns error if cache directory cannot be created or read.
    pub fn new(cache_dir: PathBuf, max_size: u64) -> CacheResult<Self> {
        fs::create_dir_all(&cache_dir)
            .map_err(|e| CacheError::IoError(format!("Failed to create cache dir: {e}")))?;

        let mut total_size = 0u64;
        let mut count = 0usize;
        for (_, _, size) in scan_entries(&cache_dir)? {
            total_size += size;
            count += 1;
        }

        debug!(
            dir = %cache_dir.display(),
            entries = count,
            bytes = total_size,
            "Opened disk image cache"
        );

        let cache = Self {
            cache_dir,
            max_size,
            current_size: AtomicU64::new(total_size),
            item_count: AtomicUsize::new(count),
            write_lock: Mutex::new(()),
        };
        cache.cleanup_if_needed();
        Ok(cache)
    }

    /// Opens a cache in the platform cache directory.
    ///
    /// # Errors
    /// Returns error if cache directory cannot be created.
    pub fn default_location() -> CacheResult<Self> {
        Self::new(default_cache_dir(), DEFAULT_MAX_CACHE_SIZE)
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path of the file backing a key.
    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        let digest = Sha256::digest(key.as_str().as_bytes());
        self.cache_dir
            .join(format!("{}.{ENTRY_EXTENSION}", hex::encode(digest)))
    }

    /// Returns true if a file exists for the key.
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entry_path(key).is_file()
    }

    /// Returns the current cache size in bytes.
    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.current_size.load(Ordering::Relaxed)
    }

    fn encode(image: &DynamicImage) -> CacheResult<Vec<u8>> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| CacheError::EncodeError(e.to_string()))?;
        Ok(bytes)
    }

    fn write_entry(&self, path: &Path, bytes: &[u8]) -> CacheResult<()> {
        let mut file = NamedTempFile::new_in(&self.cache_dir)
            .map_err(|e| CacheError::IoError(format!("Failed to create temp file: {e}")))?;
        file.write_all(bytes)
            .map_err(|e| CacheError::IoError(format!("Failed to write cache file: {e}")))?;
        file.flush()
            .map_err(|e| CacheError::IoError(format!("Failed to flush cache file: {e}")))?;

        let _guard = self.write_lock.lock();
        let old_size = fs::metadata(path).map(|m| m.len()).ok();
        file.persist(path)
            .map_err(|e| CacheError::IoError(format!("Failed to persist cache file: {e}")))?;

        let new_size = bytes.len() as u64;
        if let Some(old) = old_size {
            if new_size > old {
                self.current_size.fetch_add(new_size - old, Ordering::Relaxed);
            } else {
                self.current_size.fetch_sub(old - new_size, Ordering::Relaxed);
            }
        } else {
            self.current_size.fetch_add(new_size, Ordering::Relaxed);
            self.item_count.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> bool {
        let _guard = self.write_lock.lock();
        let size = fs::metadata(path).map(|m| m.len()).ok();
        match fs::remove_file(path) {
            Ok(()) => {
                if let Some(s) = size {
                    self.current_size.fetch_sub(s, Ordering::Relaxed);
                    self.item_count.fetch_sub(1, Ordering::Relaxed);
                }
                true
            }
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to remove cache file");
                }
                false
            }
        }
    }

    /// Removes least recently accessed files once the cache exceeds its budget.
    ///
    /// Frees down to 10% below the budget so cleanup does not run on every put.
    fn cleanup_if_needed(&self) {
        let current_size = self.current_size();
        if current_size <= self.max_size {
            return;
        }

        debug!(
            current_size = current_size,
            max_size = self.max_size,
            "Disk cache over limit, cleaning up"
        );

        let Ok(mut files) = scan_entries(&self.cache_dir) else {
            return;
        };
        files.sort_by_key(|(_, time, _)| *time);

        let target = current_size - self.max_size + (self.max_size / 10);
        let mut freed_size = 0u64;
        let mut freed_count = 0usize;

        for (path, _, size) in files {
            if freed_size >= target {
                break;
            }
            if self.remove_file(&path) {
                trace!(path = %path.display(), "Removed old cache file");
                freed_size += size;
                freed_count += 1;
            }
        }

        debug!(
            freed_size = freed_size,
            freed_count = freed_count,
            "Disk cache cleanup complete"
        );
    }
}

impl ImageCachePort for DiskImageCache {
    fn get(&self, key: &CacheKey) -> Option<Arc<DynamicImage>> {
        let path = self.entry_path(key);
        let Ok(bytes) = fs::read(&path) else {
            trace!(key = %key, "Disk cache miss");
            return None;
        };

        match image::load_from_memory_with_format(&bytes, ImageFormat::Png) {
            Ok(image) => {
                trace!(key = %key, path = %path.display(), "Disk cache hit");
                Some(Arc::new(image))
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding undecodable cache file");
                self.remove_file(&path);
                None
            }
        }
    }

    fn put(&self, key: &CacheKey, image: Arc<DynamicImage>) -> CacheResult<()> {
        let bytes = Self::encode(&image)?;
        let path = self.entry_path(key);
        self.write_entry(&path, &bytes)?;
        debug!(key = %key, path = %path.display(), size = bytes.len(), "Stored image in disk cache");

        self.cleanup_if_needed();
        Ok(())
    }

    fn remove(&self, key: &CacheKey) {
        if self.remove_file(&self.entry_path(key)) {
            debug!(key = %key, "Removed from disk cache");
        }
    }

    fn clear(&self) {
        let files = match scan_entries(&self.cache_dir) {
            Ok(files) => files,
            Err(e) => {
                warn!(error = %e, "Failed to read cache dir");
                return;
            }
        };
        for (path, _, _) in files {
            self.remove_file(&path);
        }
        debug!("Cleared disk cache");
    }

    fn len(&self) -> usize {
        self.item_count.load(Ordering::Relaxed)
    }

    fn size_bytes(&self) -> u64 {
        self.current_size()
    }
}

/// Lists cache files with their last access time and size.
fn scan_entries(dir: &Path) -> CacheResult<Vec<(PathBuf, SystemTime, u64)>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| CacheError::IoError(format!("Failed to read cache dir: {e}")))?;

    let mut files = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != ENTRY_EXTENSION) {
            continue;
        }
        if let Ok(meta) = entry.metadata() {
            let accessed = meta
                .accessed()
                .or_else(|_| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((path, accessed, meta.len()));
        }
    }
    Ok(files)
}

/// Returns the default cache directory path.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "oxiload", "oxiload").map_or_else(
        || std::env::temp_dir().join("oxiload").join("cache").join("images"),
        |dirs| dirs.cache_dir().join("images"),
    )
}
