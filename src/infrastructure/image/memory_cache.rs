//! In-memory LRU image cache bounded by decoded byte size.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use image::DynamicImage;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::entities::CacheKey;
use crate::domain::ports::{CacheResult, ImageCachePort};

/// Default memory budget (64 MB of decoded pixels).
pub const DEFAULT_MEMORY_BUDGET: u64 = 64 * 1024 * 1024;

struct Entries {
    lru: LruCache<CacheKey, Arc<DynamicImage>>,
    bytes: u64,
}

impl Entries {
    fn evict_until(&mut self, max_bytes: u64) -> usize {
        let mut evicted = 0;
        while self.bytes > max_bytes {
            let Some((key, image)) = self.lru.pop_lru() else {
                break;
            };
            self.bytes = self.bytes.saturating_sub(weight(&image));
            trace!(key = %key, "Evicted from memory cache");
            evicted += 1;
        }
        evicted
    }
}

fn weight(image: &DynamicImage) -> u64 {
    image.as_bytes().len() as u64
}

/// In-memory LRU cache for decoded images.
///
/// Entries are weighed by their pixel buffer size. Inserting past the budget
/// evicts least-recently-used entries until the cache fits again.
pub struct MemoryImageCache {
    entries: Mutex<Entries>,
    max_bytes: u64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryImageCache {
    /// Creates a cache holding at most `max_bytes` of decoded pixels.
    #[must_use]
    pub fn new(max_bytes: u64) -> Self {
        Self {
            entries: Mutex::new(Entries {
                lru: LruCache::unbounded(),
                bytes: 0,
            }),
            max_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the configured byte budget.
    #[must_use]
    pub const fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        let entries = self.entries.lock();
        CacheStats {
            hits,
            misses,
            hit_rate,
            size: entries.lru.len(),
            bytes: entries.bytes,
        }
    }

    /// Peeks at an image without promoting it in the LRU or counting a hit.
    pub fn peek(&self, key: &CacheKey) -> Option<Arc<DynamicImage>> {
        self.entries.lock().lru.peek(key).cloned()
    }
}

impl Default for MemoryImageCache {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_BUDGET)
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached images.
    pub size: usize,
    /// Decoded bytes currently held.
    pub bytes: u64,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} images ({} bytes), {:.1}% hit rate ({} hits, {} misses)",
            self.size, self.bytes, self.hit_rate, self.hits, self.misses
        )
    }
}

impl ImageCachePort for MemoryImageCache {
    fn get(&self, key: &CacheKey) -> Option<Arc<DynamicImage>> {
        let mut entries = self.entries.lock();
        if let Some(image) = entries.lru.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache hit");
            Some(Arc::clone(image))
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache miss");
            None
        }
    }

    fn put(&self, key: &CacheKey, image: Arc<DynamicImage>) -> CacheResult<()> {
        let size = weight(&image);
        let mut entries = self.entries.lock();

        if let Some(previous) = entries.lru.pop(key) {
            entries.bytes = entries.bytes.saturating_sub(weight(&previous));
        }
        if size > self.max_bytes {
            debug!(key = %key, size, max = self.max_bytes, "Image exceeds memory budget, not cached");
            return Ok(());
        }

        entries.lru.put(key.clone(), image);
        entries.bytes += size;
        let evicted = entries.evict_until(self.max_bytes);
        trace!(key = %key, size, evicted, "Stored image in memory cache");
        Ok(())
    }

    fn remove(&self, key: &CacheKey) {
        let mut entries = self.entries.lock();
        if let Some(image) = entries.lru.pop(key) {
            entries.bytes = entries.bytes.saturating_sub(weight(&image));
            debug!(key = %key, "Removed image from memory cache");
        }
    }

    fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.lru.clear();
        entries.bytes = 0;
        debug!("Cleared memory image cache");
    }

    fn len(&self) -> usize {
        self.entries.lock().lru.len()
    }

    fn size_bytes(&self) -> u64 {
        self.entries.lock().bytes
    }

    fn trim_to(&self, max_bytes: u64) {
        let evicted = self.entries.lock().evict_until(max_bytes);
        debug!(max_bytes, evicted, "Trimmed memory cache");
    }
}
