//! Load and cache-write thread pools.

use std::any::Any;
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{error, info};

use crate::domain::errors::EngineError;

/// Default upper bound on load threads.
pub const DEFAULT_MAX_LOAD_THREADS: usize = 4;

/// Thread counts for the two pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Threads decoding and transforming images.
    pub load_threads: usize,
    /// Threads writing results into the cache tiers.
    pub cache_threads: usize,
}

impl PoolConfig {
    /// Sizes the pools from the given parallelism, capped at `max_load_threads`.
    ///
    /// The cache-write pool gets half the load pool. Both have at least one thread.
    #[must_use]
    pub fn for_parallelism(parallelism: usize, max_load_threads: usize) -> Self {
        let load_threads = parallelism.min(max_load_threads).max(1);
        Self {
            load_threads,
            cache_threads: (load_threads / 2).max(1),
        }
    }

    /// Sizes the pools from the machine's available parallelism.
    #[must_use]
    pub fn detect(max_load_threads: usize) -> Self {
        let parallelism = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        Self::for_parallelism(parallelism, max_load_threads)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::detect(DEFAULT_MAX_LOAD_THREADS)
    }
}

/// The two worker pools shared by every action.
///
/// Cache writes run on their own pool so slow disk writes never hold up decodes.
#[derive(Clone)]
pub struct WorkerPools {
    load: Arc<ThreadPool>,
    cache: Arc<ThreadPool>,
}

impl WorkerPools {
    /// Starts both pools.
    ///
    /// # Errors
    /// Returns error if a pool cannot be built.
    pub fn start(config: PoolConfig) -> Result<Self, EngineError> {
        let load = ThreadPoolBuilder::new()
            .num_threads(config.load_threads.max(1))
            .thread_name(|i| format!("oxiload-load-{i}"))
            .panic_handler(|payload| {
                error!(panic = %panic_message(payload.as_ref()), "Load job panicked");
            })
            .build()?;
        let cache = ThreadPoolBuilder::new()
            .num_threads(config.cache_threads.max(1))
            .thread_name(|i| format!("oxiload-cache-{i}"))
            .panic_handler(|payload| {
                error!(panic = %panic_message(payload.as_ref()), "Cache job panicked");
            })
            .build()?;

        info!(
            load_threads = load.current_num_threads(),
            cache_threads = cache.current_num_threads(),
            "Worker pools started"
        );

        Ok(Self {
            load: Arc::new(load),
            cache: Arc::new(cache),
        })
    }

    /// Queues work on the load pool.
    pub fn spawn_load(&self, job: impl FnOnce() + Send + 'static) {
        self.load.spawn(job);
    }

    /// Returns a handle for queueing cache writes.
    #[must_use]
    pub fn cache_writer(&self) -> CacheWriter {
        CacheWriter {
            pool: Arc::clone(&self.cache),
        }
    }

    /// Returns the number of load threads.
    #[must_use]
    pub fn load_threads(&self) -> usize {
        self.load.current_num_threads()
    }

    /// Returns the number of cache-write threads.
    #[must_use]
    pub fn cache_threads(&self) -> usize {
        self.cache.current_num_threads()
    }
}

/// Fire-and-forget handle onto the cache-write pool.
#[derive(Clone)]
pub struct CacheWriter {
    pool: Arc<ThreadPool>,
}

impl CacheWriter {
    /// Queues a cache write or other storage maintenance.
    pub fn spawn(&self, job: impl FnOnce() + Send + 'static) {
        self.pool.spawn(job);
    }
}

/// Extracts the message carried by a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(1, 4, 1, 1 ; "single_core")]
    #[test_case(2, 4, 2, 1 ; "dual_core")]
    #[test_case(3, 4, 3, 1 ; "odd_core_count")]
    #[test_case(16, 4, 4, 2 ; "capped")]
    #[test_case(0, 4, 1, 1 ; "zero_parallelism")]
    fn test_pool_sizing(parallelism: usize, cap: usize, load: usize, cache: usize) {
        let config = PoolConfig::for_parallelism(parallelism, cap);
        assert_eq!(config.load_threads, load);
        assert_eq!(config.cache_threads, cache);
    }

    #[test]
    fn test_pools_start_with_requested_sizes() {
        let pools = WorkerPools::start(PoolConfig {
            load_threads: 2,
            cache_threads: 1,
        })
        .unwrap();
        assert_eq!(pools.load_threads(), 2);
        assert_eq!(pools.cache_threads(), 1);
    }

    #[test]
    fn test_cache_writer_runs_on_cache_pool() {
        let pools = WorkerPools::start(PoolConfig {
            load_threads: 1,
            cache_threads: 1,
        })
        .unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        pools.cache_writer().spawn(move || {
            let _ = tx.send(std::thread::current().name().map(String::from));
        });
        let name = rx.blocking_recv().unwrap();
        assert_eq!(name.as_deref(), Some("oxiload-cache-0"));
    }

    #[test]
    fn test_panicking_job_keeps_pool_alive() {
        let pools = WorkerPools::start(PoolConfig {
            load_threads: 1,
            cache_threads: 1,
        })
        .unwrap();
        pools.spawn_load(|| panic!("load job blew up"));
        pools.cache_writer().spawn(|| panic!("cache job blew up"));

        let (load_tx, load_rx) = tokio::sync::oneshot::channel();
        pools.spawn_load(move || {
            let _ = load_tx.send(());
        });
        let (cache_tx, cache_rx) = tokio::sync::oneshot::channel();
        pools.cache_writer().spawn(move || {
            let _ = cache_tx.send(());
        });

        assert!(load_rx.blocking_recv().is_ok());
        assert!(cache_rx.blocking_recv().is_ok());
    }

    #[test]
    fn test_panic_message_reads_both_payload_kinds() {
        let literal: Box<dyn Any + Send> = Box::new("static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn Any + Send> = Box::new(7_u8);

        assert_eq!(panic_message(literal.as_ref()), "static");
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }
}
