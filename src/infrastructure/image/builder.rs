//! Assembles an [`ImageLoader`] from configuration.

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{info, warn};

use super::decoders::{BytesDecoder, FileDecoder, HttpDecoder};
use super::descriptors::{BytesDescriptorFactory, FileDescriptorFactory, UriDescriptorFactory};
use super::disk_cache::DiskImageCache;
use super::memory_cache::MemoryImageCache;
use crate::application::services::SourceRegistry;
use crate::application::use_cases::ImageLoader;
use crate::domain::entities::SourceKind;
use crate::domain::errors::EngineError;
use crate::domain::ports::{DescriptorFactory, ImageCachePort, ImageDecoderPort};
use crate::infrastructure::config::ImageLoaderConfig;

/// Builder wiring cache tiers, source handlers and worker pools.
///
/// File and byte sources are always registered. HTTP(S) URIs are registered
/// when a tokio runtime is available, either given through
/// [`ImageLoaderBuilder::with_runtime`] or found on the building thread.
pub struct ImageLoaderBuilder {
    config: ImageLoaderConfig,
    registry: SourceRegistry,
    runtime: Option<Handle>,
    memory: Option<Arc<dyn ImageCachePort>>,
    storage: Option<Arc<dyn ImageCachePort>>,
}

impl ImageLoaderBuilder {
    /// Creates a builder from configuration.
    #[must_use]
    pub fn new(config: ImageLoaderConfig) -> Self {
        let registry = SourceRegistry::new()
            .with(
                SourceKind::File,
                Arc::new(FileDescriptorFactory),
                Arc::new(FileDecoder),
            )
            .with(
                SourceKind::Bytes,
                Arc::new(BytesDescriptorFactory),
                Arc::new(BytesDecoder),
            );
        Self {
            config,
            registry,
            runtime: None,
            memory: None,
            storage: None,
        }
    }

    /// Runs HTTP fetches on the given runtime.
    #[must_use]
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Registers (or replaces) the handler for a source kind.
    #[must_use]
    pub fn register(
        mut self,
        kind: SourceKind,
        factory: Arc<dyn DescriptorFactory>,
        decoder: Arc<dyn ImageDecoderPort>,
    ) -> Self {
        self.registry.register(kind, factory, decoder);
        self
    }

    /// Uses the given memory tier instead of building one.
    #[must_use]
    pub fn with_memory_cache(mut self, cache: Arc<dyn ImageCachePort>) -> Self {
        self.memory = Some(cache);
        self
    }

    /// Uses the given storage tier instead of building one.
    #[must_use]
    pub fn with_storage_cache(mut self, cache: Arc<dyn ImageCachePort>) -> Self {
        self.storage = Some(cache);
        self
    }

    /// Builds the loader and starts its worker pools.
    ///
    /// # Errors
    /// Returns error if the storage directory cannot be opened, the HTTP
    /// client cannot be built or a pool fails to start.
    pub fn build(self) -> Result<ImageLoader, EngineError> {
        let Self {
            config,
            mut registry,
            runtime,
            memory,
            storage,
        } = self;

        let memory = if config.memory_cache {
            memory.or_else(|| {
                Some(Arc::new(MemoryImageCache::new(config.memory_cache_bytes))
                    as Arc<dyn ImageCachePort>)
            })
        } else {
            None
        };

        let storage = if config.storage_cache {
            match storage {
                Some(cache) => Some(cache),
                None => {
                    let dir = config.effective_cache_dir();
                    let cache = DiskImageCache::new(dir, config.disk_cache_bytes)?;
                    Some(Arc::new(cache) as Arc<dyn ImageCachePort>)
                }
            }
        } else {
            None
        };

        if !registry.supports(SourceKind::Uri) {
            match runtime.or_else(|| Handle::try_current().ok()) {
                Some(handle) => {
                    let decoder = HttpDecoder::new(config.request_timeout(), handle)?;
                    registry.register(
                        SourceKind::Uri,
                        Arc::new(UriDescriptorFactory),
                        Arc::new(decoder),
                    );
                }
                None => warn!("No tokio runtime available, HTTP sources are disabled"),
            }
        }

        info!(
            memory_cache_bytes = config.memory_cache_bytes,
            disk_cache_bytes = config.disk_cache_bytes,
            max_load_threads = config.max_load_threads,
            "Building image loader"
        );
        ImageLoader::new(registry, memory, storage, config.pool_config())
    }
}

impl std::fmt::Debug for ImageLoaderBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoaderBuilder")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("runtime", &self.runtime.is_some())
            .finish_non_exhaustive()
    }
}
