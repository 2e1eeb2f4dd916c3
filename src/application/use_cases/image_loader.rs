//! Request engine: the public entry point for loading images.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, trace};

use super::load_action::{ActionContext, ActionState, LoadAction};
use crate::application::dto::{Callbacks, ImageRequest, LoadResult, PreparedRequest, TargetRef};
use crate::application::services::{
    Binding, BindingRegistry, CallbackDispatcher, PauseGate, PoolConfig, SourceRegistry,
    WorkerPools,
};
use crate::domain::entities::{CacheKey, ImageSource, LoadedImage, SourceData, SourceDescriptor};
use crate::domain::errors::{EngineError, RequestError};
use crate::domain::ports::ImageCachePort;

/// Severity of a host memory-pressure signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryPressure {
    /// Shed half of the memory tier.
    Moderate,
    /// Drop the whole memory tier.
    Critical,
}

/// Handle to a submitted request.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    action: Option<Arc<LoadAction>>,
}

impl RequestHandle {
    const fn new(action: Arc<LoadAction>) -> Self {
        Self {
            action: Some(action),
        }
    }

    const fn noop() -> Self {
        Self { action: None }
    }

    /// Cancels the underlying action. Shared actions are cancelled for every caller.
    pub fn cancel(&self) {
        if let Some(action) = &self.action {
            action.cancel();
        }
    }

    /// Returns true if the underlying action was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.action.as_ref().is_some_and(|a| a.is_cancelled())
    }

    /// Returns the action state. Requests served from memory report `CachedSync`.
    #[must_use]
    pub fn state(&self) -> ActionState {
        self.action
            .as_ref()
            .map_or(ActionState::CachedSync, |a| a.state())
    }

    /// Returns true if the request was answered without creating an action.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.action.is_none()
    }

    /// Returns the id of the underlying action.
    #[must_use]
    pub fn action_id(&self) -> Option<u64> {
        self.action.as_ref().map(|a| a.id())
    }
}

/// Loads, caches and delivers images.
///
/// One instance is built by the owning context and shared. Cloning is not
/// supported; wrap it in an `Arc` instead.
pub struct ImageLoader {
    registry: SourceRegistry,
    context: Arc<ActionContext>,
    pools: WorkerPools,
    shut_down: AtomicBool,
}

impl ImageLoader {
    /// Creates a loader and starts its worker pools and callback thread.
    ///
    /// # Errors
    /// Returns error if a pool or the callback thread cannot be started.
    pub fn new(
        registry: SourceRegistry,
        memory: Option<Arc<dyn ImageCachePort>>,
        storage: Option<Arc<dyn ImageCachePort>>,
        pool_config: PoolConfig,
    ) -> Result<Self, EngineError> {
        let pools = WorkerPools::start(pool_config)?;
        let (dispatcher, _thread) = CallbackDispatcher::spawn("oxiload-callbacks")
            .map_err(|e| EngineError::PoolBuild(e.to_string()))?;

        info!(
            memory_tier = memory.is_some(),
            storage_tier = storage.is_some(),
            "Image loader started"
        );

        let context = Arc::new(ActionContext {
            memory,
            storage,
            writer: pools.cache_writer(),
            gate: Arc::new(PauseGate::new()),
            dispatcher,
            bindings: BindingRegistry::new(),
        });

        Ok(Self {
            registry,
            context,
            pools,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Starts a request for source data using the registered handler.
    ///
    /// # Errors
    /// Returns error if no handler is registered for the source kind.
    pub fn request(&self, data: impl Into<SourceData>) -> Result<ImageRequest, RequestError> {
        let (descriptor, decoder) = self.registry.resolve(data.into())?;
        Ok(ImageRequest::custom(descriptor, decoder))
    }

    /// Submits a request for asynchronous execution.
    ///
    /// # Errors
    /// Returns error for an invalid size or after [`ImageLoader::shutdown`].
    pub fn submit(&self, request: ImageRequest) -> Result<RequestHandle, RequestError> {
        self.ensure_running()?;
        let prepared = request.prepare()?;

        let Some(target) = prepared.target.clone() else {
            let (action, callbacks) = LoadAction::new(prepared, false, Arc::clone(&self.context));
            action.attach(callbacks);
            self.schedule(&action);
            return Ok(RequestHandle::new(action));
        };

        if let Some(cached) = self.memory_hit(&prepared) {
            if let Some(previous) = self.context.bindings.unbind(target.id) {
                previous.cancel();
            }
            trace!(target = %target.id, "Serving display request from memory");
            self.deliver_cached(target, cached, prepared.callbacks);
            return Ok(RequestHandle::noop());
        }

        let key = prepared.key.clone();
        let (candidate, callbacks) = LoadAction::new(prepared, true, Arc::clone(&self.context));
        match self
            .context
            .bindings
            .bind_or_reuse(target.id, &candidate, |bound| bound.can_absorb(key.as_ref()))
        {
            Binding::Reused(existing) => {
                debug!(action = existing.id(), target = %target.id, "Absorbed duplicate request");
                existing.attach(callbacks);
                Ok(RequestHandle::new(existing))
            }
            Binding::Bound { previous } => {
                if let Some(previous) = previous {
                    debug!(
                        action = previous.id(),
                        target = %target.id,
                        "Preempting action bound to target"
                    );
                    previous.cancel();
                }
                candidate.attach(callbacks);
                self.schedule(&candidate);
                Ok(RequestHandle::new(candidate))
            }
        }
    }

    /// Executes a request on the calling thread and returns its result.
    ///
    /// Callbacks and display run inline. Cache writes still go to the
    /// cache-write pool. Blocks while loading is paused.
    ///
    /// # Errors
    /// Returns error for an invalid size or after [`ImageLoader::shutdown`].
    pub fn load_sync(&self, request: ImageRequest) -> Result<LoadResult, RequestError> {
        self.ensure_running()?;
        let prepared = request.prepare()?;
        let (action, callbacks) = LoadAction::new(prepared, false, Arc::clone(&self.context));
        action.attach(callbacks);
        Ok(action.run_inline())
    }

    /// Removes the descriptor's base entry from every tier it enables.
    pub fn invalidate(&self, descriptor: &SourceDescriptor) {
        if let Some(key) = CacheKey::build(descriptor, None, None) {
            let (memory, storage) = self.tiers_for(descriptor);
            remove_from_tiers(memory, storage, &key);
        }
    }

    /// Like [`ImageLoader::invalidate`], but runs on the cache-write pool.
    pub fn invalidate_async(&self, descriptor: SourceDescriptor) {
        let Some(key) = CacheKey::build(&descriptor, None, None) else {
            return;
        };
        let (memory, storage) = self.tiers_for(&descriptor);
        let (memory, storage) = (memory.cloned(), storage.cloned());
        self.context
            .writer
            .spawn(move || remove_from_tiers(memory.as_ref(), storage.as_ref(), &key));
    }

    /// Removes one exact key from both tiers.
    pub fn invalidate_key(&self, key: &CacheKey) {
        remove_from_tiers(
            self.context.memory.as_ref(),
            self.context.storage.as_ref(),
            key,
        );
    }

    /// Pauses or resumes loading.
    pub fn set_paused(&self, paused: bool) {
        self.context.gate.set_paused(paused);
    }

    /// Returns true if loading is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.context.gate.is_paused()
    }

    /// Sets whether paused actions abort instead of waiting.
    pub fn set_interrupt_early(&self, interrupt: bool) {
        self.context.gate.set_interrupt_early(interrupt);
    }

    /// Returns true if paused actions abort.
    #[must_use]
    pub fn is_interrupt_early(&self) -> bool {
        self.context.gate.is_interrupt_early()
    }

    /// Drops every entry of the memory tier.
    pub fn clear_memory_cache(&self) {
        if let Some(memory) = &self.context.memory {
            memory.clear();
            debug!("Memory tier cleared");
        }
    }

    /// Drops every entry of the storage tier.
    pub fn clear_storage_cache(&self) {
        if let Some(storage) = &self.context.storage {
            storage.clear();
            debug!("Storage tier cleared");
        }
    }

    /// Drops every entry of both tiers.
    pub fn clear_all_caches(&self) {
        self.clear_memory_cache();
        self.clear_storage_cache();
    }

    /// Sheds memory in response to a host signal.
    pub fn handle_memory_pressure(&self, pressure: MemoryPressure) {
        let Some(memory) = &self.context.memory else {
            return;
        };
        info!(?pressure, bytes = memory.size_bytes(), "Handling memory pressure");
        match pressure {
            MemoryPressure::Moderate => memory.trim_to(memory.size_bytes() / 2),
            MemoryPressure::Critical => memory.clear(),
        }
    }

    /// Stops accepting requests and drains queued actions as cancelled.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Image loader shutting down");
        self.context.gate.set_paused(true);
        self.context.gate.set_interrupt_early(true);
    }

    /// Returns true after [`ImageLoader::shutdown`].
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Returns the memory tier.
    #[must_use]
    pub fn memory_cache(&self) -> Option<&Arc<dyn ImageCachePort>> {
        self.context.memory.as_ref()
    }

    /// Returns the storage tier.
    #[must_use]
    pub fn storage_cache(&self) -> Option<&Arc<dyn ImageCachePort>> {
        self.context.storage.as_ref()
    }

    /// Returns the worker pools.
    #[must_use]
    pub const fn pools(&self) -> &WorkerPools {
        &self.pools
    }

    fn ensure_running(&self) -> Result<(), RequestError> {
        if self.is_shut_down() {
            return Err(RequestError::ShutDown);
        }
        Ok(())
    }

    fn schedule(&self, action: &Arc<LoadAction>) {
        trace!(action = action.id(), key = ?action.key(), "Scheduling action");
        let action = Arc::clone(action);
        self.pools.spawn_load(move || action.run());
    }

    fn tiers_for(
        &self,
        descriptor: &SourceDescriptor,
    ) -> (
        Option<&Arc<dyn ImageCachePort>>,
        Option<&Arc<dyn ImageCachePort>>,
    ) {
        (
            self.context
                .memory
                .as_ref()
                .filter(|_| descriptor.is_memory_cacheable()),
            self.context
                .storage
                .as_ref()
                .filter(|_| descriptor.is_storage_cacheable()),
        )
    }

    fn memory_hit(&self, prepared: &PreparedRequest) -> Option<LoadedImage> {
        let key = prepared.key.as_ref()?;
        let (memory, _) = self.tiers_for(&prepared.descriptor);
        let image = memory?.get(key)?;
        Some(LoadedImage::new(Some(key.clone()), image, ImageSource::MemoryCache))
    }

    fn deliver_cached(&self, target: TargetRef, image: LoadedImage, callbacks: Callbacks) {
        self.context.dispatcher.dispatch(move || {
            let displayed_on = target.target.upgrade().map(|surface| {
                surface.show_image(&image);
                target.id
            });
            callbacks.fire(&LoadResult::Loaded(image), displayed_on);
        });
    }
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("registry", &self.registry)
            .field("context", &self.context)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

fn remove_from_tiers(
    memory: Option<&Arc<dyn ImageCachePort>>,
    storage: Option<&Arc<dyn ImageCachePort>>,
    key: &CacheKey,
) {
    debug!(key = %key, "Invalidating cache entry");
    if let Some(memory) = memory {
        memory.remove(key);
    }
    if let Some(storage) = storage {
        storage.remove(key);
    }
}
