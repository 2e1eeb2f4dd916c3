//! Per-request execution state machine.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use image::DynamicImage;
use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use crate::application::dto::{Callbacks, Cancellation, LoadResult, PreparedRequest, TargetRef};
use crate::application::services::{
    BindingRegistry, CacheWriter, CallbackDispatcher, GateOutcome, PauseGate, panic_message,
};
use crate::domain::entities::{
    CacheKey, ImageSource, LoadedImage, Size, SourceDescriptor, TargetId,
};
use crate::domain::errors::LoadError;
use crate::domain::ports::{ImageCachePort, ImageDecoderPort, Transformation};

static NEXT_ACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a [`LoadAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    /// Constructed, not yet picked up by a worker.
    Created,
    /// A worker is executing the action.
    Running,
    /// Delivered from the storage tier or the decoder.
    Delivered,
    /// Delivered straight from the memory tier.
    CachedSync,
    /// Decoding or transforming failed.
    Failed,
    /// Cancelled before delivery.
    Cancelled,
}

impl ActionState {
    /// Returns true for states with no outgoing transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Created | Self::Running)
    }
}

impl std::fmt::Display for ActionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Delivered => "delivered",
            Self::CachedSync => "cached",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{name}")
    }
}

/// Collaborators shared by every action of one loader.
pub struct ActionContext {
    /// Memory tier, if enabled.
    pub memory: Option<Arc<dyn ImageCachePort>>,
    /// Storage tier, if enabled.
    pub storage: Option<Arc<dyn ImageCachePort>>,
    /// Queue onto the cache-write pool.
    pub writer: CacheWriter,
    /// Shared pause coordination.
    pub gate: Arc<PauseGate>,
    /// Callback thread.
    pub dispatcher: CallbackDispatcher,
    /// Display target bindings.
    pub bindings: BindingRegistry<LoadAction>,
}

impl std::fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionContext")
            .field("memory", &self.memory.is_some())
            .field("storage", &self.storage.is_some())
            .field("gate", &self.gate)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
struct Outcome {
    result: LoadResult,
    displayed_on: Option<TargetId>,
}

struct ActionInner {
    state: ActionState,
    listeners: Vec<Callbacks>,
    outcome: Option<Outcome>,
    target: Option<TargetRef>,
}

/// Result of running the steps, before it is delivered.
struct Completion {
    state: ActionState,
    result: LoadResult,
    populate: Vec<Arc<dyn ImageCachePort>>,
}

impl Completion {
    fn cancelled(reason: Cancellation) -> Self {
        Self {
            state: ActionState::Cancelled,
            result: LoadResult::Cancelled(reason),
            populate: Vec::new(),
        }
    }

    fn failed(error: LoadError) -> Self {
        Self {
            state: ActionState::Failed,
            result: LoadResult::Failed(error),
            populate: Vec::new(),
        }
    }
}

/// One request's journey from cache lookup to delivery.
///
/// The terminal state is entered exactly once, under the action lock. Once
/// terminal the action holds no reference to its display target.
pub struct LoadAction {
    id: u64,
    key: Option<CacheKey>,
    descriptor: SourceDescriptor,
    decoder: Arc<dyn ImageDecoderPort>,
    size: Option<Size>,
    transformation: Option<Arc<dyn Transformation>>,
    target_id: Option<TargetId>,
    bound: bool,
    context: Arc<ActionContext>,
    cancelled: AtomicBool,
    inner: Mutex<ActionInner>,
}

impl LoadAction {
    /// Creates an action for a prepared request.
    ///
    /// `bound` marks actions registered in the binding registry; only those
    /// re-validate the binding before displaying. Callbacks are not taken
    /// from the request; attach them with [`LoadAction::attach`].
    #[must_use]
    pub fn new(
        request: PreparedRequest,
        bound: bool,
        context: Arc<ActionContext>,
    ) -> (Arc<Self>, Callbacks) {
        let PreparedRequest {
            key,
            descriptor,
            decoder,
            size,
            transformation,
            target,
            callbacks,
        } = request;

        let action = Arc::new(Self {
            id: NEXT_ACTION_ID.fetch_add(1, Ordering::Relaxed),
            key,
            descriptor,
            decoder,
            size,
            transformation,
            target_id: target.as_ref().map(|t| t.id),
            bound,
            context,
            cancelled: AtomicBool::new(false),
            inner: Mutex::new(ActionInner {
                state: ActionState::Created,
                listeners: Vec::new(),
                outcome: None,
                target,
            }),
        });
        (action, callbacks)
    }

    /// Returns the unique action id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns the cache key.
    #[must_use]
    pub const fn key(&self) -> Option<&CacheKey> {
        self.key.as_ref()
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ActionState {
        self.inner.lock().state
    }

    /// Returns true once [`LoadAction::cancel`] was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns true if this action can absorb a request for `key`.
    #[must_use]
    pub fn can_absorb(&self, key: Option<&CacheKey>) -> bool {
        key.is_some()
            && self.key.as_ref() == key
            && !self.is_cancelled()
            && self.state() != ActionState::Failed
    }

    /// Requests cancellation. Idempotent.
    ///
    /// An action that has not started goes straight to `Cancelled`. A running
    /// one stops at its next step boundary and never fires load or error
    /// callbacks.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(action = self.id, "Cancelling action");

        let mut inner = self.inner.lock();
        if inner.state == ActionState::Created {
            let listeners = self.terminate(
                &mut inner,
                ActionState::Cancelled,
                Outcome {
                    result: LoadResult::Cancelled(Cancellation::NotStarted),
                    displayed_on: None,
                },
            );
            drop(inner);
            self.notify_listeners(listeners, LoadResult::Cancelled(Cancellation::NotStarted));
        } else {
            drop(inner);
        }
        self.context.gate.notify();
    }

    /// Adds listeners. If the action already finished they receive its outcome.
    pub fn attach(self: &Arc<Self>, callbacks: Callbacks) {
        if callbacks.is_empty() {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.outcome.is_none() {
            inner.listeners.push(callbacks);
            return;
        }
        drop(inner);

        let action = Arc::clone(self);
        self.context.dispatcher.dispatch(move || {
            let outcome = action.inner.lock().outcome.clone();
            if let Some(outcome) = outcome {
                callbacks.fire(&outcome.result, outcome.displayed_on);
            }
        });
    }

    /// Runs the action on a load worker and dispatches delivery.
    pub fn run(self: &Arc<Self>) {
        if !self.begin() {
            return;
        }
        let completion = self.execute();
        let populate = self.pending_writes(&completion);

        let action = Arc::clone(self);
        let (state, result) = (completion.state, completion.result);
        self.context.dispatcher.dispatch(move || {
            action.deliver(state, result);
        });

        if let Some((key, image)) = populate {
            self.populate(&key, &image, completion.populate);
        }
    }

    /// Runs the action on the calling thread and returns its result.
    ///
    /// Listeners and display run inline instead of on the callback thread.
    pub fn run_inline(self: &Arc<Self>) -> LoadResult {
        if !self.begin() {
            return self.recorded_result();
        }
        let completion = self.execute();
        if let Some((key, image)) = self.pending_writes(&completion) {
            self.populate(&key, &image, completion.populate);
        }
        self.deliver(completion.state, completion.result)
    }

    fn begin(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != ActionState::Created {
            trace!(action = self.id, state = %inner.state, "Action already settled");
            return false;
        }
        inner.state = ActionState::Running;
        true
    }

    fn recorded_result(&self) -> LoadResult {
        self.inner.lock().outcome.as_ref().map_or(
            LoadResult::Cancelled(Cancellation::NotStarted),
            |outcome| outcome.result.clone(),
        )
    }

    fn memory_tier(&self) -> Option<&Arc<dyn ImageCachePort>> {
        self.context
            .memory
            .as_ref()
            .filter(|_| self.descriptor.is_memory_cacheable())
    }

    fn storage_tier(&self) -> Option<&Arc<dyn ImageCachePort>> {
        self.context
            .storage
            .as_ref()
            .filter(|_| self.descriptor.is_storage_cacheable())
    }

    fn execute(&self) -> Completion {
        let gate = &self.context.gate;
        if gate.await_runnable_unless(&|| self.is_cancelled()) == GateOutcome::Abort {
            debug!(action = self.id, "Aborted at pause gate");
            return Completion::cancelled(Cancellation::NotStarted);
        }
        if self.is_cancelled() {
            return Completion::cancelled(Cancellation::NotStarted);
        }

        if let Some(key) = &self.key {
            if let Some(memory) = self.memory_tier()
                && let Some(image) = memory.get(key)
            {
                trace!(action = self.id, key = %key, "Memory tier hit");
                return self.loaded(ActionState::CachedSync, image, ImageSource::MemoryCache, Vec::new());
            }
            if self.is_cancelled() {
                return Completion::cancelled(Cancellation::NotStarted);
            }

            if let Some(storage) = self.storage_tier()
                && let Some(image) = storage.get(key)
            {
                trace!(action = self.id, key = %key, "Storage tier hit");
                let write_through = self.memory_tier().into_iter().cloned().collect();
                return self.loaded(ActionState::Delivered, image, ImageSource::StorageCache, write_through);
            }
            if self.is_cancelled() {
                return Completion::cancelled(Cancellation::NotStarted);
            }
        }

        trace!(action = self.id, size = ?self.size, "Decoding");
        let decoded = match self.decode() {
            Ok(image) if image.width() == 0 || image.height() == 0 => {
                return Completion::failed(LoadError::EmptyResult);
            }
            Ok(image) => image,
            Err(e) => {
                debug!(action = self.id, error = %e, "Decode failed");
                return Completion::failed(e);
            }
        };
        if self.is_cancelled() {
            return Completion::cancelled(Cancellation::Superseded);
        }

        let image = match self.apply_transformation(decoded) {
            Ok(image) => image,
            Err(e) => {
                debug!(action = self.id, error = %e, "Transformation failed");
                return Completion::failed(e);
            }
        };
        if self.is_cancelled() {
            return Completion::cancelled(Cancellation::Superseded);
        }

        let tiers = self
            .memory_tier()
            .into_iter()
            .chain(self.storage_tier())
            .cloned()
            .collect();
        self.loaded(ActionState::Delivered, Arc::new(image), ImageSource::Decoder, tiers)
    }

    fn decode(&self) -> Result<DynamicImage, LoadError> {
        panic::catch_unwind(AssertUnwindSafe(|| {
            self.decoder.decode(self.descriptor.data(), self.size)
        }))
        .unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            error!(action = self.id, panic = %message, "Decoder panicked");
            Err(LoadError::decode(format!("decoder panicked: {message}")))
        })
    }

    fn apply_transformation(&self, image: DynamicImage) -> Result<DynamicImage, LoadError> {
        let Some(transformation) = &self.transformation else {
            return Ok(image);
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| transformation.transform(image)))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                error!(action = self.id, panic = %message, "Transformation panicked");
                Err(LoadError::transform(format!("transformation panicked: {message}")))
            });
        outcome.map_err(|e| match e {
            LoadError::Transform { .. } => e,
            other => LoadError::transform(other.to_string()),
        })
    }

    fn loaded(
        &self,
        state: ActionState,
        image: Arc<DynamicImage>,
        source: ImageSource,
        populate: Vec<Arc<dyn ImageCachePort>>,
    ) -> Completion {
        Completion {
            state,
            result: LoadResult::Loaded(LoadedImage::new(self.key.clone(), image, source)),
            populate,
        }
    }

    fn pending_writes(&self, completion: &Completion) -> Option<(CacheKey, Arc<DynamicImage>)> {
        if completion.populate.is_empty() || self.is_cancelled() {
            return None;
        }
        let key = self.key.clone()?;
        let image = completion.result.image()?;
        Some((key, Arc::clone(&image.image)))
    }

    fn populate(&self, key: &CacheKey, image: &Arc<DynamicImage>, tiers: Vec<Arc<dyn ImageCachePort>>) {
        for tier in tiers {
            let key = key.clone();
            let image = Arc::clone(image);
            let id = self.id;
            self.context.writer.spawn(move || {
                if let Err(e) = tier.put(&key, image) {
                    warn!(action = id, key = %key, error = %e, "Cache write failed");
                }
            });
        }
    }

    /// Records the terminal state and shows the result on the target.
    ///
    /// Runs on the callback thread, or inline for synchronous loads.
    fn deliver(&self, state: ActionState, result: LoadResult) -> LoadResult {
        let (listeners, target, result) = {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                return inner
                    .outcome
                    .as_ref()
                    .map_or(result, |outcome| outcome.result.clone());
            }

            let (state, result) = if self.is_cancelled() && !result.is_cancelled() {
                (
                    ActionState::Cancelled,
                    LoadResult::Cancelled(Cancellation::Superseded),
                )
            } else {
                (state, result)
            };
            let target = inner.target.clone();
            let listeners = self.terminate(
                &mut inner,
                state,
                Outcome {
                    result: result.clone(),
                    displayed_on: None,
                },
            );
            (listeners, target, result)
        };

        let displayed_on = target.and_then(|target| self.display(&target, &result));
        if displayed_on.is_some()
            && let Some(outcome) = self.inner.lock().outcome.as_mut()
        {
            outcome.displayed_on = displayed_on;
        }

        for callbacks in listeners {
            callbacks.fire(&result, displayed_on);
        }
        result
    }

    fn display(&self, target: &TargetRef, result: &LoadResult) -> Option<TargetId> {
        if self.bound && !self.context.bindings.is_bound(target.id, self) {
            debug!(action = self.id, target = %target.id, "Target rebound, skipping display");
            return None;
        }
        let surface = target.target.upgrade()?;
        match result {
            LoadResult::Loaded(image) => {
                surface.show_image(image);
                Some(target.id)
            }
            LoadResult::Failed(error) => {
                surface.show_error(error);
                None
            }
            LoadResult::Cancelled(_) => None,
        }
    }

    fn terminate(&self, inner: &mut ActionInner, state: ActionState, outcome: Outcome) -> Vec<Callbacks> {
        debug!(action = self.id, state = %state, "Action finished");
        inner.state = state;
        inner.outcome = Some(outcome);
        inner.target = None;
        std::mem::take(&mut inner.listeners)
    }

    fn notify_listeners(&self, listeners: Vec<Callbacks>, result: LoadResult) {
        if listeners.is_empty() {
            return;
        }
        self.context.dispatcher.dispatch(move || {
            for callbacks in listeners {
                callbacks.fire(&result, None);
            }
        });
    }
}

impl std::fmt::Debug for LoadAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadAction")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("target", &self.target_id)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dto::ImageRequest;
    use crate::application::services::{PoolConfig, WorkerPools};
    use crate::application::test_support::{CountingDecoder, PanickingDecoder, RecordingTarget};
    use crate::domain::entities::SourceData;
    use crate::domain::ports::DisplayTarget;
    use crate::domain::ports::mocks::{MockImageCache, MockImageDecoderPort};
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Fixture {
        context: Arc<ActionContext>,
        memory: Arc<MockImageCache>,
        storage: Arc<MockImageCache>,
    }

    fn fixture() -> Fixture {
        fixture_with_storage(Arc::new(MockImageCache::new()))
    }

    fn fixture_with_storage(storage: Arc<MockImageCache>) -> Fixture {
        let pools = WorkerPools::start(PoolConfig {
            load_threads: 1,
            cache_threads: 1,
        })
        .unwrap();
        let (dispatcher, _thread) = CallbackDispatcher::spawn("test-action-callbacks").unwrap();
        let memory = Arc::new(MockImageCache::new());
        let context = Arc::new(ActionContext {
            memory: Some(memory.clone() as Arc<dyn ImageCachePort>),
            storage: Some(storage.clone() as Arc<dyn ImageCachePort>),
            writer: pools.cache_writer(),
            gate: Arc::new(PauseGate::new()),
            dispatcher,
            bindings: BindingRegistry::new(),
        });
        Fixture {
            context,
            memory,
            storage,
        }
    }

    fn request(decoder: Arc<dyn ImageDecoderPort>) -> ImageRequest {
        ImageRequest::custom(
            SourceDescriptor::with_key(SourceData::from("https://example.com/a.png"), "abc"),
            decoder,
        )
    }

    fn action(context: &Arc<ActionContext>, request: ImageRequest) -> Arc<LoadAction> {
        let (action, callbacks) = LoadAction::new(request.prepare().unwrap(), false, Arc::clone(context));
        action.attach(callbacks);
        action
    }

    fn wait_until(condition: impl Fn() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("condition not met in time");
    }

    #[test]
    fn test_decode_populates_both_tiers() {
        let fx = fixture();
        let decoder = Arc::new(CountingDecoder::new());
        let action = action(&fx.context, request(decoder.clone()).size(100, 100));

        let result = action.run_inline();

        let image = result.image().unwrap();
        assert_eq!(image.source, ImageSource::Decoder);
        assert_eq!(action.state(), ActionState::Delivered);
        assert_eq!(decoder.calls(), 1);

        let key = CacheKey::new("abc_size_100x100");
        wait_until(|| fx.memory.contains(&key) && fx.storage.contains(&key));
    }

    #[test]
    fn test_memory_hit_skips_decode_and_writes() {
        let fx = fixture();
        let key = CacheKey::new("abc");
        fx.memory.put(&key, Arc::new(DynamicImage::new_rgb8(2, 2))).unwrap();

        let mut decoder = MockImageDecoderPort::new();
        decoder.expect_decode().never();
        let action = action(&fx.context, request(Arc::new(decoder)));

        let result = action.run_inline();

        assert_eq!(result.image().unwrap().source, ImageSource::MemoryCache);
        assert_eq!(action.state(), ActionState::CachedSync);
        assert_eq!(fx.memory.put_count(), 1);
        assert_eq!(fx.storage.put_count(), 0);
    }

    #[test]
    fn test_storage_hit_writes_through_to_memory() {
        let fx = fixture();
        let key = CacheKey::new("abc");
        fx.storage.put(&key, Arc::new(DynamicImage::new_rgb8(2, 2))).unwrap();

        let decoder = Arc::new(CountingDecoder::new());
        let action = action(&fx.context, request(decoder.clone()));

        let result = action.run_inline();

        assert_eq!(result.image().unwrap().source, ImageSource::StorageCache);
        assert_eq!(action.state(), ActionState::Delivered);
        assert_eq!(decoder.calls(), 0);
        wait_until(|| fx.memory.contains(&key));
        assert_eq!(fx.storage.put_count(), 1);
    }

    #[test]
    fn test_timeout_fails_without_cache_entry() {
        let fx = fixture();
        let mut decoder = MockImageDecoderPort::new();
        decoder
            .expect_decode()
            .times(1)
            .returning(|_, _| Err(LoadError::timeout("request took too long")));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let action = action(
            &fx.context,
            request(Arc::new(decoder)).on_error(move |e| {
                let _ = tx.send(e);
            }),
        );

        let result = action.run_inline();

        assert!(matches!(result.error(), Some(LoadError::Timeout { .. })));
        assert_eq!(action.state(), ActionState::Failed);
        assert!(matches!(rx.try_recv(), Ok(LoadError::Timeout { .. })));
        assert!(rx.try_recv().is_err());
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(fx.memory.put_count(), 0);
        assert_eq!(fx.storage.put_count(), 0);
    }

    #[test]
    fn test_empty_image_is_failure() {
        let fx = fixture();
        let mut decoder = MockImageDecoderPort::new();
        decoder
            .expect_decode()
            .returning(|_, _| Ok(DynamicImage::new_rgb8(0, 0)));
        let action = action(&fx.context, request(Arc::new(decoder)));

        let result = action.run_inline();
        assert_eq!(result.error(), Some(&LoadError::EmptyResult));
    }

    #[test]
    fn test_cache_write_failure_is_swallowed() {
        let fx = fixture_with_storage(Arc::new(MockImageCache::failing()));
        let decoder = Arc::new(CountingDecoder::new());
        let action = action(&fx.context, request(decoder));

        let result = action.run_inline();

        assert!(result.image().is_some());
        wait_until(|| fx.storage.put_count() == 1);
        assert_eq!(action.state(), ActionState::Delivered);
    }

    #[test]
    fn test_anonymous_source_skips_tiers() {
        let fx = fixture();
        let decoder = Arc::new(CountingDecoder::new());
        let request = ImageRequest::custom(
            SourceDescriptor::anonymous(SourceData::from("x")),
            decoder.clone(),
        );
        let action = action(&fx.context, request);

        let result = action.run_inline();

        assert!(result.image().unwrap().key.is_none());
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(fx.memory.put_count(), 0);
        assert_eq!(fx.storage.put_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_before_start_notifies_once() {
        let fx = fixture();
        let decoder = Arc::new(CountingDecoder::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let loaded = Arc::new(AtomicBool::new(false));
        let action = {
            let loaded = Arc::clone(&loaded);
            action(
                &fx.context,
                request(decoder.clone())
                    .on_load(move |_| loaded.store(true, Ordering::SeqCst))
                    .on_cancelled(move |reason| {
                        let _ = tx.send(reason);
                    }),
            )
        };

        action.cancel();
        action.cancel();
        action.run();

        assert_eq!(rx.recv().await, Some(Cancellation::NotStarted));
        assert_eq!(action.state(), ActionState::Cancelled);
        assert_eq!(decoder.calls(), 0);
        assert!(!loaded.load(Ordering::SeqCst));
    }

    #[test]
    fn test_display_skipped_when_target_rebound() {
        let fx = fixture();
        let target = RecordingTarget::new();
        let decoder = Arc::new(CountingDecoder::new());
        let prepared = request(decoder).into_target(&target).prepare().unwrap();
        let (stale, _) = LoadAction::new(prepared, true, Arc::clone(&fx.context));

        let replacement_request = request(Arc::new(CountingDecoder::new()))
            .into_target(&target)
            .prepare()
            .unwrap();
        let (replacement, _) = LoadAction::new(replacement_request, true, Arc::clone(&fx.context));
        fx.context.bindings.bind_or_reuse(target.id(), &replacement, |_| false);

        let result = stale.run_inline();

        assert!(result.image().is_some());
        assert_eq!(target.shown(), 0);
        wait_until(|| fx.memory.contains(&CacheKey::new("abc")));
    }

    #[test]
    fn test_terminal_action_drops_target() {
        let fx = fixture();
        let target = RecordingTarget::new();
        let action = action(
            &fx.context,
            request(Arc::new(CountingDecoder::new())).into_target(&target),
        );

        action.run_inline();

        assert_eq!(target.shown(), 1);
        assert!(action.inner.lock().target.is_none());
    }
    struct RejectingTransformation;

    impl Transformation for RejectingTransformation {
        fn key(&self) -> String {
            "reject".to_string()
        }

        fn transform(&self, _image: DynamicImage) -> Result<DynamicImage, LoadError> {
            Err(LoadError::transform("unsupported color type"))
        }
    }

    struct PanickingTransformation;

    impl Transformation for PanickingTransformation {
        fn key(&self) -> String {
            "panic".to_string()
        }

        fn transform(&self, _image: DynamicImage) -> Result<DynamicImage, LoadError> {
            panic!("transformation blew up");
        }
    }

    #[test]
    fn test_transform_failure_fails_once_without_cache_entry() {
        let fx = fixture();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let action = action(
            &fx.context,
            request(Arc::new(CountingDecoder::new()))
                .transform(RejectingTransformation)
                .on_error(move |e| {
                    let _ = tx.send(e);
                }),
        );

        let result = action.run_inline();

        assert!(matches!(result.error(), Some(LoadError::Transform { .. })));
        assert_eq!(action.state(), ActionState::Failed);
        assert!(matches!(rx.try_recv(), Ok(LoadError::Transform { .. })));
        assert!(rx.try_recv().is_err());
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(fx.memory.put_count(), 0);
        assert_eq!(fx.storage.put_count(), 0);
    }

    #[test]
    fn test_panicking_decoder_fails_action() {
        let fx = fixture();
        let action = action(
            &fx.context,
            request(Arc::new(PanickingDecoder("decoder blew up"))),
        );

        let result = action.run_inline();

        let Some(LoadError::Decode { message }) = result.error() else {
            panic!("expected a decode error, got {result:?}");
        };
        assert!(message.contains("decoder blew up"));
        assert_eq!(action.state(), ActionState::Failed);
        assert_eq!(fx.storage.put_count(), 0);
    }

    #[test]
    fn test_panicking_transformation_fails_action() {
        let fx = fixture();
        let action = action(
            &fx.context,
            request(Arc::new(CountingDecoder::new())).transform(PanickingTransformation),
        );

        let result = action.run_inline();

        assert!(matches!(result.error(), Some(LoadError::Transform { .. })));
        assert_eq!(action.state(), ActionState::Failed);
    }
}
