//! Image request builder and result types.

use std::sync::{Arc, Weak};

use crate::application::services::TransformationGroup;
use crate::domain::entities::{CacheKey, LoadedImage, Size, SourceDescriptor, TargetId};
use crate::domain::errors::{LoadError, RequestError};
use crate::domain::ports::{DisplayTarget, ImageDecoderPort, Transformation};

/// Why an action ended without a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancellation {
    /// Cancelled before any decode work began.
    NotStarted,
    /// Cancelled after work began, usually by a newer request for the target.
    Superseded,
}

impl std::fmt::Display for Cancellation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::Superseded => write!(f, "superseded"),
        }
    }
}

/// Tagged outcome carried to callbacks.
#[derive(Debug, Clone)]
pub enum LoadResult {
    /// The image was produced.
    Loaded(LoadedImage),
    /// Decoding or transforming failed.
    Failed(LoadError),
    /// The action was cancelled.
    Cancelled(Cancellation),
}

impl LoadResult {
    /// Returns the image, if loaded.
    #[must_use]
    pub const fn image(&self) -> Option<&LoadedImage> {
        match self {
            Self::Loaded(image) => Some(image),
            _ => None,
        }
    }

    /// Returns the failure, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&LoadError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Returns true if the result is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

type LoadFn = Box<dyn FnOnce(LoadedImage) + Send>;
type ErrorFn = Box<dyn FnOnce(LoadError) + Send>;
type CancelFn = Box<dyn FnOnce(Cancellation) + Send>;
type DisplayedFn = Box<dyn FnOnce(&LoadedImage, TargetId) + Send>;

/// Continuations attached to a request. At most one of them fires per result,
/// plus `on_displayed` after a successful display.
#[derive(Default)]
pub struct Callbacks {
    on_load: Option<LoadFn>,
    on_error: Option<ErrorFn>,
    on_cancelled: Option<CancelFn>,
    on_displayed: Option<DisplayedFn>,
}

impl Callbacks {
    /// Returns true if no callback is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.on_load.is_none()
            && self.on_error.is_none()
            && self.on_cancelled.is_none()
            && self.on_displayed.is_none()
    }

    /// Invokes the callbacks matching the result.
    pub fn fire(self, result: &LoadResult, displayed_on: Option<TargetId>) {
        match result {
            LoadResult::Loaded(image) => {
                if let (Some(on_displayed), Some(target)) = (self.on_displayed, displayed_on) {
                    on_displayed(image, target);
                }
                if let Some(on_load) = self.on_load {
                    on_load(image.clone());
                }
            }
            LoadResult::Failed(error) => {
                if let Some(on_error) = self.on_error {
                    on_error(error.clone());
                }
            }
            LoadResult::Cancelled(reason) => {
                if let Some(on_cancelled) = self.on_cancelled {
                    on_cancelled(*reason);
                }
            }
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_load", &self.on_load.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_cancelled", &self.on_cancelled.is_some())
            .field("on_displayed", &self.on_displayed.is_some())
            .finish()
    }
}

/// Display target bound to a request, held weakly.
#[derive(Clone)]
pub struct TargetRef {
    /// Identity used for binding.
    pub id: TargetId,
    /// Non-owning handle to the surface.
    pub target: Weak<dyn DisplayTarget>,
}

/// A request under construction. Consumed by submission.
pub struct ImageRequest {
    descriptor: SourceDescriptor,
    decoder: Arc<dyn ImageDecoderPort>,
    size: Option<(u32, u32)>,
    transformations: Vec<Arc<dyn Transformation>>,
    target: Option<TargetRef>,
    callbacks: Callbacks,
}

impl ImageRequest {
    /// Creates a request with an explicit descriptor and decoder.
    #[must_use]
    pub fn custom(descriptor: SourceDescriptor, decoder: Arc<dyn ImageDecoderPort>) -> Self {
        Self {
            descriptor,
            decoder,
            size: None,
            transformations: Vec::new(),
            target: None,
            callbacks: Callbacks::default(),
        }
    }

    /// Fits the decoded image into `width` x `height`. Validated on submit.
    #[must_use]
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.size = Some((width, height));
        self
    }

    /// Appends a transformation. Transformations run in the order added.
    #[must_use]
    pub fn transform(mut self, transformation: impl Transformation + 'static) -> Self {
        self.transformations.push(Arc::new(transformation));
        self
    }

    /// Appends a shared transformation.
    #[must_use]
    pub fn transform_shared(mut self, transformation: Arc<dyn Transformation>) -> Self {
        self.transformations.push(transformation);
        self
    }

    /// Skips the memory tier for this request.
    #[must_use]
    pub fn without_memory_cache(mut self) -> Self {
        self.descriptor = self.descriptor.without_memory_cache();
        self
    }

    /// Skips the storage tier for this request.
    #[must_use]
    pub fn without_storage_cache(mut self) -> Self {
        self.descriptor = self.descriptor.without_storage_cache();
        self
    }

    /// Delivers the result onto a display target.
    ///
    /// Only a weak reference is kept.
    #[must_use]
    pub fn into_target<T: DisplayTarget + 'static>(mut self, target: &Arc<T>) -> Self {
        let weak: Weak<dyn DisplayTarget> = Arc::downgrade(target) as Weak<dyn DisplayTarget>;
        self.target = Some(TargetRef {
            id: target.id(),
            target: weak,
        });
        self
    }

    /// Called with the image on success.
    #[must_use]
    pub fn on_load(mut self, f: impl FnOnce(LoadedImage) + Send + 'static) -> Self {
        self.callbacks.on_load = Some(Box::new(f));
        self
    }

    /// Called with the failure if decoding or transforming fails.
    #[must_use]
    pub fn on_error(mut self, f: impl FnOnce(LoadError) + Send + 'static) -> Self {
        self.callbacks.on_error = Some(Box::new(f));
        self
    }

    /// Called if the request is cancelled.
    #[must_use]
    pub fn on_cancelled(mut self, f: impl FnOnce(Cancellation) + Send + 'static) -> Self {
        self.callbacks.on_cancelled = Some(Box::new(f));
        self
    }

    /// Called after the image was shown on the display target.
    #[must_use]
    pub fn on_displayed(
        mut self,
        f: impl FnOnce(&LoadedImage, TargetId) + Send + 'static,
    ) -> Self {
        self.callbacks.on_displayed = Some(Box::new(f));
        self
    }

    /// Returns the descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    /// Validates the request and derives its cache key.
    ///
    /// # Errors
    /// Returns [`RequestError::InvalidSize`] for a zero dimension.
    pub fn prepare(self) -> Result<PreparedRequest, RequestError> {
        let size = self
            .size
            .map(|(width, height)| Size::new(width, height))
            .transpose()?;
        let transformation = TransformationGroup::compose(self.transformations);
        let key = CacheKey::build(&self.descriptor, size, transformation.as_deref());

        Ok(PreparedRequest {
            key,
            descriptor: self.descriptor,
            decoder: self.decoder,
            size,
            transformation,
            target: self.target,
            callbacks: self.callbacks,
        })
    }
}

impl std::fmt::Debug for ImageRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRequest")
            .field("descriptor", &self.descriptor)
            .field("size", &self.size)
            .field("transformations", &self.transformations.len())
            .field("target", &self.target.as_ref().map(|t| t.id))
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}

/// A validated request ready to become an action.
pub struct PreparedRequest {
    /// Cache key, `None` for anonymous sources.
    pub key: Option<CacheKey>,
    /// Source identity and cache flags.
    pub descriptor: SourceDescriptor,
    /// Decoder for the source.
    pub decoder: Arc<dyn ImageDecoderPort>,
    /// Validated target size.
    pub size: Option<Size>,
    /// Composed transformation chain.
    pub transformation: Option<Arc<dyn Transformation>>,
    /// Display target, if any.
    pub target: Option<TargetRef>,
    /// Caller continuations.
    pub callbacks: Callbacks,
}
