//! Mapping from source kinds to descriptor factories and decoders.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::domain::entities::{SourceData, SourceDescriptor, SourceKind};
use crate::domain::errors::RequestError;
use crate::domain::ports::{DescriptorFactory, ImageDecoderPort};

/// A factory and decoder pair registered for one source kind.
#[derive(Clone)]
pub struct SourceHandler {
    /// Builds descriptors for the kind.
    pub factory: Arc<dyn DescriptorFactory>,
    /// Decodes sources of the kind.
    pub decoder: Arc<dyn ImageDecoderPort>,
}

/// Capability table populated at configuration time.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    handlers: HashMap<SourceKind, SourceHandler>,
}

impl SourceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the handler for a kind.
    pub fn register(
        &mut self,
        kind: SourceKind,
        factory: Arc<dyn DescriptorFactory>,
        decoder: Arc<dyn ImageDecoderPort>,
    ) {
        debug!(kind = %kind, "Registering source handler");
        self.handlers.insert(kind, SourceHandler { factory, decoder });
    }

    /// Builder-style [`SourceRegistry::register`].
    #[must_use]
    pub fn with(
        mut self,
        kind: SourceKind,
        factory: Arc<dyn DescriptorFactory>,
        decoder: Arc<dyn ImageDecoderPort>,
    ) -> Self {
        self.register(kind, factory, decoder);
        self
    }

    /// Returns true if a handler exists for the kind.
    #[must_use]
    pub fn supports(&self, kind: SourceKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Describes the data and returns the decoder responsible for it.
    ///
    /// # Errors
    /// Returns [`RequestError::UnregisteredSource`] if the kind has no handler.
    pub fn resolve(
        &self,
        data: SourceData,
    ) -> Result<(SourceDescriptor, Arc<dyn ImageDecoderPort>), RequestError> {
        let kind = data.kind();
        let handler = self
            .handlers
            .get(&kind)
            .ok_or(RequestError::UnregisteredSource(kind))?;
        Ok((handler.factory.describe(data), Arc::clone(&handler.decoder)))
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
