//! Composition of several transformations into one.

use std::sync::Arc;

use image::DynamicImage;
use tracing::trace;

use crate::domain::errors::LoadError;
use crate::domain::ports::Transformation;

/// Ordered chain of transformations applied left to right.
///
/// The key is the concatenation of every member key, so two groups with the
/// same members in the same order share cache entries.
pub struct TransformationGroup {
    transformations: Vec<Arc<dyn Transformation>>,
    key: String,
}

impl TransformationGroup {
    /// Creates a group from transformations in registration order.
    #[must_use]
    pub fn new(transformations: Vec<Arc<dyn Transformation>>) -> Self {
        let key = transformations.iter().map(|t| t.key()).collect::<String>();
        Self {
            transformations,
            key,
        }
    }

    /// Collapses a list into a single transformation, if there is any.
    ///
    /// A single member is returned as is instead of being wrapped.
    #[must_use]
    pub fn compose(mut transformations: Vec<Arc<dyn Transformation>>) -> Option<Arc<dyn Transformation>> {
        match transformations.len() {
            0 => None,
            1 => transformations.pop(),
            _ => Some(Arc::new(Self::new(transformations))),
        }
    }

    /// Returns the number of member transformations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transformations.len()
    }

    /// Returns true if the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transformations.is_empty()
    }
}

impl Transformation for TransformationGroup {
    fn key(&self) -> String {
        self.key.clone()
    }

    fn transform(&self, image: DynamicImage) -> Result<DynamicImage, LoadError> {
        let mut buffer = image;
        for transformation in &self.transformations {
            trace!(step = %transformation.key(), "Applying transformation");
            // The previous buffer is moved in and released by the step.
            buffer = transformation.transform(buffer)?;
        }
        Ok(buffer)
    }
}

impl std::fmt::Debug for TransformationGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformationGroup")
            .field("key", &self.key)
            .field("len", &self.transformations.len())
            .finish()
    }
}
