//! Port definition for surfaces that show loaded images.

use crate::domain::entities::{LoadedImage, TargetId};
use crate::domain::errors::LoadError;

/// A reusable surface populated by at most one in-flight request at a time.
///
/// The engine only keeps weak references to targets. Both methods are called
/// on the callback thread.
pub trait DisplayTarget: Send + Sync {
    /// Stable identity of this target.
    fn id(&self) -> TargetId;

    /// Shows a loaded image.
    fn show_image(&self, image: &LoadedImage);

    /// Shows a load failure.
    fn show_error(&self, _error: &LoadError) {}
}
