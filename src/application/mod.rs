//! Application layer with the request engine, its services and DTOs.

/// Data transfer objects.
pub mod dto;
/// Engine services.
pub mod services;
/// Use case implementations.
pub mod use_cases;

#[cfg(test)]
pub(crate) mod test_support;

pub use dto::{Cancellation, ImageRequest, LoadResult};
pub use use_cases::{ActionState, ImageLoader, MemoryPressure, RequestHandle};
