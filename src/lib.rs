//! Oxiload - An asynchronous image loading and caching engine.
//!
//! Requests are de-duplicated per display target, decoded on a bounded worker
//! pool and cached in a memory LRU tier and a persistent storage tier.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing the request engine, services and DTOs.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing caches, decoders and configuration.
pub mod infrastructure;

/// Current version of the library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = "oxiload";
