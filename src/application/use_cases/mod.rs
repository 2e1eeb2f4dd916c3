//! Use case implementations.

mod image_loader;
mod load_action;

pub use image_loader::{ImageLoader, MemoryPressure, RequestHandle};
pub use load_action::{ActionContext, ActionState, LoadAction};
