//! Domain error types.

mod load_error;
mod request_error;

pub use load_error::LoadError;
pub use request_error::{EngineError, RequestError};
