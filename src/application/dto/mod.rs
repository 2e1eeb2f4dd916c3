//! Data transfer objects for the application layer.

mod request;

pub use request::{
    Callbacks, Cancellation, ImageRequest, LoadResult, PreparedRequest, TargetRef,
};
