//! Engine building blocks shared by the use cases.

mod binding_registry;
mod callback_dispatcher;
mod pause_gate;
mod source_registry;
mod transformation_group;
mod worker_pools;

pub use binding_registry::{Binding, BindingRegistry};
pub use callback_dispatcher::CallbackDispatcher;
pub use pause_gate::{GateOutcome, PauseGate};
pub use source_registry::{SourceHandler, SourceRegistry};
pub use transformation_group::TransformationGroup;
pub(crate) use worker_pools::panic_message;
pub use worker_pools::{CacheWriter, DEFAULT_MAX_LOAD_THREADS, PoolConfig, WorkerPools};
